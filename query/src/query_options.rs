use std::time::Duration;

/// Default options for all queries under a [`QueryClient`](crate::QueryClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultQueryOptions {
    /// Time before fetched data is considered stale.
    /// If `None`, data never goes stale on its own.
    pub stale_time: Option<Duration>,
    /// Time before an entry without observers is removed from cache.
    /// If `None`, entries are never removed.
    pub gc_time: Option<Duration>,
}

impl Default for DefaultQueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Some(DEFAULT_STALE_TIME),
            gc_time: Some(DEFAULT_GC_TIME),
        }
        .validate()
    }
}

const DEFAULT_STALE_TIME: Duration = Duration::from_secs(10);
const DEFAULT_GC_TIME: Duration = Duration::from_secs(60 * 5);

impl DefaultQueryOptions {
    /// Set the stale time.
    pub fn set_stale_time(self, stale_time: Option<Duration>) -> Self {
        DefaultQueryOptions { stale_time, ..self }.validate()
    }

    /// Set the gc time.
    pub fn set_gc_time(self, gc_time: Option<Duration>) -> Self {
        DefaultQueryOptions { gc_time, ..self }.validate()
    }

    /// Ensures that gc_time is >= than stale_time.
    pub fn validate(self) -> Self {
        DefaultQueryOptions {
            stale_time: ensure_valid_stale_time(&self.stale_time, &self.gc_time),
            gc_time: self.gc_time,
        }
    }
}

/// How long an entry is kept once its last observer detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Use the client's default gc time.
    #[default]
    Default,
    /// Never remove the entry.
    Forever,
    /// Remove the entry after the given time. Zero removes it as soon as it is unobserved.
    For(Duration),
}

impl Retention {
    /// Resolves against a client default. `None` means forever.
    pub(crate) fn resolve(self, default_gc_time: Option<Duration>) -> Option<Duration> {
        match self {
            Retention::Default => default_gc_time,
            Retention::Forever => None,
            Retention::For(duration) => Some(duration),
        }
    }
}

/// Whether attaching an observer to an entry that already has data triggers a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefetchOnMount {
    /// Never refetch on mount.
    Never,
    /// Refetch only if the data is stale, invalid or errored.
    #[default]
    IfStale,
    /// Always refetch on mount.
    Always,
}

impl From<bool> for RefetchOnMount {
    fn from(refetch: bool) -> Self {
        if refetch {
            RefetchOnMount::IfStale
        } else {
            RefetchOnMount::Never
        }
    }
}

pub(crate) fn ensure_valid_stale_time(
    stale_time: &Option<Duration>,
    gc_time: &Option<Duration>,
) -> Option<Duration> {
    match (stale_time, gc_time) {
        (Some(stale_time), Some(gc_time)) if stale_time > gc_time => {
            leptos::logging::debug_warn!(
                "stale_time is greater than gc_time. Using gc time instead. stale_time: {}, gc_time: {}",
                stale_time.as_millis(),
                gc_time.as_millis()
            );
            Some(*gc_time)
        }
        (None, Some(gc_time)) => {
            leptos::logging::debug_warn!(
                "stale_time (infinity) is greater than gc_time. Using gc_time instead. gc_time: {}",
                gc_time.as_millis()
            );
            Some(*gc_time)
        }
        (stale_time, _) => *stale_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_stale_time_less_than_gc_time() {
        let options = DefaultQueryOptions {
            stale_time: Some(Duration::from_secs(5)),
            gc_time: Some(Duration::from_secs(10)),
        }
        .validate();

        assert_eq!(options.stale_time, Some(Duration::from_secs(5)));
        assert_eq!(options.gc_time, Some(Duration::from_secs(10)));
    }

    #[test]
    fn validate_stale_time_greater_than_gc_time() {
        let options = DefaultQueryOptions {
            stale_time: Some(Duration::from_secs(15)),
            gc_time: Some(Duration::from_secs(10)),
        }
        .validate();

        assert_eq!(
            options.stale_time,
            Some(Duration::from_secs(10)),
            "stale_time should be adjusted to gc_time"
        );
    }

    #[test]
    fn validate_gc_time_without_stale_time() {
        let options = DefaultQueryOptions::default().set_stale_time(None);
        assert_eq!(options.stale_time, Some(DEFAULT_GC_TIME));

        let options = DefaultQueryOptions::default()
            .set_gc_time(None)
            .set_stale_time(None);
        assert_eq!(options.stale_time, None);
        assert_eq!(options.gc_time, None);
    }

    #[test]
    fn retention_resolution() {
        let default = Some(Duration::from_secs(30));
        assert_eq!(Retention::Default.resolve(default), default);
        assert_eq!(Retention::Default.resolve(None), None);
        assert_eq!(Retention::Forever.resolve(default), None);
        assert_eq!(
            Retention::For(Duration::ZERO).resolve(default),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn refetch_on_mount_from_bool() {
        assert_eq!(RefetchOnMount::from(true), RefetchOnMount::IfStale);
        assert_eq!(RefetchOnMount::from(false), RefetchOnMount::Never);
        assert_eq!(RefetchOnMount::default(), RefetchOnMount::IfStale);
    }
}
