use crate::Instant;

/// The lifecycle of a cache entry.
///
/// Each variant corresponds to a state of an entry, starting from creation and covering
/// fetches, failures and invalidation.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum QueryState<T, E> {
    /// The entry exists, but nothing has been fetched or written yet.
    #[default]
    Created,

    /// The entry is fetching for the first time. There is no data yet.
    Loading,

    /// The entry is fetching again. Holds the previous data.
    Fetching(QueryData<T>),

    /// The last fetch (or direct write) succeeded.
    Loaded(QueryData<T>),

    /// The data is still available but has been marked stale through invalidation.
    Invalid(QueryData<T>),

    /// The last fetch failed. Holds the error and any data from an earlier success.
    Errored(QueryFailure<T, E>),
}

impl<T, E> QueryState<T, E> {
    /// Returns the QueryData for the current state, if present.
    pub fn query_data(&self) -> Option<&QueryData<T>> {
        match self {
            QueryState::Created | QueryState::Loading => None,
            QueryState::Fetching(data) | QueryState::Loaded(data) | QueryState::Invalid(data) => {
                Some(data)
            }
            QueryState::Errored(failure) => failure.data.as_ref(),
        }
    }

    /// Returns the data, if present.
    pub fn data(&self) -> Option<&T> {
        self.query_data().map(|d| &d.data)
    }

    /// Returns the error of the last fetch, if it failed.
    pub fn error(&self) -> Option<&E> {
        match self {
            QueryState::Errored(failure) => Some(&failure.error),
            _ => None,
        }
    }

    /// Last time the entry was written by a fetch or a direct update.
    pub fn updated_at(&self) -> Option<Instant> {
        match self {
            QueryState::Errored(failure) => Some(failure.failed_at),
            other => other.query_data().map(|d| d.updated_at),
        }
    }

    /// A fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        matches!(self, QueryState::Loading | QueryState::Fetching(_))
    }

    /// Data is present and the last fetch did not fail.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            QueryState::Fetching(_) | QueryState::Loaded(_) | QueryState::Invalid(_)
        )
    }

    /// The entry has been invalidated.
    pub fn is_invalid(&self) -> bool {
        matches!(self, QueryState::Invalid(_))
    }

    /// The state to move to when a fetch starts.
    pub(crate) fn into_fetching(self) -> Self {
        match self {
            QueryState::Created | QueryState::Loading => QueryState::Loading,
            QueryState::Fetching(data) | QueryState::Loaded(data) | QueryState::Invalid(data) => {
                QueryState::Fetching(data)
            }
            QueryState::Errored(QueryFailure { data: Some(data), .. }) => {
                QueryState::Fetching(data)
            }
            QueryState::Errored(QueryFailure { data: None, .. }) => QueryState::Loading,
        }
    }

    /// The state to move to when a fetch fails.
    pub(crate) fn into_failed(self, error: E) -> Self {
        let data = match self {
            QueryState::Created | QueryState::Loading => None,
            QueryState::Fetching(data) | QueryState::Loaded(data) | QueryState::Invalid(data) => {
                Some(data)
            }
            QueryState::Errored(failure) => failure.data,
        };
        QueryState::Errored(QueryFailure {
            error,
            data,
            failed_at: Instant::now(),
        })
    }
}

impl<T, E> std::fmt::Debug for QueryState<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Loading => write!(f, "Loading"),
            Self::Fetching(arg0) => f.debug_tuple("Fetching").field(arg0).finish(),
            Self::Loaded(arg0) => f.debug_tuple("Loaded").field(arg0).finish(),
            Self::Invalid(arg0) => f.debug_tuple("Invalid").field(arg0).finish(),
            Self::Errored(arg0) => f.debug_tuple("Errored").field(arg0).finish(),
        }
    }
}

/// The latest data for an entry.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryData<T> {
    /// The Data.
    pub data: T,
    /// The instant this data was retrieved.
    pub updated_at: Instant,
}

impl<T> QueryData<T> {
    /// Creates a new QueryData with the given data and the current time as the updated_at timestamp.
    pub fn now(data: T) -> Self {
        Self {
            data,
            updated_at: Instant::now(),
        }
    }
}

impl<T> std::fmt::Debug for QueryData<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryData")
            .field("data", &self.data)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A failed fetch.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QueryFailure<T, E> {
    /// What the action returned.
    pub error: E,
    /// Data from the last successful fetch, kept across failures.
    pub data: Option<QueryData<T>>,
    /// When the fetch failed.
    pub failed_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = QueryState<u32, String>;

    #[test]
    fn fetching_keeps_previous_data() {
        assert_eq!(State::Created.into_fetching(), State::Loading);

        let loaded = State::Loaded(QueryData::now(1));
        let fetching = loaded.into_fetching();
        assert!(fetching.is_fetching());
        assert!(fetching.is_success());
        assert_eq!(fetching.data(), Some(&1));
    }

    #[test]
    fn failure_retains_data() {
        let failed = State::Loaded(QueryData::now(7)).into_failed("boom".to_string());

        assert_eq!(failed.error(), Some(&"boom".to_string()));
        assert_eq!(failed.data(), Some(&7));
        assert!(!failed.is_success());
        assert!(!failed.is_fetching());

        let retry = failed.into_fetching();
        assert_eq!(retry.data(), Some(&7));
        assert_eq!(retry.error(), None);

        let first_failure = State::Loading.into_failed("x".to_string());
        assert_eq!(first_failure.data(), None);
        assert_eq!(first_failure.into_fetching(), State::Loading);
    }
}
