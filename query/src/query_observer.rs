use std::time::Duration;

use slotmap::new_key_type;

use crate::engine::{ErrorCallback, Fetcher, QueryListener};

new_key_type! {
    pub(crate) struct ObserverKey;
}

/// One attachment to a cache entry.
pub(crate) struct QueryObserver<T, E> {
    pub(crate) fetcher: Option<Fetcher<T, E>>,
    pub(crate) enabled: bool,
    pub(crate) stale_time: Option<Duration>,
    pub(crate) on_error: Option<ErrorCallback<E>>,
    pub(crate) listener: QueryListener<T, E>,
}

impl<T, E> QueryObserver<T, E> {
    /// The fetcher the engine may use on this observer's behalf.
    pub(crate) fn active_fetcher(&self) -> Option<&Fetcher<T, E>> {
        if self.enabled {
            self.fetcher.as_ref()
        } else {
            None
        }
    }
}

impl<T, E> Clone for QueryObserver<T, E> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            enabled: self.enabled,
            stale_time: self.stale_time,
            on_error: self.on_error.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for QueryObserver<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("fetcher", &self.fetcher.as_ref().map(|_| "..."))
            .field("enabled", &self.enabled)
            .field("stale_time", &self.stale_time)
            .field("listener", &"...")
            .finish()
    }
}
