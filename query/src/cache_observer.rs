use crate::QueryKey;

/// Subscribing to cache events
pub trait CacheObserver {
    /// receive a cache event.
    fn process_cache_event(&self, event: CacheEvent);
}

impl<F> CacheObserver for F
where
    F: Fn(CacheEvent),
{
    fn process_cache_event(&self, event: CacheEvent) {
        self(event)
    }
}

/// The events that can be observed from the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A new entry was inserted.
    Created(QueryKey),
    /// An entry's state changed.
    Updated(QueryKey),
    /// An entry was marked stale through invalidation.
    Invalidated(QueryKey),
    /// An observer attached to an entry.
    ObserverAdded(QueryKey),
    /// An observer detached from an entry.
    ObserverRemoved(QueryKey),
    /// An entry was removed from the cache.
    Removed(QueryKey),
}

impl CacheEvent {
    /// The key of the entry the event is about.
    pub fn key(&self) -> &QueryKey {
        match self {
            CacheEvent::Created(key)
            | CacheEvent::Updated(key)
            | CacheEvent::Invalidated(key)
            | CacheEvent::ObserverAdded(key)
            | CacheEvent::ObserverRemoved(key)
            | CacheEvent::Removed(key) => key,
        }
    }
}
