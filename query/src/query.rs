use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use leptos::logging;
use slotmap::SlotMap;

use crate::{
    cache_observer::CacheEvent,
    engine::Fetcher,
    garbage_collector::GarbageCollector,
    query_cache::{CacheEntry, QueryCache},
    query_observer::{ObserverKey, QueryObserver},
    QueryData, QueryError, QueryKey, QueryState, QueryValue,
};

/// A single cache entry: its state, its observers and its collection timer.
pub(crate) struct Query<T, E> {
    pub(crate) key: QueryKey,

    // State
    state: Rc<RefCell<QueryState<T, E>>>,

    // Synchronization
    observers: Rc<RefCell<SlotMap<ObserverKey, QueryObserver<T, E>>>>,
    executing: Rc<Cell<bool>>,
    // Set when invalidated mid-fetch. The result of that fetch lands as invalid.
    invalidated: Rc<Cell<bool>>,
    pub(crate) garbage_collector: GarbageCollector,
}

impl<T, E> Clone for Query<T, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            state: self.state.clone(),
            observers: self.observers.clone(),
            executing: self.executing.clone(),
            invalidated: self.invalidated.clone(),
            garbage_collector: self.garbage_collector.clone(),
        }
    }
}

impl<T, E> Query<T, E>
where
    T: QueryValue,
    E: QueryError,
{
    pub(crate) fn new(key: QueryKey, gc_time: Option<Duration>) -> Self {
        Query {
            key,
            state: Rc::new(RefCell::new(QueryState::Created)),
            observers: Rc::new(RefCell::new(SlotMap::with_key())),
            executing: Rc::new(Cell::new(false)),
            invalidated: Rc::new(Cell::new(false)),
            garbage_collector: GarbageCollector::new(gc_time),
        }
    }

    pub(crate) fn get_state(&self) -> QueryState<T, E> {
        self.state.borrow().clone()
    }

    // Useful to avoid clones.
    pub(crate) fn with_state<R>(&self, func: impl FnOnce(&QueryState<T, E>) -> R) -> R {
        func(&self.state.borrow())
    }

    fn take_state(&self) -> QueryState<T, E> {
        std::mem::replace(&mut *self.state.borrow_mut(), QueryState::Created)
    }

    /// Stores the state, then notifies observers and the cache.
    /// An invalid state is refetched right away if an observer can fetch it.
    pub(crate) fn set_state(&self, cache: &QueryCache, state: QueryState<T, E>) {
        let invalid = state.is_invalid();
        *self.state.borrow_mut() = state.clone();

        // Listeners may reach back into this entry, so never call them under a borrow.
        let listeners: Vec<_> = self
            .observers
            .borrow()
            .values()
            .map(|observer| observer.listener.clone())
            .collect();
        for listener in listeners {
            listener(&state);
        }

        cache.notify(CacheEvent::Updated(self.key.clone()));

        if invalid {
            self.execute(cache);
        }
    }

    /// If update returns Ok(_) the state will be updated and subscribers will be notified.
    /// If update returns Err(_) the state will not be updated and subscribers will not be notified.
    /// Err(_) should always contain the previous state.
    pub(crate) fn maybe_map_state(
        &self,
        cache: &QueryCache,
        update_fn: impl FnOnce(QueryState<T, E>) -> Result<QueryState<T, E>, QueryState<T, E>>,
    ) -> bool {
        let current_state = self.take_state();

        match update_fn(current_state) {
            Ok(new_state) => {
                self.set_state(cache, new_state);
                true
            }
            Err(old_state) => {
                *self.state.borrow_mut() = old_state;
                false
            }
        }
    }

    /// Marks loaded data as stale. Failed entries are retried if observed.
    /// An entry that is fetching is refetched once the running fetch settles.
    pub(crate) fn mark_invalid(&self, cache: &QueryCache) -> bool {
        match self.take_state() {
            QueryState::Loaded(data) => {
                cache.notify(CacheEvent::Invalidated(self.key.clone()));
                self.set_state(cache, QueryState::Invalid(data));
                true
            }
            failed @ QueryState::Errored(_) => {
                *self.state.borrow_mut() = failed;
                cache.notify(CacheEvent::Invalidated(self.key.clone()));
                self.execute(cache);
                true
            }
            fetching @ (QueryState::Loading | QueryState::Fetching(_)) => {
                *self.state.borrow_mut() = fetching;
                self.invalidated.set(true);
                cache.notify(CacheEvent::Invalidated(self.key.clone()));
                true
            }
            created @ QueryState::Created => {
                *self.state.borrow_mut() = created;
                false
            }
            invalid @ QueryState::Invalid(_) => {
                *self.state.borrow_mut() = invalid;
                false
            }
        }
    }

    pub(crate) fn subscribe(&self, cache: &QueryCache, observer: QueryObserver<T, E>) -> ObserverKey {
        let observer_id = self.observers.borrow_mut().insert(observer);
        self.garbage_collector.disable_gc();
        cache.notify(CacheEvent::ObserverAdded(self.key.clone()));
        observer_id
    }

    pub(crate) fn unsubscribe(&self, cache: &QueryCache, observer_id: ObserverKey) {
        let (removed, empty) = {
            let mut observers = self.observers.borrow_mut();
            let removed = observers.remove(observer_id).is_some();
            (removed, observers.is_empty())
        };

        if removed {
            cache.notify(CacheEvent::ObserverRemoved(self.key.clone()));
            if empty {
                self.enable_gc(cache);
            }
        }
    }

    /// Starts the collection timer. The entry is removed once it elapses.
    pub(crate) fn enable_gc(&self, cache: &QueryCache) {
        let cache = cache.downgrade();
        let key = self.key.clone();
        self.garbage_collector.enable_gc(move || {
            if let Some(cache) = cache.upgrade() {
                cache.evict_query(&key);
            }
        });
    }

    /**
     * Execution.
     */

    /// Fetches with the first observer allowed to fetch. Does nothing if there is none.
    pub(crate) fn execute(&self, cache: &QueryCache) {
        let fetcher = self
            .observers
            .borrow()
            .values()
            .find_map(|observer| observer.active_fetcher().cloned());

        if let Some(fetcher) = fetcher {
            self.fetch_with(cache, fetcher);
        }
    }

    /// Runs `fetcher` unless a fetch for this entry is already in flight.
    pub(crate) fn fetch_with(&self, cache: &QueryCache, fetcher: Fetcher<T, E>) {
        if self.executing.replace(true) {
            return;
        }

        let state = self.take_state();
        self.set_state(cache, state.into_fetching());

        let query = self.clone();
        let query_cache = cache.clone();
        cache.spawn(Box::pin(async move {
            let result = fetcher().await;
            query.settle(&query_cache, result);
        }));
    }

    fn settle(&self, cache: &QueryCache, result: Result<T, E>) {
        self.executing.set(false);
        let invalidated = self.invalidated.replace(false);

        match result {
            Ok(data) if invalidated => {
                self.set_state(cache, QueryState::Invalid(QueryData::now(data)));
            }
            Ok(data) => {
                self.set_state(cache, QueryState::Loaded(QueryData::now(data)));
            }
            Err(error) => {
                logging::debug_warn!("Query {} failed: {:?}", self.key, error);

                let callbacks: Vec<_> = self
                    .observers
                    .borrow()
                    .values()
                    .filter_map(|observer| observer.on_error.clone())
                    .collect();

                let state = self.take_state();
                self.set_state(cache, state.into_failed(error.clone()));

                for callback in callbacks {
                    callback(&error);
                }
            }
        }
    }

    /// Whether the entry should be refetched when an observer mounts.
    /// A `stale_time` of `None` means loaded data never goes stale.
    pub(crate) fn is_stale(&self, stale_time: Option<Duration>) -> bool {
        self.with_state(|state| match state {
            QueryState::Loaded(data) | QueryState::Fetching(data) => match stale_time {
                Some(stale_time) => data.updated_at.time_until(stale_time).is_zero(),
                None => false,
            },
            QueryState::Created
            | QueryState::Loading
            | QueryState::Invalid(_)
            | QueryState::Errored(_) => true,
        })
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    pub(crate) fn dispose(&self) {
        self.garbage_collector.disable_gc();
        self.observers.borrow_mut().clear();
    }
}

impl<T, E> CacheEntry for Query<T, E>
where
    T: QueryValue,
    E: QueryError,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn mark_invalid(&self, cache: &QueryCache) -> bool {
        Query::mark_invalid(self, cache)
    }

    fn observer_count(&self) -> usize {
        Query::observer_count(self)
    }

    fn dispose(&self) {
        Query::dispose(self)
    }
}
