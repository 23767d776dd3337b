use std::{
    any::Any,
    cell::RefCell,
    collections::{hash_map::Entry, HashMap},
    rc::{Rc, Weak},
    time::Duration,
};

use futures::future::LocalBoxFuture;
use slotmap::SlotMap;

use crate::{
    cache_observer::{CacheEvent, CacheObserver},
    mutation::Mutations,
    query::Query,
    CacheError, QueryError, QueryKey, QueryValue,
};

/// Runs a future to completion on the local executor.
pub(crate) type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

#[derive(Clone)]
pub(crate) struct QueryCache(Rc<CacheInner>);

#[derive(Clone)]
pub(crate) struct WeakQueryCache(Weak<CacheInner>);

pub(crate) struct CacheInner {
    queries: RefCell<HashMap<QueryKey, Rc<dyn CacheEntry>>>,
    mutations: RefCell<HashMap<QueryKey, Rc<dyn MutationEntry>>>,
    observers: RefCell<SlotMap<CacheObserverKey, Rc<dyn CacheObserver>>>,
    spawner: Spawner,
}

slotmap::new_key_type! {
    /// Identifies a registered [`CacheObserver`].
    pub struct CacheObserverKey;
}

// Trait to enable cache introspection among entries of distinct types.
pub(crate) trait CacheEntry {
    fn as_any(&self) -> &dyn Any;
    fn mark_invalid(&self, cache: &QueryCache) -> bool;
    fn observer_count(&self) -> usize;
    fn dispose(&self);
}

pub(crate) trait MutationEntry {
    fn as_any(&self) -> &dyn Any;
    fn is_idle(&self) -> bool;
    fn dispose(&self);
}

impl QueryCache {
    pub(crate) fn new(spawner: Spawner) -> Self {
        QueryCache(Rc::new(CacheInner {
            queries: RefCell::new(HashMap::new()),
            mutations: RefCell::new(HashMap::new()),
            observers: RefCell::new(SlotMap::with_key()),
            spawner,
        }))
    }

    pub(crate) fn downgrade(&self) -> WeakQueryCache {
        WeakQueryCache(Rc::downgrade(&self.0))
    }

    pub(crate) fn spawn(&self, fut: LocalBoxFuture<'static, ()>) {
        (self.0.spawner)(fut)
    }

    pub(crate) fn get_query<T, E>(&self, key: &QueryKey) -> Result<Option<Query<T, E>>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        let entry = self.0.queries.borrow().get(key).cloned();
        match entry {
            None => Ok(None),
            Some(entry) => downcast_query(key, entry.as_ref()).map(Some),
        }
    }

    /// Returns the entry under `key`, inserting a new one if there is none.
    /// The flag is true if the entry was created by this call.
    pub(crate) fn get_or_create_query<T, E>(
        &self,
        key: &QueryKey,
        gc_time: Option<Duration>,
    ) -> Result<(Query<T, E>, bool), CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        let (query, created) = {
            let mut queries = self.0.queries.borrow_mut();
            let entry = match queries.entry(key.clone()) {
                Entry::Occupied(entry) => (downcast_query(key, entry.get().as_ref())?, false),
                Entry::Vacant(entry) => {
                    let query = Query::<T, E>::new(key.clone(), gc_time);
                    entry.insert(Rc::new(query.clone()));
                    (query, true)
                }
            };
            entry
        };

        // Notify on insert.
        if created {
            self.notify(CacheEvent::Created(key.clone()));
        }

        Ok((query, created))
    }

    /// Removes the entry under `key` if nothing observes it anymore.
    pub(crate) fn evict_query(&self, key: &QueryKey) -> bool {
        let removed = {
            let mut queries = self.0.queries.borrow_mut();
            let evictable = queries.get(key).map_or(false, |entry| entry.observer_count() == 0);
            if evictable {
                queries.remove(key)
            } else {
                None
            }
        };

        if let Some(entry) = removed {
            entry.dispose();
            self.notify(CacheEvent::Removed(key.clone()));
            true
        } else {
            false
        }
    }

    /// Invalidates the entry under exactly `key`.
    pub(crate) fn invalidate_query(&self, key: &QueryKey) -> bool {
        let entry = self.0.queries.borrow().get(key).cloned();
        entry.map_or(false, |entry| entry.mark_invalid(self))
    }

    /// Invalidates every entry whose key starts with `prefix`.
    pub(crate) fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        // Invalidation can trigger fetches that reach back into the map.
        let entries: Vec<_> = self
            .0
            .queries
            .borrow()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect();

        self.mark_invalid(entries)
    }

    pub(crate) fn invalidate_all_queries(&self) -> usize {
        let entries: Vec<_> = self.0.queries.borrow().values().cloned().collect();
        self.mark_invalid(entries)
    }

    fn mark_invalid(&self, entries: Vec<Rc<dyn CacheEntry>>) -> usize {
        let mut invalidated = 0;
        for entry in entries {
            if entry.mark_invalid(self) {
                invalidated += 1;
            }
        }
        invalidated
    }

    pub(crate) fn get_mutations<T, E>(&self, key: &QueryKey) -> Result<Option<Mutations<T, E>>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        let entry = self.0.mutations.borrow().get(key).cloned();
        match entry {
            None => Ok(None),
            Some(entry) => downcast_mutations(key, entry.as_ref()).map(Some),
        }
    }

    pub(crate) fn get_or_create_mutations<T, E>(
        &self,
        key: &QueryKey,
        gc_time: Option<Duration>,
    ) -> Result<Mutations<T, E>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        let mut mutations = self.0.mutations.borrow_mut();
        let entry = match mutations.entry(key.clone()) {
            Entry::Occupied(entry) => downcast_mutations(key, entry.get().as_ref()),
            Entry::Vacant(entry) => {
                let created = Mutations::<T, E>::new(key.clone(), gc_time);
                entry.insert(Rc::new(created.clone()));
                Ok(created)
            }
        };
        entry
    }

    pub(crate) fn evict_mutations(&self, key: &QueryKey) -> bool {
        let removed = {
            let mut mutations = self.0.mutations.borrow_mut();
            let evictable = mutations.get(key).map_or(false, |entry| entry.is_idle());
            if evictable {
                mutations.remove(key)
            } else {
                None
            }
        };

        match removed {
            Some(entry) => {
                entry.dispose();
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.queries.borrow().len()
    }

    /// Drops every entry and every mutation history.
    pub(crate) fn clear(&self) {
        let queries: Vec<_> = self.0.queries.borrow_mut().drain().collect();
        let mutations: Vec<_> = self.0.mutations.borrow_mut().drain().collect();

        for (_, mutation) in mutations {
            mutation.dispose();
        }
        for (key, query) in queries {
            query.dispose();
            self.notify(CacheEvent::Removed(key));
        }
    }

    pub(crate) fn register_observer(&self, observer: impl CacheObserver + 'static) -> CacheObserverKey {
        self.0.observers.borrow_mut().insert(Rc::new(observer))
    }

    pub(crate) fn unregister_observer(&self, key: CacheObserverKey) -> bool {
        self.0.observers.borrow_mut().remove(key).is_some()
    }

    pub(crate) fn notify(&self, event: CacheEvent) {
        let observers: Vec<_> = self.0.observers.borrow().values().cloned().collect();
        for observer in observers {
            observer.process_cache_event(event.clone())
        }
    }
}

impl WeakQueryCache {
    pub(crate) fn upgrade(&self) -> Option<QueryCache> {
        self.0.upgrade().map(QueryCache)
    }
}

fn downcast_query<T, E>(key: &QueryKey, entry: &dyn CacheEntry) -> Result<Query<T, E>, CacheError>
where
    T: QueryValue,
    E: QueryError,
{
    entry
        .as_any()
        .downcast_ref::<Query<T, E>>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch { key: key.clone() })
}

fn downcast_mutations<T, E>(
    key: &QueryKey,
    entry: &dyn MutationEntry,
) -> Result<Mutations<T, E>, CacheError>
where
    T: QueryValue,
    E: QueryError,
{
    entry
        .as_any()
        .downcast_ref::<Mutations<T, E>>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch { key: key.clone() })
}
