use std::{
    any::Any,
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use slotmap::{new_key_type, SlotMap};

use crate::{
    engine::MutationListener,
    garbage_collector::GarbageCollector,
    query_cache::{MutationEntry, QueryCache},
    Instant, QueryError, QueryKey, QueryValue,
};

/// Identifies one invocation recorded in the mutation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl MutationId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        MutationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Running.
    Pending,
    /// Settled with a value.
    Success,
    /// Settled with an error.
    Error,
}

/// One invocation of an action, as recorded by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationState<T, E> {
    /// Issue order of the invocation.
    pub id: MutationId,
    /// Current status.
    pub status: MutationStatus,
    /// The value, once settled successfully.
    pub data: Option<T>,
    /// The error, once settled with a failure.
    pub error: Option<E>,
    /// When the invocation was issued.
    pub submitted_at: Instant,
}

impl<T, E> MutationState<T, E> {
    fn pending() -> Self {
        Self {
            id: MutationId::next(),
            status: MutationStatus::Pending,
            data: None,
            error: None,
            submitted_at: Instant::now(),
        }
    }

    /// The invocation has not settled yet.
    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }
}

new_key_type! {
    pub(crate) struct MutationListenerKey;
}

/// The mutation history recorded under one key, oldest first.
///
/// Only pending invocations, the newest invocation and the newest one with data are kept.
pub(crate) struct Mutations<T, E> {
    pub(crate) key: QueryKey,
    records: Rc<RefCell<Vec<MutationState<T, E>>>>,
    listeners: Rc<RefCell<SlotMap<MutationListenerKey, MutationListener<T, E>>>>,
    garbage_collector: GarbageCollector,
}

impl<T, E> Clone for Mutations<T, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            records: self.records.clone(),
            listeners: self.listeners.clone(),
            garbage_collector: self.garbage_collector.clone(),
        }
    }
}

impl<T, E> Mutations<T, E>
where
    T: QueryValue,
    E: QueryError,
{
    pub(crate) fn new(key: QueryKey, gc_time: Option<Duration>) -> Self {
        Self {
            key,
            records: Rc::new(RefCell::new(Vec::new())),
            listeners: Rc::new(RefCell::new(SlotMap::with_key())),
            garbage_collector: GarbageCollector::new(gc_time),
        }
    }

    pub(crate) fn states(&self) -> Vec<MutationState<T, E>> {
        self.records.borrow().clone()
    }

    /// Records a new pending invocation.
    pub(crate) fn start(&self) -> MutationId {
        self.garbage_collector.disable_gc();
        let record = MutationState::pending();
        let id = record.id;
        {
            let mut records = self.records.borrow_mut();
            records.push(record);
            prune(&mut records);
        }
        self.notify();
        id
    }

    pub(crate) fn settle(&self, cache: &QueryCache, id: MutationId, result: Result<T, E>) {
        let found = {
            let mut records = self.records.borrow_mut();
            let found = match records.iter_mut().find(|record| record.id == id) {
                Some(record) => {
                    match result {
                        Ok(data) => {
                            record.status = MutationStatus::Success;
                            record.data = Some(data);
                        }
                        Err(error) => {
                            record.status = MutationStatus::Error;
                            record.error = Some(error);
                        }
                    }
                    true
                }
                None => false,
            };
            prune(&mut records);
            found
        };

        if found {
            self.notify();
        }
        self.maybe_enable_gc(cache);
    }

    pub(crate) fn add_listener(&self, listener: MutationListener<T, E>) -> MutationListenerKey {
        self.garbage_collector.disable_gc();
        self.listeners.borrow_mut().insert(listener)
    }

    pub(crate) fn remove_listener(&self, cache: &QueryCache, listener_id: MutationListenerKey) {
        self.listeners.borrow_mut().remove(listener_id);
        self.maybe_enable_gc(cache);
    }

    /// No listeners and nothing in flight.
    pub(crate) fn is_idle(&self) -> bool {
        self.listeners.borrow().is_empty()
            && !self.records.borrow().iter().any(MutationState::is_pending)
    }

    fn maybe_enable_gc(&self, cache: &QueryCache) {
        if !self.is_idle() {
            return;
        }
        let cache = cache.downgrade();
        let key = self.key.clone();
        self.garbage_collector.enable_gc(move || {
            if let Some(cache) = cache.upgrade() {
                cache.evict_mutations(&key);
            }
        });
    }

    fn notify(&self) {
        let listeners: Vec<_> = self.listeners.borrow().values().cloned().collect();
        let records = self.states();
        for listener in listeners {
            listener(&records);
        }
    }
}

// Drops settled records superseded by a newer one and by a newer success.
fn prune<T, E>(records: &mut Vec<MutationState<T, E>>) {
    let last = records.len().saturating_sub(1);
    let last_with_data = records.iter().rposition(|record| record.data.is_some());

    let mut index = 0;
    records.retain(|record| {
        let keep = record.is_pending() || index == last || Some(index) == last_with_data;
        index += 1;
        keep
    });
}

impl<T, E> MutationEntry for Mutations<T, E>
where
    T: QueryValue,
    E: QueryError,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_idle(&self) -> bool {
        Mutations::is_idle(self)
    }

    fn dispose(&self) {
        self.garbage_collector.disable_gc();
        self.listeners.borrow_mut().clear();
    }
}
