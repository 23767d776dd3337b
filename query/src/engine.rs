use std::{rc::Rc, time::Duration};

use futures::future::LocalBoxFuture;

use crate::{
    MutationState, QueryError, QueryKey, QueryState, QueryValue, RefetchOnMount, Retention,
};

/// A zero-argument fetch function. Calling it starts one invocation of an action.
pub type Fetcher<T, E> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, E>>>;

/// Receives the error of a failed fetch.
pub type ErrorCallback<E> = Rc<dyn Fn(&E)>;

/// Notified with the new state every time an observed entry changes.
pub type QueryListener<T, E> = Rc<dyn Fn(&QueryState<T, E>)>;

/// Notified with the full mutation history of a key every time it changes.
pub type MutationListener<T, E> = Rc<dyn Fn(&[MutationState<T, E>])>;

/// The query/cache capabilities the action hooks delegate to.
///
/// [`QueryClient`](crate::QueryClient) is the default implementation. Hooks take any engine
/// through their `*_with` variants, so alternative engines (or fakes in tests) can be injected.
pub trait QueryEngine: Clone + 'static {
    /// Attaches an observer to the entry under `key`, creating the entry if needed.
    ///
    /// Returns the entry's state right after attaching (and after any fetch it started),
    /// plus a [`Subscription`] that detaches the observer when dropped.
    fn observe_query<T, E>(
        &self,
        key: QueryKey,
        options: ObserveOptions<T, E>,
        listener: QueryListener<T, E>,
    ) -> (QueryState<T, E>, Subscription)
    where
        T: QueryValue,
        E: QueryError;

    /// Records a new mutation under `key` and drives `mutation` to completion.
    fn mutate<T, E>(&self, key: QueryKey, mutation: LocalBoxFuture<'static, Result<T, E>>)
    where
        T: QueryValue,
        E: QueryError;

    /// Observes the mutation history recorded under `key`, oldest first.
    fn observe_mutations<T, E>(
        &self,
        key: QueryKey,
        listener: MutationListener<T, E>,
    ) -> (Vec<MutationState<T, E>>, Subscription)
    where
        T: QueryValue,
        E: QueryError;

    /// Overwrites the data under `key` without running a fetch.
    /// The updater receives the current data. Returning `None` leaves the entry untouched.
    fn update_query_data<T, E>(
        &self,
        key: QueryKey,
        updater: Box<dyn FnOnce(Option<&T>) -> Option<T>>,
    ) where
        T: QueryValue,
        E: QueryError;

    /// Marks every entry whose key starts with `prefix` as stale.
    /// Entries with active observers refetch in the background.
    ///
    /// Returns how many entries were invalidated.
    fn invalidate_queries(&self, prefix: &QueryKey) -> usize;
}

/// How an observer wants an entry to be fetched and retained.
pub struct ObserveOptions<T, E> {
    /// Fetches the entry. `None` if the observer cannot fetch (e.g. arguments are missing).
    pub fetcher: Option<Fetcher<T, E>>,
    /// Whether the engine may fetch automatically for this observer.
    /// A disabled observer still receives every state change.
    pub enabled: bool,
    /// How long the entry lives once unobserved.
    pub retention: Retention,
    /// Overrides the client's stale time. Only affects the refetch-on-mount check.
    pub stale_time: Option<Duration>,
    /// Whether attaching triggers a refetch of existing data.
    pub refetch_on_mount: RefetchOnMount,
    /// Called for every failed fetch while attached.
    pub on_error: Option<ErrorCallback<E>>,
    /// Seeds an entry that has no data yet.
    pub initial_data: Option<T>,
}

impl<T, E> Default for ObserveOptions<T, E> {
    fn default() -> Self {
        Self {
            fetcher: None,
            enabled: true,
            retention: Retention::Default,
            stale_time: None,
            refetch_on_mount: RefetchOnMount::default(),
            on_error: None,
            initial_data: None,
        }
    }
}

/// Keeps an observer attached. Dropping it detaches the observer.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    refetch: Option<Rc<dyn Fn()>>,
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Runs `release` when the subscription is dropped.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            refetch: None,
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self {
            refetch: None,
            release: None,
        }
    }

    /// Attaches a manual refetch trigger.
    pub fn with_refetch(mut self, refetch: impl Fn() + 'static) -> Self {
        self.refetch = Some(Rc::new(refetch));
        self
    }

    /// Triggers a fetch of the observed entry, if the observer has a fetcher.
    pub fn refetch(&self) {
        if let Some(refetch) = &self.refetch {
            refetch()
        }
    }

    /// The refetch trigger, callable without holding on to the subscription.
    pub fn refetch_handle(&self) -> Option<Rc<dyn Fn()>> {
        self.refetch.clone()
    }

    /// Detaches now.
    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release()
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("refetch", &self.refetch.is_some())
            .field("attached", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscription_releases_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let refetched = Rc::new(Cell::new(0));

        let subscription = Subscription::new({
            let released = released.clone();
            move || released.set(released.get() + 1)
        })
        .with_refetch({
            let refetched = refetched.clone();
            move || refetched.set(refetched.get() + 1)
        });

        subscription.refetch();
        let handle = subscription.refetch_handle().expect("refetch handle");
        handle();
        assert_eq!(refetched.get(), 2);
        assert_eq!(released.get(), 0);

        subscription.unsubscribe();
        assert_eq!(released.get(), 1);

        // The handle outlives the subscription but never releases again.
        handle();
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn detached_subscription_is_inert() {
        let subscription = Subscription::detached();
        subscription.refetch();
        assert!(subscription.refetch_handle().is_none());
    }
}
