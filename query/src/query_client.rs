use std::rc::Rc;

use futures::future::LocalBoxFuture;
use leptos::*;

use crate::{
    cache_observer::CacheObserver,
    engine::{MutationListener, ObserveOptions, QueryEngine, QueryListener, Subscription},
    query_cache::{CacheObserverKey, QueryCache},
    query_observer::QueryObserver,
    CacheError, DefaultQueryOptions, MutationState, QueryData, QueryError, QueryKey, QueryState,
    QueryValue, RefetchOnMount,
};

/// Provides a Query Client to the current scope.
pub fn provide_query_client() {
    provide_query_client_with_options(DefaultQueryOptions::default());
}

/// Provides a Query Client to the current scope with custom options.
pub fn provide_query_client_with_options(options: DefaultQueryOptions) {
    provide_context(QueryClient::new(options));
}

/// Retrieves a Query Client from the current scope.
///
/// Panics if no client was provided with [`provide_query_client`].
pub fn use_query_client() -> QueryClient {
    use_context::<QueryClient>().expect("Query Client Missing.")
}

/// The Cache Client to store query data.
/// Exposes utility functions to manage queries.
///
/// Queries can be:
/// - [Invalidated](Self::invalidate_queries)
///     - Matching queries refetch on next usage. Active queries are immediately refetched in the background.
/// - [Introspected](Self::get_query_state)
///     - Lets you see what the current value of a query is.
/// - [Manually updated](Self::update_query_data)
///     - Useful when you have updated a value and you want to manually set it in cache instead of waiting for query to refetch.
///
/// The client is also the default [`QueryEngine`] behind the action hooks.
#[derive(Clone)]
pub struct QueryClient {
    pub(crate) cache: QueryCache,
    pub(crate) default_options: DefaultQueryOptions,
}

impl QueryClient {
    /// Creates a new Query Client. Fetches run on [`leptos::spawn_local`].
    pub fn new(default_options: DefaultQueryOptions) -> Self {
        Self::with_spawner(default_options, |fut| leptos::spawn_local(fut))
    }

    /// Creates a new Query Client that runs fetches through `spawner`.
    pub fn with_spawner(
        default_options: DefaultQueryOptions,
        spawner: impl Fn(LocalBoxFuture<'static, ()>) + 'static,
    ) -> Self {
        Self {
            cache: QueryCache::new(Rc::new(spawner)),
            default_options: default_options.validate(),
        }
    }

    /// The options every query falls back to.
    pub fn default_options(&self) -> DefaultQueryOptions {
        self.default_options
    }

    /// Retrieve the current state for an existing query.
    /// If the query does not exist, [`None`](Option::None) will be returned.
    pub fn get_query_state<T, E>(&self, key: &QueryKey) -> Result<Option<QueryState<T, E>>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        Ok(self.cache.get_query::<T, E>(key)?.map(|query| query.get_state()))
    }

    /// Retrieve the current data for an existing query.
    pub fn get_query_data<T, E>(&self, key: &QueryKey) -> Result<Option<T>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        Ok(self
            .cache
            .get_query::<T, E>(key)?
            .and_then(|query| query.with_state(|state| state.data().cloned())))
    }

    /// Attempts to invalidate the entry under exactly `key`.
    /// Matching query is marked as invalid, and will be refetched in background once it's active.
    ///
    /// Returns true if the entry was successfully invalidated.
    pub fn invalidate_query(&self, key: &QueryKey) -> bool {
        self.cache.invalidate_query(key)
    }

    /// Invalidates every entry whose key starts with `prefix`.
    /// Active queries are refetched in the background.
    ///
    /// Returns how many entries were invalidated.
    ///
    /// Example:
    /// ```ignore
    /// use leptos_query_action::*;
    ///
    /// fn invalidate_user(action: &QueryAction<(u32,), User, String>, id: u32) {
    ///     let client = use_query_client();
    ///     let prefix = QueryKey::new(action.key()).concat([format!("{id:?}")]);
    ///     client.invalidate_queries(&prefix);
    /// }
    /// ```
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        self.cache.invalidate_queries(prefix)
    }

    /// Invalidates all queries in the cache.
    pub fn invalidate_all_queries(&self) -> usize {
        self.cache.invalidate_all_queries()
    }

    /// Returns the amount of queries in the cache.
    pub fn size(&self) -> usize {
        self.cache.len()
    }

    /// A synchronous function for updating an existing query's data.
    /// If the query does not exist, it will be created.
    ///
    /// The updater receives the current data. Returning `None` leaves the query untouched.
    /// Returns whether the data was written.
    ///
    /// Example:
    /// ```ignore
    /// use leptos_query_action::*;
    ///
    /// fn rename(key: QueryKey) {
    ///     let client = use_query_client();
    ///     // Overwrite existing data.
    ///     client.update_query_data::<String, ()>(key.clone(), |_| Some("George".to_string()));
    ///
    ///     // Don't overwrite George.
    ///     client.update_query_data::<String, ()>(key, |name| match name {
    ///         Some(name) if name == "George" => None,
    ///         _ => Some("Luffy".to_string()),
    ///     });
    /// }
    /// ```
    pub fn update_query_data<T, E>(
        &self,
        key: QueryKey,
        updater: impl FnOnce(Option<&T>) -> Option<T>,
    ) -> Result<bool, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        let query = match self.cache.get_query::<T, E>(&key)? {
            Some(query) => query,
            None => {
                let Some(data) = updater(None) else {
                    return Ok(false);
                };
                let (query, _) = self
                    .cache
                    .get_or_create_query::<T, E>(&key, self.default_options.gc_time)?;
                query.set_state(&self.cache, QueryState::Loaded(QueryData::now(data)));
                // Nothing observes it yet.
                query.enable_gc(&self.cache);
                return Ok(true);
            }
        };

        Ok(query.maybe_map_state(&self.cache, |state| {
            let updated = updater(state.data());
            match (updated, state) {
                (None, state) => Err(state),
                (Some(data), QueryState::Fetching(_)) => {
                    Ok(QueryState::Fetching(QueryData::now(data)))
                }
                (Some(data), _) => Ok(QueryState::Loaded(QueryData::now(data))),
            }
        }))
    }

    /// Update the query's data.
    /// If the query does not exist, it will be created.
    pub fn set_query_data<T, E>(&self, key: QueryKey, data: T) -> Result<(), CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        self.update_query_data::<T, E>(key, |_| Some(data)).map(|_| ())
    }

    /// The mutation history recorded under `key`, oldest first.
    pub fn mutation_states<T, E>(&self, key: &QueryKey) -> Result<Vec<MutationState<T, E>>, CacheError>
    where
        T: QueryValue,
        E: QueryError,
    {
        Ok(self
            .cache
            .get_mutations::<T, E>(key)?
            .map(|mutations| mutations.states())
            .unwrap_or_default())
    }

    /// Registers the cache observer.
    pub fn register_cache_observer(&self, observer: impl CacheObserver + 'static) -> CacheObserverKey {
        self.cache.register_observer(observer)
    }

    /// Removes a cache observer. Returns false if it was not registered.
    pub fn unregister_cache_observer(&self, key: CacheObserverKey) -> bool {
        self.cache.unregister_observer(key)
    }

    /// Clears the cache. All queries and mutation histories will be removed.
    pub fn clear(&self) {
        self.cache.clear()
    }
}

impl QueryEngine for QueryClient {
    fn observe_query<T, E>(
        &self,
        key: QueryKey,
        options: ObserveOptions<T, E>,
        listener: QueryListener<T, E>,
    ) -> (QueryState<T, E>, Subscription)
    where
        T: QueryValue,
        E: QueryError,
    {
        let ObserveOptions {
            fetcher,
            enabled,
            retention,
            stale_time,
            refetch_on_mount,
            on_error,
            initial_data,
        } = options;

        let gc_time = retention.resolve(self.default_options.gc_time);
        let query = match self.cache.get_or_create_query::<T, E>(&key, gc_time) {
            Ok((query, _)) => query,
            Err(error) => {
                logging::error!("{error}");
                return (QueryState::Created, Subscription::detached());
            }
        };
        query.garbage_collector.update_gc_time(gc_time);

        if let Some(initial_data) = initial_data {
            query.maybe_map_state(&self.cache, move |state| match state {
                QueryState::Created => Ok(QueryState::Loaded(QueryData::now(initial_data))),
                state => Err(state),
            });
        }

        let observer_id = query.subscribe(
            &self.cache,
            QueryObserver {
                fetcher: fetcher.clone(),
                enabled,
                stale_time,
                on_error,
                listener,
            },
        );

        if let (true, Some(fetcher)) = (enabled, fetcher.as_ref()) {
            let stale_time = stale_time.or(self.default_options.stale_time);
            let should_fetch = query.with_state(|state| state.data().is_none())
                || match refetch_on_mount {
                    RefetchOnMount::Never => false,
                    RefetchOnMount::IfStale => query.is_stale(stale_time),
                    RefetchOnMount::Always => true,
                };

            if should_fetch {
                query.fetch_with(&self.cache, fetcher.clone());
            }
        }

        let state = query.get_state();

        let subscription = {
            let query = query.clone();
            let cache = self.cache.clone();
            Subscription::new(move || query.unsubscribe(&cache, observer_id))
        };

        let subscription = match fetcher {
            Some(fetcher) => {
                let cache = self.cache.clone();
                subscription.with_refetch(move || query.fetch_with(&cache, fetcher.clone()))
            }
            None => subscription,
        };

        (state, subscription)
    }

    fn mutate<T, E>(&self, key: QueryKey, mutation: LocalBoxFuture<'static, Result<T, E>>)
    where
        T: QueryValue,
        E: QueryError,
    {
        let mutations = match self
            .cache
            .get_or_create_mutations::<T, E>(&key, self.default_options.gc_time)
        {
            Ok(mutations) => mutations,
            Err(error) => {
                logging::error!("{error}");
                return;
            }
        };

        let id = mutations.start();
        let cache = self.cache.clone();
        self.cache.spawn(Box::pin(async move {
            let result = mutation.await;
            mutations.settle(&cache, id, result);
        }));
    }

    fn observe_mutations<T, E>(
        &self,
        key: QueryKey,
        listener: MutationListener<T, E>,
    ) -> (Vec<MutationState<T, E>>, Subscription)
    where
        T: QueryValue,
        E: QueryError,
    {
        let mutations = match self
            .cache
            .get_or_create_mutations::<T, E>(&key, self.default_options.gc_time)
        {
            Ok(mutations) => mutations,
            Err(error) => {
                logging::error!("{error}");
                return (Vec::new(), Subscription::detached());
            }
        };

        let listener_id = mutations.add_listener(listener);
        let states = mutations.states();
        let cache = self.cache.clone();

        (
            states,
            Subscription::new(move || mutations.remove_listener(&cache, listener_id)),
        )
    }

    fn update_query_data<T, E>(
        &self,
        key: QueryKey,
        updater: Box<dyn FnOnce(Option<&T>) -> Option<T>>,
    ) where
        T: QueryValue,
        E: QueryError,
    {
        if let Err(error) = QueryClient::update_query_data::<T, E>(self, key, updater) {
            logging::error!("{error}");
        }
    }

    fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        QueryClient::invalidate_queries(self, prefix)
    }
}
