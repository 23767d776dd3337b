use std::{cell::RefCell, rc::Rc, time::Duration};

use leptos::*;

use crate::{
    engine::{ErrorCallback, ObserveOptions, QueryEngine, Subscription},
    query_result::SubscriberResult,
    use_query_client, ActionArgs, QueryAction, QueryError, QueryKey, QueryState, QueryValue,
    RefetchOnMount, Retention,
};

/// How long an entry is kept once no subscriber observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepData {
    /// Never remove the entry.
    Always,
    /// Remove the entry as soon as its last observer detaches.
    Never,
    /// Use the client's gc time.
    #[default]
    Auto,
}

impl KeepData {
    fn retention(self) -> Retention {
        match self {
            KeepData::Always => Retention::Forever,
            KeepData::Never => Retention::For(Duration::ZERO),
            KeepData::Auto => Retention::Default,
        }
    }
}

/// Options for subscription mode.
pub struct SubscriberOptions<T, E> {
    /// Retention of the entry once unobserved.
    pub keep_data: KeepData,
    /// Whether mounting refetches data that is already cached.
    pub refetch_on_mount: RefetchOnMount,
    /// Observe the entry without ever fetching it automatically.
    /// Writes and fetches made by others are still reflected.
    pub subscribe_only: bool,
    /// Called with the error of every failed fetch.
    pub on_error: Option<ErrorCallback<E>>,
    /// Overrides the client's stale time.
    pub stale_time: Option<Duration>,
    /// Shown while the entry has no data. Never written to the cache.
    pub placeholder_data: Option<T>,
    /// Seeds the entry if it has no data yet.
    pub initial_data: Option<T>,
}

impl<T, E> SubscriberOptions<T, E> {
    /// Set the retention policy.
    pub fn set_keep_data(self, keep_data: KeepData) -> Self {
        Self { keep_data, ..self }
    }

    /// Set the refetch-on-mount policy. `true` refetches stale data, `false` never refetches.
    pub fn set_refetch_on_mount(self, refetch_on_mount: impl Into<RefetchOnMount>) -> Self {
        Self {
            refetch_on_mount: refetch_on_mount.into(),
            ..self
        }
    }

    /// Observe without fetching.
    pub fn set_subscribe_only(self, subscribe_only: bool) -> Self {
        Self {
            subscribe_only,
            ..self
        }
    }

    /// Set the error callback.
    pub fn set_on_error(self, on_error: impl Fn(&E) + 'static) -> Self {
        Self {
            on_error: Some(Rc::new(on_error)),
            ..self
        }
    }

    /// Set the stale time.
    pub fn set_stale_time(self, stale_time: Option<Duration>) -> Self {
        Self { stale_time, ..self }
    }

    /// Set the placeholder data.
    pub fn set_placeholder_data(self, placeholder_data: Option<T>) -> Self {
        Self {
            placeholder_data,
            ..self
        }
    }

    /// Set the initial data.
    pub fn set_initial_data(self, initial_data: Option<T>) -> Self {
        Self {
            initial_data,
            ..self
        }
    }
}

impl<T, E> Default for SubscriberOptions<T, E> {
    fn default() -> Self {
        Self {
            keep_data: KeepData::default(),
            refetch_on_mount: RefetchOnMount::default(),
            subscribe_only: false,
            on_error: None,
            stale_time: None,
            placeholder_data: None,
            initial_data: None,
        }
    }
}

impl<T: Clone, E> Clone for SubscriberOptions<T, E> {
    fn clone(&self) -> Self {
        Self {
            keep_data: self.keep_data,
            refetch_on_mount: self.refetch_on_mount,
            subscribe_only: self.subscribe_only,
            on_error: self.on_error.clone(),
            stale_time: self.stale_time,
            placeholder_data: self.placeholder_data.clone(),
            initial_data: self.initial_data.clone(),
        }
    }
}

/// Keeps the entry `[action key, ..params]` in sync with the calling component.
///
/// The entry is fetched automatically once every parameter is `Some`, unless
/// [`subscribe_only`](SubscriberOptions::subscribe_only) is set. While a parameter is
/// `None` nothing is observed and the result stays empty.
///
/// Example:
/// ```ignore
/// use leptos::*;
/// use leptos_query_action::*;
///
/// async fn fetch_greeting(id: u32) -> Result<Greeting, ServerFnError> { .. }
///
/// #[component]
/// fn Greeting(#[prop(into)] id: Signal<Option<u32>>) -> impl IntoView {
///     let action = store_value(QueryAction::new(fetch_greeting));
///     let greeting = use_query_action_subscriber(
///         &action.get_value(),
///         Signal::derive(move || (id.get(),)),
///         SubscriberOptions::default().set_keep_data(KeepData::Always),
///     );
///
///     view! { <p>{move || greeting.data.get().map(|g| g.greeting)}</p> }
/// }
/// ```
pub fn use_query_action_subscriber<A, T, E>(
    action: &QueryAction<A, T, E>,
    params: impl Into<MaybeSignal<A::Params>>,
    options: SubscriberOptions<T, E>,
) -> SubscriberResult<T, E>
where
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    use_query_action_subscriber_with(&use_query_client(), action, params, options)
}

/// [`use_query_action_subscriber`] against an explicit engine.
pub fn use_query_action_subscriber_with<Q, A, T, E>(
    engine: &Q,
    action: &QueryAction<A, T, E>,
    params: impl Into<MaybeSignal<A::Params>>,
    options: SubscriberOptions<T, E>,
) -> SubscriberResult<T, E>
where
    Q: QueryEngine,
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    let params: MaybeSignal<A::Params> = params.into();
    let SubscriberOptions {
        keep_data,
        refetch_on_mount,
        subscribe_only,
        on_error,
        stale_time,
        placeholder_data,
        initial_data,
    } = options;

    let state = RwSignal::new(QueryState::<T, E>::Created);
    let subscription: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let root = QueryKey::new(action.key());

    create_isomorphic_effect({
        let engine = engine.clone();
        let action = action.clone();
        let subscription = subscription.clone();

        move |_| {
            let params = params.get();

            // Detach from the previous entry before attaching to the next one.
            let previous = subscription.borrow_mut().take();
            drop(previous);

            let Some(args) = A::from_params(&params) else {
                state.set(QueryState::Created);
                return;
            };

            let enabled = !subscribe_only;
            let retention = if enabled {
                keep_data.retention()
            } else {
                Retention::For(Duration::ZERO)
            };

            let (current, next) = engine.observe_query(
                root.concat(args.key_segments()),
                ObserveOptions {
                    fetcher: Some(action.fetcher(args)),
                    enabled,
                    retention,
                    stale_time,
                    refetch_on_mount,
                    on_error: on_error.clone(),
                    initial_data: initial_data.clone(),
                },
                Rc::new(move |next: &QueryState<T, E>| state.set(next.clone())),
            );

            state.set(current);
            *subscription.borrow_mut() = Some(next);
        }
    });

    on_cleanup({
        let subscription = subscription.clone();
        move || {
            let previous = subscription.borrow_mut().take();
            drop(previous);
        }
    });

    let refetch = Rc::new(move || {
        // Clone the trigger out so a fetch can replace the subscription.
        let refetch = subscription
            .borrow()
            .as_ref()
            .and_then(Subscription::refetch_handle);
        if let Some(refetch) = refetch {
            refetch()
        }
    });

    SubscriberResult {
        data: Signal::derive(move || {
            state
                .with(|state| state.data().cloned())
                .or_else(|| placeholder_data.clone())
        }),
        is_loading: Signal::derive(move || state.with(QueryState::is_fetching)),
        is_success: Signal::derive(move || state.with(QueryState::is_success)),
        error: Signal::derive(move || state.with(|state| state.error().cloned())),
        state: state.into(),
        refetch,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use futures::future::LocalBoxFuture;

    use super::*;
    use crate::engine::{MutationListener, QueryListener};
    use crate::MutationState;

    /// What the fake engine was asked to observe.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Observed {
        pub(crate) key: QueryKey,
        pub(crate) enabled: bool,
        pub(crate) has_fetcher: bool,
        pub(crate) retention: Retention,
        pub(crate) refetch_on_mount: RefetchOnMount,
    }

    /// Records every call, never fetches.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingEngine {
        pub(crate) observed: Rc<RefCell<Vec<Observed>>>,
        pub(crate) released: Rc<Cell<usize>>,
        pub(crate) invalidated: Rc<RefCell<Vec<QueryKey>>>,
        pub(crate) updated: Rc<RefCell<Vec<QueryKey>>>,
        pub(crate) mutated: Rc<RefCell<Vec<QueryKey>>>,
    }

    impl QueryEngine for RecordingEngine {
        fn observe_query<T, E>(
            &self,
            key: QueryKey,
            options: ObserveOptions<T, E>,
            _listener: QueryListener<T, E>,
        ) -> (QueryState<T, E>, Subscription)
        where
            T: QueryValue,
            E: QueryError,
        {
            self.observed.borrow_mut().push(Observed {
                key,
                enabled: options.enabled,
                has_fetcher: options.fetcher.is_some(),
                retention: options.retention,
                refetch_on_mount: options.refetch_on_mount,
            });
            let released = self.released.clone();
            (
                QueryState::Created,
                Subscription::new(move || released.set(released.get() + 1)),
            )
        }

        fn mutate<T, E>(&self, key: QueryKey, _mutation: LocalBoxFuture<'static, Result<T, E>>)
        where
            T: QueryValue,
            E: QueryError,
        {
            self.mutated.borrow_mut().push(key);
        }

        fn observe_mutations<T, E>(
            &self,
            _key: QueryKey,
            _listener: MutationListener<T, E>,
        ) -> (Vec<MutationState<T, E>>, Subscription)
        where
            T: QueryValue,
            E: QueryError,
        {
            (Vec::new(), Subscription::detached())
        }

        fn update_query_data<T, E>(
            &self,
            key: QueryKey,
            _updater: Box<dyn FnOnce(Option<&T>) -> Option<T>>,
        ) where
            T: QueryValue,
            E: QueryError,
        {
            self.updated.borrow_mut().push(key);
        }

        fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
            self.invalidated.borrow_mut().push(prefix.clone());
            0
        }
    }

    async fn fetch_translation(id: u32, lang: String) -> Result<String, ()> {
        Ok(format!("{id}:{lang}"))
    }

    #[test]
    fn enabled_only_when_params_ready() {
        let runtime = create_runtime();
        let engine = RecordingEngine::default();
        let action = QueryAction::new(fetch_translation);

        let id = RwSignal::new(None::<u32>);
        let lang = RwSignal::new(Some("en".to_string()));

        let _result = use_query_action_subscriber_with(
            &engine,
            &action,
            Signal::derive(move || (id.get(), lang.get())),
            SubscriberOptions::default(),
        );
        assert!(engine.observed.borrow().is_empty(), "parameter missing");

        id.set(Some(5));
        {
            let observed = engine.observed.borrow();
            assert_eq!(1, observed.len());
            assert!(observed[0].enabled);
            assert!(observed[0].has_fetcher);
            assert_eq!(
                QueryKey::new(action.key()).concat(["5", "\"en\""]),
                observed[0].key
            );
        }

        lang.set(None);
        assert_eq!(1, engine.observed.borrow().len());
        assert_eq!(1, engine.released.get(), "detached from the old entry");

        runtime.dispose();
    }

    #[test]
    fn subscribe_only_disables_fetching() {
        let runtime = create_runtime();
        let engine = RecordingEngine::default();
        let action = QueryAction::new(fetch_translation);

        let _result = use_query_action_subscriber_with(
            &engine,
            &action,
            (Some(1), Some("de".to_string())),
            SubscriberOptions::default()
                .set_subscribe_only(true)
                .set_keep_data(KeepData::Always),
        );

        let observed = engine.observed.borrow();
        assert!(!observed[0].enabled);
        assert!(observed[0].has_fetcher, "manual refetch stays possible");
        assert_eq!(Retention::For(Duration::ZERO), observed[0].retention);

        runtime.dispose();
    }

    #[test]
    fn keep_data_maps_to_retention() {
        let runtime = create_runtime();
        let engine = RecordingEngine::default();
        let action = QueryAction::new(fetch_translation);

        for keep_data in [KeepData::Always, KeepData::Never, KeepData::Auto] {
            let _result = use_query_action_subscriber_with(
                &engine,
                &action,
                (Some(1), Some("fr".to_string())),
                SubscriberOptions::default()
                    .set_keep_data(keep_data)
                    .set_refetch_on_mount(false),
            );
        }

        let observed = engine.observed.borrow();
        let retentions: Vec<_> = observed.iter().map(|o| o.retention).collect();
        assert_eq!(
            vec![
                Retention::Forever,
                Retention::For(Duration::ZERO),
                Retention::Default
            ],
            retentions
        );
        assert!(observed
            .iter()
            .all(|o| o.refetch_on_mount == RefetchOnMount::Never));

        runtime.dispose();
    }

    #[cfg(not(any(feature = "csr", feature = "hydrate")))]
    mod with_client {
        use crate::query_client::tests::client_with_pool;

        use super::*;

        async fn fetch_greeting(id: u32) -> Result<String, String> {
            Ok(format!("fetched {id} data"))
        }

        async fn fail(_id: u32) -> Result<String, String> {
            Err("boom".to_string())
        }

        #[test]
        fn placeholder_until_fetched() {
            let runtime = create_runtime();
            let (client, mut pool) = client_with_pool();
            let action = QueryAction::new(fetch_greeting);
            let key = QueryKey::new(action.key()).concat(["5"]);

            let result = use_query_action_subscriber_with(
                &client,
                &action,
                (Some(5),),
                SubscriberOptions::default().set_placeholder_data(Some("placeholder".to_string())),
            );

            assert_eq!(Some("placeholder".to_string()), result.data.get_untracked());
            assert!(result.is_loading.get_untracked());
            assert!(!result.is_success.get_untracked());
            assert_eq!(Ok(None), client.get_query_data::<String, String>(&key));

            pool.run_until_stalled();

            assert_eq!(Some("fetched 5 data".to_string()), result.data.get_untracked());
            assert!(!result.is_loading.get_untracked());
            assert!(result.is_success.get_untracked());
            assert_eq!(None, result.error.get_untracked());
            assert_eq!(
                Ok(Some("fetched 5 data".to_string())),
                client.get_query_data::<String, String>(&key)
            );

            runtime.dispose();
        }

        #[test]
        fn errors_reach_signal_and_callback() {
            let runtime = create_runtime();
            let (client, mut pool) = client_with_pool();
            let action = QueryAction::new(fail);
            let errors = Rc::new(RefCell::new(Vec::new()));

            let result = use_query_action_subscriber_with(
                &client,
                &action,
                (Some(1),),
                SubscriberOptions::default().set_on_error({
                    let errors = errors.clone();
                    move |error: &String| errors.borrow_mut().push(error.clone())
                }),
            );
            pool.run_until_stalled();

            assert_eq!(Some("boom".to_string()), result.error.get_untracked());
            assert_eq!(None, result.data.get_untracked());
            assert!(!result.is_success.get_untracked());
            assert_eq!(vec!["boom".to_string()], *errors.borrow());

            runtime.dispose();
        }

        #[test]
        fn keep_data_controls_eviction() {
            let runtime = create_runtime();

            for (keep_data, expected_size) in [(KeepData::Always, 1), (KeepData::Never, 0)] {
                let (client, mut pool) = client_with_pool();
                let action = QueryAction::new(fetch_greeting);
                let id = RwSignal::new(Some(1_u32));

                let result = use_query_action_subscriber_with(
                    &client,
                    &action,
                    Signal::derive(move || (id.get(),)),
                    SubscriberOptions::default().set_keep_data(keep_data),
                );
                pool.run_until_stalled();
                assert_eq!(1, client.size());

                id.set(None);
                assert_eq!(expected_size, client.size(), "{keep_data:?}");
                assert_eq!(None, result.data.get_untracked());
            }

            runtime.dispose();
        }

        #[test]
        fn params_switch_entries() {
            let runtime = create_runtime();
            let (client, mut pool) = client_with_pool();
            let action = QueryAction::new(fetch_greeting);
            let id = RwSignal::new(Some(1_u32));

            let result = use_query_action_subscriber_with(
                &client,
                &action,
                Signal::derive(move || (id.get(),)),
                SubscriberOptions::default(),
            );
            pool.run_until_stalled();
            assert_eq!(Some("fetched 1 data".to_string()), result.data.get_untracked());

            id.set(Some(2));
            assert!(result.is_loading.get_untracked());
            pool.run_until_stalled();
            assert_eq!(Some("fetched 2 data".to_string()), result.data.get_untracked());

            runtime.dispose();
        }

        #[test]
        fn subscribe_only_fetches_on_refetch() {
            let runtime = create_runtime();
            let (client, mut pool) = client_with_pool();
            let calls = Rc::new(Cell::new(0));
            let action = QueryAction::named("count", {
                let calls = calls.clone();
                move |step: u32| {
                    calls.set(calls.get() + 1);
                    let n = calls.get() * step;
                    async move { Ok::<_, String>(n) }
                }
            });

            let result = use_query_action_subscriber_with(
                &client,
                &action,
                (Some(10),),
                SubscriberOptions::default().set_subscribe_only(true),
            );
            pool.run_until_stalled();
            assert_eq!(0, calls.get());
            assert_eq!(None, result.data.get_untracked());

            // Writes made elsewhere are still observed.
            client
                .set_query_data::<u32, String>(QueryKey::new(action.key()).concat(["10"]), 7)
                .unwrap();
            assert_eq!(Some(7), result.data.get_untracked());

            result.refetch();
            pool.run_until_stalled();
            assert_eq!(1, calls.get());
            assert_eq!(Some(10), result.data.get_untracked());

            runtime.dispose();
        }
    }
}
