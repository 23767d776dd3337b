use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use leptos::*;

use crate::{
    engine::QueryEngine,
    query_result::EmitterResult,
    use_query_client, ActionArgs, MutationState, MutationStatus, QueryAction, QueryError, QueryKey,
    QueryValue,
};

/// The value returned by [`on_perform`](EmitterOptions::set_on_perform), handed to the
/// settle callbacks of the same invocation.
#[derive(Clone, Default)]
pub struct PerformContext(Option<Rc<dyn Any>>);

impl PerformContext {
    /// Wraps a context value.
    pub fn new<C: 'static>(context: C) -> Self {
        PerformContext(Some(Rc::new(context)))
    }

    /// The context value, if one was produced and it has type `C`.
    pub fn get<C: 'static>(&self) -> Option<&C> {
        self.0.as_ref()?.downcast_ref()
    }
}

impl fmt::Debug for PerformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PerformContext")
            .field(&self.0.as_ref().map(|_| ".."))
            .finish()
    }
}

type OnPerform<A> = Rc<dyn Fn(&A) -> PerformContext>;
type OnSuccess<A, T> = Rc<dyn Fn(&T, &A, &PerformContext)>;
type OnError<A, E> = Rc<dyn Fn(&E, &A, &PerformContext)>;

/// Options for emitter mode.
pub struct EmitterOptions<A, T, E> {
    /// Runs synchronously when an invocation is issued.
    pub on_perform: Option<OnPerform<A>>,
    /// Runs once for every invocation that succeeds.
    pub on_success: Option<OnSuccess<A, T>>,
    /// Runs once for every invocation that fails.
    pub on_error: Option<OnError<A, E>>,
}

impl<A: 'static, T: 'static, E: 'static> EmitterOptions<A, T, E> {
    /// Set the callback run when an invocation is issued. Its return value is handed to
    /// the settle callbacks as a [`PerformContext`].
    pub fn set_on_perform<C: 'static>(self, on_perform: impl Fn(&A) -> C + 'static) -> Self {
        Self {
            on_perform: Some(Rc::new(move |args: &A| {
                PerformContext::new(on_perform(args))
            })),
            ..self
        }
    }

    /// Set the success callback.
    pub fn set_on_success(self, on_success: impl Fn(&T, &A, &PerformContext) + 'static) -> Self {
        Self {
            on_success: Some(Rc::new(on_success)),
            ..self
        }
    }

    /// Set the error callback.
    pub fn set_on_error(self, on_error: impl Fn(&E, &A, &PerformContext) + 'static) -> Self {
        Self {
            on_error: Some(Rc::new(on_error)),
            ..self
        }
    }
}

impl<A, T, E> Default for EmitterOptions<A, T, E> {
    fn default() -> Self {
        Self {
            on_perform: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl<A, T, E> Clone for EmitterOptions<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            on_perform: self.on_perform.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

/// Invokes an action on demand, and manages the cache entries of that action.
///
/// Every invocation is recorded under `[action key]`. The result reflects the most recent one,
/// except `data`, which keeps the last successful value while a newer invocation is pending
/// or has failed.
///
/// Example:
/// ```ignore
/// use leptos::*;
/// use leptos_query_action::*;
///
/// async fn rename_user(id: u32, name: String) -> Result<User, ServerFnError> { .. }
///
/// #[component]
/// fn Rename(id: u32) -> impl IntoView {
///     let action = store_value(QueryAction::new(rename_user));
///     let rename = use_query_action_emitter(
///         &action.get_value(),
///         EmitterOptions::default().set_on_success(move |user: &User, _, _| {
///             logging::log!("renamed to {}", user.name);
///         }),
///     );
///
///     view! {
///         <button
///             disabled=move || rename.is_loading.get()
///             on:click={
///                 let rename = rename.clone();
///                 move |_| rename.perform((id, "Alice".to_string()))
///             }
///         >
///             "Rename"
///         </button>
///     }
/// }
/// ```
pub fn use_query_action_emitter<A, T, E>(
    action: &QueryAction<A, T, E>,
    options: EmitterOptions<A, T, E>,
) -> EmitterResult<A, T, E>
where
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    use_query_action_emitter_with(&use_query_client(), action, options)
}

/// [`use_query_action_emitter`] against an explicit engine.
pub fn use_query_action_emitter_with<Q, A, T, E>(
    engine: &Q,
    action: &QueryAction<A, T, E>,
    options: EmitterOptions<A, T, E>,
) -> EmitterResult<A, T, E>
where
    Q: QueryEngine,
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    let EmitterOptions {
        on_perform,
        on_success,
        on_error,
    } = options;

    let root = QueryKey::new(action.key());
    let mutations = RwSignal::new(Vec::<MutationState<T, E>>::new());

    let (current, subscription) = engine.observe_mutations::<T, E>(
        root.clone(),
        Rc::new(move |states: &[MutationState<T, E>]| mutations.set(states.to_vec())),
    );
    mutations.set(current);

    let subscription = Rc::new(RefCell::new(Some(subscription)));
    on_cleanup({
        let subscription = subscription.clone();
        move || {
            let previous = subscription.borrow_mut().take();
            drop(previous);
        }
    });

    let perform = {
        let engine = engine.clone();
        let action = action.clone();
        let root = root.clone();

        Rc::new(move |args: A| {
            let context = on_perform
                .as_ref()
                .map(|on_perform| on_perform(&args))
                .unwrap_or_default();
            let invocation = action.call(args.clone());
            let on_success = on_success.clone();
            let on_error = on_error.clone();

            engine.mutate::<T, E>(
                root.clone(),
                Box::pin(async move {
                    let result = invocation.await;
                    match &result {
                        Ok(data) => {
                            if let Some(on_success) = on_success {
                                on_success(data, &args, &context)
                            }
                        }
                        Err(error) => {
                            if let Some(on_error) = on_error {
                                on_error(error, &args, &context)
                            }
                        }
                    }
                    result
                }),
            );
        })
    };

    let invalidate = {
        let engine = engine.clone();
        let root = root.clone();
        Rc::new(move |args: Option<&A>| {
            let prefix = match args {
                Some(args) => root.concat(args.key_segments()),
                None => root.clone(),
            };
            engine.invalidate_queries(&prefix)
        })
    };

    let set_data = {
        let engine = engine.clone();
        Rc::new(
            move |args: &A, updater: Box<dyn FnOnce(Option<&T>) -> Option<T>>| {
                engine.update_query_data::<T, E>(root.concat(args.key_segments()), updater)
            },
        )
    };

    let latest_status =
        move || mutations.with(|mutations| mutations.last().map(|mutation| mutation.status));

    EmitterResult {
        data: Signal::derive(move || {
            mutations.with(|mutations| {
                mutations
                    .iter()
                    .rev()
                    .find_map(|mutation| mutation.data.clone())
            })
        }),
        is_loading: Signal::derive(move || latest_status() == Some(MutationStatus::Pending)),
        is_success: Signal::derive(move || latest_status() == Some(MutationStatus::Success)),
        error: Signal::derive(move || {
            mutations.with(|mutations| {
                mutations
                    .last()
                    .and_then(|mutation| mutation.error.clone())
            })
        }),
        mutations: mutations.into(),
        perform,
        invalidate,
        set_data,
        _subscription: subscription,
    }
}
