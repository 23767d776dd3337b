use crate::{
    engine::QueryEngine,
    hook_args::{dispatch, IntoHookArgs, QueryActionHookArgs},
    query_result::QueryActionResult,
    use_query_action_emitter::use_query_action_emitter_with,
    use_query_action_subscriber::use_query_action_subscriber_with,
    use_query_client, ActionArgs, QueryAction, QueryError, QueryValue,
};

/// Binds an action to the calling component.
///
/// The shape of `args` selects the mode:
/// - parameters (optionally reactive, optionally with [`SubscriberOptions`](crate::SubscriberOptions))
///   subscribe to the entry `[action key, ..params]`, like [`use_query_action_subscriber`](fn@crate::use_query_action_subscriber).
/// - [`EmitterOptions`](crate::EmitterOptions) invoke the action on demand, like
///   [`use_query_action_emitter`](fn@crate::use_query_action_emitter).
///
/// Requires a [`QueryClient`](crate::QueryClient) in context.
///
/// Example:
/// ```ignore
/// use leptos::*;
/// use leptos_query_action::*;
///
/// async fn fetch_greeting(id: u32) -> Result<String, ServerFnError> { .. }
///
/// #[component]
/// fn Greeting() -> impl IntoView {
///     let action = store_value(QueryAction::new(fetch_greeting));
///
///     // Subscribe.
///     let greeting = use_query_action(&action.get_value(), (Some(5),));
///
///     // Emit.
///     let refresh = use_query_action(&action.get_value(), EmitterOptions::default());
///
///     view! {
///         <p>{move || greeting.data().get()}</p>
///         <button on:click=move |_| {
///             if let Some(refresh) = refresh.emitter() {
///                 refresh.invalidate(&(5,));
///             }
///         }>
///             "Refresh"
///         </button>
///     }
/// }
/// ```
pub fn use_query_action<A, T, E>(
    action: &QueryAction<A, T, E>,
    args: impl IntoHookArgs<A, T, E>,
) -> QueryActionResult<A, T, E>
where
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    use_query_action_with(&use_query_client(), action, args)
}

/// [`use_query_action`] against an explicit engine.
pub fn use_query_action_with<Q, A, T, E>(
    engine: &Q,
    action: &QueryAction<A, T, E>,
    args: impl IntoHookArgs<A, T, E>,
) -> QueryActionResult<A, T, E>
where
    Q: QueryEngine,
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    match dispatch(args) {
        QueryActionHookArgs::Subscribe { params, options } => QueryActionResult::Subscriber(
            use_query_action_subscriber_with(engine, action, params, options),
        ),
        QueryActionHookArgs::Emit { options } => {
            QueryActionResult::Emitter(use_query_action_emitter_with(engine, action, options))
        }
    }
}
