use leptos::{MaybeSignal, Signal};

use crate::{ActionArgs, EmitterOptions, SubscriberOptions};

/// What a call to [`use_query_action`](fn@crate::use_query_action) asks for.
///
/// This is the explicit form of the call shape. Any [`IntoHookArgs`] value converts into it.
pub enum QueryActionHookArgs<A: ActionArgs, T: 'static, E: 'static> {
    /// Keep the entry `[action key, ..params]` in sync.
    Subscribe {
        /// Possibly reactive parameters. `None` marks a parameter that isn't ready.
        params: MaybeSignal<A::Params>,
        /// Subscription options.
        options: SubscriberOptions<T, E>,
    },
    /// Invoke the action on demand.
    Emit {
        /// Emitter options.
        options: EmitterOptions<A, T, E>,
    },
}

impl<A: ActionArgs, T: 'static, E: 'static> QueryActionHookArgs<A, T, E> {
    /// Subscription mode.
    pub fn subscribe(
        params: impl Into<MaybeSignal<A::Params>>,
        options: SubscriberOptions<T, E>,
    ) -> Self {
        QueryActionHookArgs::Subscribe {
            params: params.into(),
            options,
        }
    }

    /// Emitter mode.
    pub fn emit(options: EmitterOptions<A, T, E>) -> Self {
        QueryActionHookArgs::Emit { options }
    }

    /// Whether this selects subscription mode.
    pub fn is_subscribe(&self) -> bool {
        matches!(self, QueryActionHookArgs::Subscribe { .. })
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> std::fmt::Debug for QueryActionHookArgs<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryActionHookArgs::Subscribe { .. } => f.write_str("Subscribe"),
            QueryActionHookArgs::Emit { .. } => f.write_str("Emit"),
        }
    }
}

/// Call shapes accepted by [`use_query_action`](fn@crate::use_query_action).
///
/// A parameter tuple (optionally reactive, optionally paired with [`SubscriberOptions`])
/// selects subscription mode. [`EmitterOptions`] selects emitter mode.
///
/// | argument                                   | mode      |
/// |--------------------------------------------|-----------|
/// | `(Some(5),)`, `Signal<(Option<u32>,)>`      | subscribe |
/// | `((Some(5),), SubscriberOptions { .. })`   | subscribe |
/// | `()` for an action without parameters      | subscribe |
/// | `EmitterOptions::default()`                | emit      |
pub trait IntoHookArgs<A: ActionArgs, T: 'static, E: 'static> {
    /// Converts into the explicit form.
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E>;
}

/// Determines the mode selected by `args`.
pub fn dispatch<A, T, E>(args: impl IntoHookArgs<A, T, E>) -> QueryActionHookArgs<A, T, E>
where
    A: ActionArgs,
    T: 'static,
    E: 'static,
{
    args.into_hook_args()
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E> for QueryActionHookArgs<A, T, E> {
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        self
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E> for EmitterOptions<A, T, E> {
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        QueryActionHookArgs::emit(self)
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E> for Signal<A::Params> {
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        QueryActionHookArgs::subscribe(self, SubscriberOptions::default())
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E> for MaybeSignal<A::Params> {
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        QueryActionHookArgs::subscribe(self, SubscriberOptions::default())
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E>
    for (Signal<A::Params>, SubscriberOptions<T, E>)
{
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        QueryActionHookArgs::subscribe(self.0, self.1)
    }
}

impl<A: ActionArgs, T: 'static, E: 'static> IntoHookArgs<A, T, E>
    for (MaybeSignal<A::Params>, SubscriberOptions<T, E>)
{
    fn into_hook_args(self) -> QueryActionHookArgs<A, T, E> {
        QueryActionHookArgs::subscribe(self.0, self.1)
    }
}

macro_rules! impl_into_hook_args {
    ($($ty:ident),*) => {
        impl<$($ty,)* T, E> IntoHookArgs<($($ty,)*), T, E> for ($(Option<$ty>,)*)
        where
            $($ty: Clone + std::fmt::Debug + 'static,)*
            T: 'static,
            E: 'static,
        {
            fn into_hook_args(self) -> QueryActionHookArgs<($($ty,)*), T, E> {
                QueryActionHookArgs::subscribe(MaybeSignal::Static(self), SubscriberOptions::default())
            }
        }

        impl<$($ty,)* T, E> IntoHookArgs<($($ty,)*), T, E>
            for (($(Option<$ty>,)*), SubscriberOptions<T, E>)
        where
            $($ty: Clone + std::fmt::Debug + 'static,)*
            T: 'static,
            E: 'static,
        {
            fn into_hook_args(self) -> QueryActionHookArgs<($($ty,)*), T, E> {
                QueryActionHookArgs::subscribe(MaybeSignal::Static(self.0), self.1)
            }
        }
    };
}

impl_into_hook_args!();
impl_into_hook_args!(A1);
impl_into_hook_args!(A1, A2);
impl_into_hook_args!(A1, A2, A3);
impl_into_hook_args!(A1, A2, A3, A4);
impl_into_hook_args!(A1, A2, A3, A4, A5);
impl_into_hook_args!(A1, A2, A3, A4, A5, A6);
impl_into_hook_args!(A1, A2, A3, A4, A5, A6, A7);
impl_into_hook_args!(A1, A2, A3, A4, A5, A6, A7, A8);

#[cfg(test)]
mod tests {
    use leptos::*;

    use super::*;

    type Args = (u32, String);

    fn mode<A: ActionArgs>(args: impl IntoHookArgs<A, String, ()>) -> QueryActionHookArgs<A, String, ()> {
        dispatch(args)
    }

    #[test]
    fn parameter_tuples_subscribe() {
        let runtime = create_runtime();

        assert!(mode::<Args>((Some(1), Some("en".to_string()))).is_subscribe());
        assert!(mode::<Args>((Some(1), None)).is_subscribe());
        assert!(mode::<Args>(((None, None), SubscriberOptions::default())).is_subscribe());

        let params = RwSignal::new((Some(1_u32), None::<String>));
        assert!(mode::<Args>(Signal::from(params)).is_subscribe());
        assert!(mode::<Args>((Signal::from(params), SubscriberOptions::default())).is_subscribe());

        runtime.dispose();
    }

    #[test]
    fn options_emit() {
        assert!(!mode::<Args>(EmitterOptions::default()).is_subscribe());
        assert!(!mode::<(u32,)>(EmitterOptions::default()).is_subscribe());
    }

    #[test]
    fn zero_arity_is_explicit() {
        assert!(mode::<()>(()).is_subscribe());
        assert!(mode::<()>(((), SubscriberOptions::default())).is_subscribe());
        assert!(!mode::<()>(EmitterOptions::default()).is_subscribe());
    }

    #[test]
    fn explicit_form_passes_through() {
        let args = QueryActionHookArgs::<(u32,), String, ()>::emit(EmitterOptions::default());
        assert!(!mode(args).is_subscribe());

        let args = QueryActionHookArgs::<(u32,), String, ()>::subscribe(
            (Some(3),),
            SubscriberOptions::default(),
        );
        assert!(mode(args).is_subscribe());
    }

    #[test]
    fn static_params_are_kept() {
        let QueryActionHookArgs::Subscribe { params, .. } = mode::<(u32,)>((Some(7),)) else {
            panic!("expected subscription");
        };
        assert_eq!((Some(7),), params.get_untracked());
    }
}
