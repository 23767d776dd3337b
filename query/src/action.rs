use std::{any::type_name, fmt::Debug, future::Future, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{
    action_key::{self, ActionHandle},
    engine::Fetcher,
    ActionKey, QueryError, QueryValue,
};

/// The positional arguments of an action, as a tuple.
///
/// Implemented for tuples of up to 8 `Clone + Debug` values. `()` is the argument list of an
/// action without parameters.
pub trait ActionArgs: Clone + Debug + 'static {
    /// The same tuple with every argument optional. `None` marks an argument that isn't ready.
    type Params: Clone + Debug + Default + 'static;

    /// Number of declared parameters.
    const ARITY: usize;

    /// Returns the arguments if every parameter is ready.
    fn from_params(params: &Self::Params) -> Option<Self>;

    /// One cache key segment per argument.
    fn key_segments(&self) -> Vec<String>;
}

/// An async function usable as an action: `Fn(A1, .., An) -> impl Future<Output = Result<T, E>>`.
pub trait ActionFn<A, T, E>: 'static {
    /// Starts one invocation.
    fn run(&self, args: A) -> LocalBoxFuture<'static, Result<T, E>>;
}

macro_rules! impl_action {
    ($arity:literal $(, $ty:ident $idx:tt)*) => {
        impl<$($ty,)*> ActionArgs for ($($ty,)*)
        where
            $($ty: Clone + Debug + 'static,)*
        {
            type Params = ($(Option<$ty>,)*);

            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn from_params(params: &Self::Params) -> Option<Self> {
                Some(($(params.$idx.clone()?,)*))
            }

            fn key_segments(&self) -> Vec<String> {
                vec![$(format!("{:?}", self.$idx)),*]
            }
        }

        impl<F, Fu, T, E, $($ty,)*> ActionFn<($($ty,)*), T, E> for F
        where
            F: Fn($($ty),*) -> Fu + 'static,
            Fu: Future<Output = Result<T, E>> + 'static,
        {
            #[allow(unused_variables)]
            fn run(&self, args: ($($ty,)*)) -> LocalBoxFuture<'static, Result<T, E>> {
                Box::pin(self($(args.$idx),*))
            }
        }
    };
}

impl_action!(0);
impl_action!(1, A1 0);
impl_action!(2, A1 0, A2 1);
impl_action!(3, A1 0, A2 1, A3 2);
impl_action!(4, A1 0, A2 1, A3 2, A4 3);
impl_action!(5, A1 0, A2 1, A3 2, A4 3, A5 4);
impl_action!(6, A1 0, A2 1, A3 2, A4 3, A5 4, A6 5);
impl_action!(7, A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6);
impl_action!(8, A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6, A8 7);

/// An async function with an identity.
///
/// Cloning an action shares its identity and therefore its [`ActionKey`]. Wrapping the same
/// function twice creates two unrelated actions with two cache namespaces.
///
/// ```ignore
/// async fn fetch_user(id: u32) -> Result<User, ServerFnError> { .. }
///
/// let action = QueryAction::new(fetch_user);
/// assert!(action.key().as_str().ends_with("_fetch_user"));
/// ```
pub struct QueryAction<A, T, E> {
    inner: Rc<ActionInner<A, T, E>>,
}

type Run<A, T, E> = Rc<dyn Fn(A) -> LocalBoxFuture<'static, Result<T, E>>>;

struct ActionInner<A, T, E> {
    handle: ActionHandle,
    name: Rc<str>,
    run: Run<A, T, E>,
}

impl<A, T, E> Drop for ActionInner<A, T, E> {
    fn drop(&mut self) {
        action_key::release(self.handle);
    }
}

impl<A, T, E> QueryAction<A, T, E>
where
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    /// Wraps `action`, named after the function.
    pub fn new<F>(action: F) -> Self
    where
        F: ActionFn<A, T, E>,
    {
        Self::named(function_name::<F>(), action)
    }

    /// Wraps `action` under an explicit name.
    pub fn named<F>(name: impl AsRef<str>, action: F) -> Self
    where
        F: ActionFn<A, T, E>,
    {
        let name: Rc<str> = Rc::from(name.as_ref());
        Self {
            inner: Rc::new(ActionInner {
                handle: action_key::register(name.clone()),
                name,
                run: Rc::new(move |args| action.run(args)),
            }),
        }
    }

    /// The declared name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The cache key of this action. Generated on first use, then stable.
    pub fn key(&self) -> ActionKey {
        action_key::derive_key(self.inner.handle, &self.inner.name)
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        A::ARITY
    }

    /// Starts one invocation with `args`.
    pub fn call(&self, args: A) -> LocalBoxFuture<'static, Result<T, E>> {
        (self.inner.run)(args)
    }

    /// Whether both values are clones of the same action.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A fetcher bound to `args`.
    pub(crate) fn fetcher(&self, args: A) -> Fetcher<T, E> {
        let run = self.inner.run.clone();
        Rc::new(move || run(args.clone()))
    }
}

impl<A, T, E> Clone for QueryAction<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, T, E> Debug for QueryAction<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryAction")
            .field("name", &self.inner.name)
            .finish()
    }
}

// `my_crate::api::fetch_user` -> `fetch_user`. Closures take the name of the enclosing fn.
fn function_name<F>() -> &'static str {
    let full = type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .unwrap_or("action")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_key::registered_actions;
    use futures::executor::block_on;

    async fn fetch_greeting(id: u32) -> Result<String, ()> {
        Ok(format!("fetched {id} data"))
    }

    async fn ping() -> Result<(), String> {
        Ok(())
    }

    async fn add(a: i32, b: i32) -> Result<i32, ()> {
        Ok(a + b)
    }

    #[test]
    fn same_action_same_key() {
        let action = QueryAction::new(fetch_greeting);
        let clone = action.clone();

        assert_eq!(action.key(), action.key());
        assert_eq!(action.key(), clone.key());
        assert!(action.ptr_eq(&clone));
    }

    #[test]
    fn same_function_distinct_actions() {
        let first = QueryAction::new(fetch_greeting);
        let second = QueryAction::new(fetch_greeting);

        assert_ne!(first.key(), second.key());
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn names() {
        assert_eq!("fetch_greeting", QueryAction::new(fetch_greeting).name());
        assert_eq!("custom", QueryAction::named("custom", ping).name());
        assert!(QueryAction::new(add).key().as_str().ends_with("_add"));

        let closure = QueryAction::new(|x: u8| async move { Ok::<_, ()>(x) });
        assert_eq!("names", closure.name());
    }

    #[test]
    fn arity_and_call() {
        assert_eq!(0, QueryAction::new(ping).arity());
        assert_eq!(1, QueryAction::new(fetch_greeting).arity());

        let add = QueryAction::new(add);
        assert_eq!(2, add.arity());
        assert_eq!(Ok(5), block_on(add.call((2, 3))));
    }

    #[test]
    fn key_entry_released_with_last_clone() {
        let before = registered_actions();

        let action = QueryAction::new(fetch_greeting);
        let clone = action.clone();
        let _ = action.key();
        assert_eq!(before + 1, registered_actions());

        drop(action);
        assert_eq!(before + 1, registered_actions());

        drop(clone);
        assert_eq!(before, registered_actions());
    }

    #[test]
    fn params_readiness() {
        type Args = (u32, String);

        assert_eq!(None, Args::from_params(&(Some(1), None)));
        assert_eq!(None, Args::from_params(&Default::default()));
        assert_eq!(
            Some((1, "en".to_string())),
            Args::from_params(&(Some(1), Some("en".to_string())))
        );
        assert_eq!(Some(()), <()>::from_params(&()));

        let args: Args = (5, "en".to_string());
        assert_eq!(vec!["5".to_string(), "\"en\"".to_string()], args.key_segments());
        assert!(().key_segments().is_empty());
    }
}
