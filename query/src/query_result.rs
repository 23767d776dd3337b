use std::{cell::RefCell, rc::Rc};

use leptos::*;

use crate::{engine::Subscription, MutationState, QueryState};

/// Reactive result of a subscribing action hook.
#[derive(Clone)]
pub struct SubscriberResult<T: 'static, E: 'static> {
    /// The cached value, or the placeholder while there is none.
    pub data: Signal<Option<T>>,
    /// A fetch for the current entry is in flight.
    pub is_loading: Signal<bool>,
    /// The entry holds data and the last fetch did not fail.
    pub is_success: Signal<bool>,
    /// The error of the last fetch, if it failed.
    pub error: Signal<Option<E>>,
    /// The full state of the current entry.
    pub state: Signal<QueryState<T, E>>,

    pub(crate) refetch: Rc<dyn Fn()>,
}

impl<T: 'static, E: 'static> SubscriberResult<T, E> {
    /// Refetch the current entry, even if it is fresh or the subscription is passive.
    pub fn refetch(&self) {
        (self.refetch)()
    }
}

/// Reactive result of an emitting action hook.
#[derive(Clone)]
pub struct EmitterResult<A: 'static, T: 'static, E: 'static> {
    /// Data of the most recent invocation that succeeded.
    ///
    /// This is not the state of the newest invocation: while it is pending, and after it
    /// fails, `data` still holds the previous success. Check `is_success` or `error` to tell
    /// whether the newest invocation produced it.
    pub data: Signal<Option<T>>,
    /// The most recent invocation is pending.
    pub is_loading: Signal<bool>,
    /// The most recent invocation succeeded.
    pub is_success: Signal<bool>,
    /// The error of the most recent invocation, if it failed.
    pub error: Signal<Option<E>>,
    /// Recorded invocations, oldest first: every pending one, the newest one and the newest
    /// one with data. Older settled invocations are dropped.
    pub mutations: Signal<Vec<MutationState<T, E>>>,

    pub(crate) perform: Rc<dyn Fn(A)>,
    pub(crate) invalidate: Rc<dyn Fn(Option<&A>) -> usize>,
    pub(crate) set_data: Rc<dyn Fn(&A, Box<dyn FnOnce(Option<&T>) -> Option<T>>)>,
    pub(crate) _subscription: Rc<RefCell<Option<Subscription>>>,
}

impl<A: 'static, T: 'static, E: 'static> EmitterResult<A, T, E> {
    /// Invokes the action with `args`.
    pub fn perform(&self, args: A) {
        (self.perform)(args)
    }

    /// Marks every entry under `[action key, ..args]` stale. Active subscribers refetch.
    /// Returns how many entries were invalidated.
    pub fn invalidate(&self, args: &A) -> usize {
        (self.invalidate)(Some(args))
    }

    /// Marks every entry of the action stale, whatever its arguments.
    pub fn invalidate_all(&self) -> usize {
        (self.invalidate)(None)
    }

    /// Overwrites the entry for `args` without invoking the action.
    /// Returning `None` from `updater` leaves the entry untouched.
    pub fn set_data(&self, args: &A, updater: impl FnOnce(Option<&T>) -> Option<T> + 'static) {
        (self.set_data)(args, Box::new(updater))
    }
}

/// Result of [`use_query_action`](fn@crate::use_query_action), shaped by the selected mode.
///
/// Both modes expose `data`, `is_loading`, `is_success` and `error`.
#[derive(Clone)]
pub enum QueryActionResult<A: 'static, T: 'static, E: 'static> {
    /// Subscription mode.
    Subscriber(SubscriberResult<T, E>),
    /// Emitter mode.
    Emitter(EmitterResult<A, T, E>),
}

impl<A: 'static, T: 'static, E: 'static> QueryActionResult<A, T, E> {
    /// The current value.
    pub fn data(&self) -> Signal<Option<T>> {
        match self {
            QueryActionResult::Subscriber(result) => result.data,
            QueryActionResult::Emitter(result) => result.data,
        }
    }

    /// Whether work is in flight.
    pub fn is_loading(&self) -> Signal<bool> {
        match self {
            QueryActionResult::Subscriber(result) => result.is_loading,
            QueryActionResult::Emitter(result) => result.is_loading,
        }
    }

    /// Whether the latest outcome is a success.
    pub fn is_success(&self) -> Signal<bool> {
        match self {
            QueryActionResult::Subscriber(result) => result.is_success,
            QueryActionResult::Emitter(result) => result.is_success,
        }
    }

    /// The latest error.
    pub fn error(&self) -> Signal<Option<E>> {
        match self {
            QueryActionResult::Subscriber(result) => result.error,
            QueryActionResult::Emitter(result) => result.error,
        }
    }

    /// The subscription result, if the call selected subscription mode.
    pub fn subscriber(&self) -> Option<&SubscriberResult<T, E>> {
        match self {
            QueryActionResult::Subscriber(result) => Some(result),
            QueryActionResult::Emitter(_) => None,
        }
    }

    /// The emitter result, if the call selected emitter mode.
    pub fn emitter(&self) -> Option<&EmitterResult<A, T, E>> {
        match self {
            QueryActionResult::Subscriber(_) => None,
            QueryActionResult::Emitter(result) => Some(result),
        }
    }
}
