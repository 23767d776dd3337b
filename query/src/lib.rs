#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # About Query Actions
//!
//! Leptos Query Action binds async functions ("actions") to a query cache for
//! [Leptos](https://github.com/leptos-rs/leptos) components.
//!
//! Heavily inspired by [Tanstack Query](https://tanstack.com/query/latest/).
//!
//! Every [`QueryAction`] owns a namespace in the cache, keyed by its [`ActionKey`]. A component
//! either **subscribes** to the result of the action for some parameters, or **emits**
//! invocations of it on demand.
//!
//! A subscription provides:
//! - caching, shared by every component using the same action and parameters
//! - de-duplication of concurrent fetches
//! - refetch on mount for stale data
//! - invalidation from anywhere in the app
//! - memory management with cache lifetimes
//! - placeholder and initial data
//!
//! An emitter provides:
//! - status of the most recent invocation
//! - lifecycle callbacks with a context
//! - invalidation and direct writes of the action's cache entries
//!
//! ## The main entry points are:
//! - [`use_query_action()`] - Subscribes or emits, depending on the arguments.
//! - [`use_query_action_subscriber()`] - Keeps a cache entry in sync with a component.
//! - [`use_query_action_emitter()`] - Invokes an action on demand.
//!
//! # Feature Flags
//! - `csr` Client-side rendering: Use browser timers for cache lifetimes.
//! - `hydrate` Hydration: Same as `csr`, for apps rendered on the server first.
//!
//! # A Simple Example
//!
//! In the root of your App, provide a query client with [provide_query_client] or [provide_query_client_with_options] if you want to override the default options.
//!
//! ```ignore
//! use leptos::*;
//! use leptos_query_action::*;
//!
//! #[component]
//! pub fn App() -> impl IntoView {
//!     // Provides Query Client for entire app.
//!     provide_query_client();
//!
//!     // Rest of App...
//! }
//! ```
//!
//! Then wrap an async function in a [`QueryAction`] and use it in any component.
//!
//! ```ignore
//! use leptos::*;
//! use leptos_query_action::*;
//!
//! #[derive(Debug, Clone)]
//! struct TrackData {
//!     name: String,
//! }
//!
//! async fn get_track(id: i32) -> Result<TrackData, ServerFnError> {
//!     todo!()
//! }
//!
//! #[component]
//! fn TrackView(id: i32) -> impl IntoView {
//!     let action = store_value(QueryAction::new(get_track));
//!
//!     let track = use_query_action_subscriber(
//!         &action.get_value(),
//!         (Some(id),),
//!         SubscriberOptions::default(),
//!     );
//!     let reload = use_query_action_emitter(&action.get_value(), EmitterOptions::default());
//!
//!     view! {
//!         <div>
//!             {move || track.data.get().map(|track| view! { <h2>{track.name}</h2> })}
//!             <button on:click=move |_| { reload.invalidate(&(id,)); }>"Reload"</button>
//!         </div>
//!     }
//! }
//! ```
//!

mod action;
mod action_key;
/// Subcriptions to cache-wide query events.
pub mod cache_observer;
mod engine;
mod error;
mod garbage_collector;
mod hook_args;
mod instant;
mod mutation;
mod query;
mod query_cache;
mod query_client;
mod query_key;
mod query_observer;
mod query_options;
mod query_result;
mod query_state;
mod use_query_action;
mod use_query_action_emitter;
mod use_query_action_subscriber;

pub use action::*;
pub use action_key::{get_query_action_key, ActionKey};
pub use cache_observer::{CacheEvent, CacheObserver};
pub use engine::*;
pub use error::*;
pub use hook_args::*;
pub use instant::*;
pub use mutation::{MutationId, MutationState, MutationStatus};
pub use query_cache::CacheObserverKey;
pub use query_client::{
    provide_query_client, provide_query_client_with_options, use_query_client, QueryClient,
};
pub use query_key::*;
pub use query_options::*;
pub use query_result::*;
pub use query_state::*;
pub use use_query_action::*;
pub use use_query_action_emitter::*;
pub use use_query_action_subscriber::{
    use_query_action_subscriber, use_query_action_subscriber_with, KeepData, SubscriberOptions,
};

/// Convenience trait for query value requirements.
pub trait QueryValue: std::fmt::Debug + Clone + 'static {}
impl<V> QueryValue for V where V: std::fmt::Debug + Clone + 'static {}

/// Convenience trait for action error requirements.
pub trait QueryError: std::fmt::Debug + Clone + 'static {}
impl<E> QueryError for E where E: std::fmt::Debug + Clone + 'static {}
