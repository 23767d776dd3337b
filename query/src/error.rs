use crate::QueryKey;

/// Errors raised by the query cache itself.
///
/// Failures of an action are never wrapped in this type. They surface as the action's own
/// error through hook results and callbacks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The entry exists but holds a different value or error type than requested.
    #[error("cache entry {key} holds a different value or error type than requested")]
    TypeMismatch {
        /// The offending key.
        key: QueryKey,
    },
}
