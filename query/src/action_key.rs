use std::{cell::RefCell, fmt, rc::Rc};

use slotmap::{new_key_type, SlotMap};

use crate::{ActionArgs, QueryAction, QueryError, QueryValue};

/// A string unique to one [`QueryAction`] for the lifetime of the process.
///
/// Formatted as `<20 random fractional digits>_<action name>`. It is the first segment of
/// every [`QueryKey`](crate::QueryKey) the action's hooks read or write.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey(Rc<str>);

impl ActionKey {
    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ActionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionKey").field(&self.0).finish()
    }
}

/// Returns the cache key of `action`. Clones of one action share a key.
pub fn get_query_action_key<A, T, E>(action: &QueryAction<A, T, E>) -> ActionKey
where
    A: ActionArgs,
    T: QueryValue,
    E: QueryError,
{
    action.key()
}

new_key_type! {
    /// Opaque identity of an action, handed out when it is constructed.
    pub(crate) struct ActionHandle;
}

struct ActionEntry {
    name: Rc<str>,
    key: Option<ActionKey>,
}

thread_local! {
    // Keyed by handle, never by the action itself, so entries don't keep actions alive.
    static ACTION_KEYS: RefCell<SlotMap<ActionHandle, ActionEntry>> = RefCell::new(SlotMap::with_key());
}

/// Gives a new action its identity.
pub(crate) fn register(name: Rc<str>) -> ActionHandle {
    ACTION_KEYS
        .try_with(|keys| keys.borrow_mut().insert(ActionEntry { name, key: None }))
        .unwrap_or_default()
}

/// The key for `handle`, generated on first use.
pub(crate) fn derive_key(handle: ActionHandle, name: &str) -> ActionKey {
    let memoized = ACTION_KEYS
        .try_with(|keys| {
            let mut keys = keys.borrow_mut();
            let entry = keys.get_mut(handle)?;
            Some(
                entry
                    .key
                    .get_or_insert_with(|| generate_key(&entry.name))
                    .clone(),
            )
        })
        .ok()
        .flatten();

    // Only reachable while the thread is shutting down.
    memoized.unwrap_or_else(|| generate_key(name))
}

/// Forgets `handle`. Called when the last clone of an action drops.
pub(crate) fn release(handle: ActionHandle) {
    let _ = ACTION_KEYS.try_with(|keys| {
        if let Ok(mut keys) = keys.try_borrow_mut() {
            keys.remove(handle);
        }
    });
}

#[cfg(test)]
pub(crate) fn registered_actions() -> usize {
    ACTION_KEYS.with(|keys| keys.borrow().len())
}

fn generate_key(name: &str) -> ActionKey {
    let fraction = format!("{:.20}", random_fraction());
    let digits = fraction
        .split_once('.')
        .map(|(_, digits)| digits)
        .unwrap_or(&fraction);
    ActionKey(Rc::from(format!("{digits}_{name}")))
}

/// Uniform in `[0, 1)`.
fn random_fraction() -> f64 {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            js_sys::Math::random()
        } else {
            rand::random::<f64>()
        }
    }
}
