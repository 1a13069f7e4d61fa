#![forbid(unsafe_code)]

//! Non-owning state handles.
//!
//! [`WeakState<T>`] is the typed handle derived states use to reach their
//! sources. [`WeakStateBox`] is the type-erased handle a [`Subscription`]
//! keeps so it can detach itself from whatever state it was registered on.
//! Neither keeps the state alive; reading through either after the state was
//! dropped yields `None` / `false`, never an error.

use std::fmt;
use std::rc::Weak;

use crate::holder::Subscription;
use crate::registry::ListenerId;
use crate::state::{State, StateInner};

/// Type-erased view of a state's interior used for detaching listeners.
pub(crate) trait StateNode {
    fn detach(&self, id: ListenerId) -> bool;
    fn label(&self) -> &str;
}

/// A state of any value type, seen only as a source of change notifications.
///
/// Used to derive one state from a heterogeneous list of sources, see
/// [`State::derive_all`].
pub trait AnyState {
    /// Register a listener that ignores the values and only observes that a
    /// change happened.
    fn listen_any(&self, listener: Box<dyn Fn()>) -> Subscription;

    /// Type-erased weak handle to this state.
    fn downgrade_any(&self) -> WeakStateBox;
}

/// Type-erased weak reference to a state.
#[derive(Clone)]
pub struct WeakStateBox {
    node: Weak<dyn StateNode>,
}

impl WeakStateBox {
    pub(crate) fn new(node: Weak<dyn StateNode>) -> Self {
        Self { node }
    }

    /// Whether the referenced state is still allocated.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }

    /// Detach listener `id` from the referenced state.
    ///
    /// Returns `false` if the state is gone or no longer has that listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        match self.node.upgrade() {
            Some(node) => node.detach(id),
            None => false,
        }
    }
}

impl fmt::Debug for WeakStateBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.upgrade() {
            Some(node) => f
                .debug_struct("WeakStateBox")
                .field("state", &node.label())
                .finish(),
            None => f.write_str("WeakStateBox(<released>)"),
        }
    }
}

/// Typed weak reference to a [`State<T>`].
pub struct WeakState<T> {
    pub(crate) inner: Weak<StateInner<T>>,
}

impl<T> WeakState<T> {
    /// A handle that never upgrades.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Weak::new() }
    }

    /// Whether the referenced state is still allocated.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T: Clone + 'static> WeakState<T> {
    /// Strong handle, if the state is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<State<T>> {
        self.inner.upgrade().map(State::from_inner)
    }

    /// Current value, if the state is still alive.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.upgrade().map(|state| state.get())
    }
}

impl<T> Default for WeakState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WeakState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakState")
            .field("alive", &self.is_alive())
            .finish()
    }
}
