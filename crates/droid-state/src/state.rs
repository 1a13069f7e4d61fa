#![forbid(unsafe_code)]

//! The [`State<T>`] value cell.
//!
//! # Design
//!
//! `State<T>` is a cheap, clonable handle to a shared `Rc` interior holding the
//! current value, the value it was created with, a [`ListenerRegistry`], and
//! the [`HeldStates`] of subscriptions the state itself owns (derived states
//! keep their upstream subscriptions there).
//!
//! A write replaces the value, snapshots the registry, and runs begin
//! triggers, value listeners `(old, new)` and end triggers, in that order,
//! before returning. No borrow of the interior is held while callbacks run, so
//! listeners may read any state, write other states, and register or release
//! listeners freely.
//!
//! # Invariants
//!
//! 1. `old` is the value immediately before the write, `new` the value
//!    written.
//! 2. Writes always notify; equal values are not deduplicated.
//! 3. Listeners registered during a notification do not run for it.
//! 4. With [`ReentrancyPolicy::Guard`], a write to a state from within its
//!    own notification is rejected.
//!
//! # Failure Modes
//!
//! - **Write from inside [`State::with`]** on the same state panics (the value
//!   is borrowed).
//! - **Listener panics**: the notifying depth is restored; remaining
//!   listeners of that write do not run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::combined::CombinedState;
use crate::config::{ReentrancyPolicy, StateConfig};
use crate::error::{Result, StateError};
use crate::holder::{HeldStates, StatesHolder, Subscription};
use crate::registry::{ListenerId, ListenerRegistry};
use crate::weak::{AnyState, StateNode, WeakState, WeakStateBox};

pub(crate) struct StateInner<T> {
    value: RefCell<T>,
    original: T,
    registry: RefCell<ListenerRegistry<T>>,
    held: HeldStates,
    notifying: Cell<u32>,
    config: StateConfig,
}

impl<T> StateNode for StateInner<T> {
    fn detach(&self, id: ListenerId) -> bool {
        let removed = self.registry.borrow_mut().remove(id);
        removed.count > 0
    }

    fn label(&self) -> &str {
        self.config.display_label()
    }
}

impl<T> Drop for StateInner<T> {
    fn drop(&mut self) {
        tracing::trace!(
            message = "state.drop",
            label = self.config.display_label(),
            held = self.held.len()
        );
    }
}

/// Restores the notifying depth even if a listener panics.
struct NotifyingScope<'a>(&'a Cell<u32>);

impl<'a> NotifyingScope<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for NotifyingScope<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Shared flag that suppresses the opposite direction of a two-way binding
/// while one direction is propagating.
#[derive(Clone, Default)]
pub(crate) struct SyncFlag(Rc<Cell<bool>>);

impl SyncFlag {
    /// Run `f` unless a propagation is already in flight.
    pub(crate) fn run(&self, f: impl FnOnce()) {
        if self.0.get() {
            return;
        }
        let _scope = SyncScope::enter(&self.0);
        f();
    }
}

/// Clears a [`SyncFlag`] even if a listener panics.
struct SyncScope<'a>(&'a Cell<bool>);

impl<'a> SyncScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for SyncScope<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A shared, observable value cell.
///
/// Cloning a `State` creates a new handle to the **same** cell. The cell is
/// freed when the last strong handle is dropped; derived states, weak handles
/// and holders never keep it alive.
pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("State");
        s.field("label", &self.inner.config.display_label());
        match self.inner.value.try_borrow() {
            Ok(value) => s.field("value", &*value),
            Err(_) => s.field("value", &"<borrowed>"),
        };
        s.field("registry", &*self.inner.registry.borrow())
            .field("held", &self.inner.held.len())
            .finish()
    }
}

impl<T: Clone + 'static> State<T> {
    /// Create a state holding `value`, which is also its reset value.
    pub fn new(value: T) -> Self {
        Self::with_config(value, StateConfig::default())
    }

    /// Create a state with an explicit [`StateConfig`].
    pub fn with_config(value: T, config: StateConfig) -> Self {
        Self {
            inner: Rc::new(StateInner {
                original: value.clone(),
                value: RefCell::new(value),
                registry: RefCell::new(ListenerRegistry::new()),
                held: HeldStates::new(),
                notifying: Cell::new(0),
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<StateInner<T>>) -> Self {
        Self { inner }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure writes to this same state.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Value the state was created with.
    #[must_use]
    pub fn original(&self) -> &T {
        &self.inner.original
    }

    /// Configuration the state was created with.
    #[must_use]
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    /// Whether this state is currently running its listeners.
    #[must_use]
    pub fn is_notifying(&self) -> bool {
        self.inner.notifying.get() > 0
    }

    /// Assign a new value and notify.
    ///
    /// Under [`ReentrancyPolicy::Guard`] a write issued from this state's own
    /// notification is logged and dropped; use [`try_set`](Self::try_set) to
    /// observe the rejection.
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            self.log_rejected(&err);
        }
    }

    fn log_rejected(&self, err: &StateError) {
        tracing::warn!(
            message = "state.reentrant_rejected",
            label = self.inner.config.display_label(),
            error = %err
        );
    }

    /// Assign a new value and notify, reporting a rejected re-entrant write.
    pub fn try_set(&self, value: T) -> Result<()> {
        if self.inner.config.reentrancy == ReentrancyPolicy::Guard && self.is_notifying() {
            return Err(StateError::reentrant(self.inner.config.display_label()));
        }
        let old = self.inner.value.replace(value);
        self.notify(&old);
        Ok(())
    }

    /// Modify the value in place and notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Restore the construction value, notifying as for any write.
    pub fn reset(&self) {
        match self.try_set(self.inner.original.clone()) {
            Ok(()) => tracing::trace!(
                message = "state.reset",
                label = self.inner.config.display_label()
            ),
            Err(err) => self.log_rejected(&err),
        }
    }

    fn notify(&self, old: &T) {
        let new = self.get();
        let snapshot = self.inner.registry.borrow().snapshot();
        let _scope = NotifyingScope::enter(&self.inner.notifying);
        snapshot.dispatch(old, &new);
    }

    fn weak_box(&self) -> WeakStateBox {
        let node: Weak<StateInner<T>> = Rc::downgrade(&self.inner);
        WeakStateBox::new(node)
    }

    /// Register a listener receiving `(old, new)` on every write.
    pub fn listen(&self, listener: impl Fn(&T, &T) + 'static) -> Subscription {
        let id = self
            .inner
            .registry
            .borrow_mut()
            .add_listener(Box::new(listener));
        Subscription::new(id, self.weak_box())
    }

    /// Register a listener receiving only the new value.
    pub fn listen_value(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.listen(move |_, new| listener(new))
    }

    /// Register a listener that only observes that a write happened.
    pub fn listen_change(&self, listener: impl Fn() + 'static) -> Subscription {
        self.listen(move |_, _| listener())
    }

    /// Register a trigger that runs before any value listener of a write.
    pub fn begin_trigger(&self, trigger: impl Fn() + 'static) -> Subscription {
        let id = self.inner.registry.borrow_mut().add_begin(Box::new(trigger));
        Subscription::new(id, self.weak_box())
    }

    /// Register a trigger that runs after every value listener of a write.
    pub fn end_trigger(&self, trigger: impl Fn() + 'static) -> Subscription {
        let id = self.inner.registry.borrow_mut().add_end(Box::new(trigger));
        Subscription::new(id, self.weak_box())
    }

    /// Remove one listener or trigger. Returns `false` if it was not present.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.detach(id)
    }

    /// Remove every listener and trigger, returning how many were removed.
    pub fn remove_all_listeners(&self) -> usize {
        let removed = self.inner.registry.borrow_mut().clear();
        removed.count
    }

    /// Whether listener `id` is registered on this state.
    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.inner.registry.borrow().contains(id)
    }

    /// Number of registered listeners and triggers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Non-owning handle to this state.
    #[must_use]
    pub fn downgrade(&self) -> WeakState<T> {
        WeakState {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Keep this state and `other` equal in both directions.
    ///
    /// `self` first takes `other`'s value. Afterwards a write to either side
    /// is copied to the other exactly once. Both subscriptions are held by
    /// `self`, so the link dissolves when `self` is dropped or released.
    pub fn merge(&self, other: &State<T>) {
        tracing::trace!(
            message = "state.merge",
            label = self.inner.config.display_label(),
            other = other.inner.config.display_label()
        );
        self.set(other.get());

        let syncing = SyncFlag::default();

        let target = self.downgrade();
        let inbound = syncing.clone();
        other
            .listen_value(move |value| {
                inbound.run(|| {
                    if let Some(this) = target.upgrade() {
                        this.set(value.clone());
                    }
                });
            })
            .hold(self);

        let target = other.downgrade();
        self.listen_value(move |value| {
            syncing.run(|| {
                if let Some(other) = target.upgrade() {
                    other.set(value.clone());
                }
            });
        })
        .hold(self);
    }

    /// Pair this state with `other` for a two-source derivation.
    pub fn and<V: Clone + 'static>(&self, other: &State<V>) -> CombinedState<T, V> {
        CombinedState::new(self, other)
    }

    /// Release this state's own held subscriptions when `holder` releases.
    ///
    /// Useful for a derived state owned by a longer-lived structure that should
    /// stop tracking its sources once a screen goes away.
    pub fn release_with<H: StatesHolder + ?Sized>(&self, holder: &H) {
        let target = self.downgrade();
        holder.await_release(Box::new(move || {
            if let Some(state) = target.upgrade() {
                state.release_states();
            }
        }));
    }
}

impl<T> StatesHolder for State<T> {
    fn held_states(&self) -> &HeldStates {
        &self.inner.held
    }
}

impl<T: Clone + 'static> AnyState for State<T> {
    fn listen_any(&self, listener: Box<dyn Fn()>) -> Subscription {
        self.listen(move |_, _| listener())
    }

    fn downgrade_any(&self) -> WeakStateBox {
        self.weak_box()
    }
}

impl<T: Clone + Default + 'static> Default for State<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> From<T> for State<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(feature = "serde")]
impl<T: Clone + serde::Serialize + 'static> serde::Serialize for State<T> {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.with(|value| value.serialize(serializer))
    }
}

#[cfg(feature = "serde")]
impl<'de, T: Clone + serde::Deserialize<'de> + 'static> serde::Deserialize<'de> for State<T> {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
