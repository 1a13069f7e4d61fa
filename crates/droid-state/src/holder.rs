#![forbid(unsafe_code)]

//! Subscription lifetimes scoped to an owner.
//!
//! Every listener registration returns a [`Subscription`]. Calling
//! [`Subscription::hold`] moves the subscription's detach handle into a
//! [`StatesHolder`]; releasing the holder (explicitly, or by dropping its
//! [`HeldStates`]) removes every held listener from its state.
//!
//! # Invariants
//!
//! 1. A held listener never fires after its holder released, even if the state
//!    outlives the holder and keeps being written.
//! 2. Releasing twice is a no-op.
//! 3. Holders reference states weakly: holding a subscription never keeps its
//!    state alive, and states never reference holders.
//!
//! An unheld `Subscription` that is simply dropped leaves its listener
//! registered until the state itself is dropped. Use [`Subscription::detach`]
//! or [`Subscription::guard`] when no holder is at hand.

use std::cell::RefCell;
use std::fmt;

use crate::registry::ListenerId;
use crate::weak::WeakStateBox;

/// An object that owns state subscriptions.
///
/// Implementors only provide storage; [`release_states`](Self::release_states)
/// and [`await_release`](Self::await_release) come for free. Because
/// [`HeldStates`] releases on drop, an implementor that drops its storage
/// during its own teardown needs no explicit `Drop` impl.
pub trait StatesHolder {
    /// Storage for held subscriptions.
    fn held_states(&self) -> &HeldStates;

    /// Detach every held subscription, then run pending release callbacks.
    fn release_states(&self) {
        self.held_states().release();
    }

    /// Run `callback` on the next release of this holder.
    fn await_release(&self, callback: Box<dyn FnOnce()>) {
        self.held_states().on_release(callback);
    }
}

/// Detach handles and release callbacks owned by a [`StatesHolder`].
#[derive(Default)]
pub struct HeldStates {
    entries: RefCell<Vec<(ListenerId, WeakStateBox)>>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl HeldStates {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn hold(&self, id: ListenerId, source: WeakStateBox) {
        self.entries.borrow_mut().push((id, source));
    }

    fn on_release(&self, callback: Box<dyn FnOnce()>) {
        self.callbacks.borrow_mut().push(callback);
    }

    /// Detach everything held and run release callbacks.
    ///
    /// Returns the number of listeners actually removed (entries whose state
    /// was already dropped are discarded without counting).
    pub fn release(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        if entries.is_empty() && callbacks.is_empty() {
            return 0;
        }

        let held = entries.len();
        let detached = entries
            .into_iter()
            .filter(|(id, source)| source.remove_listener(*id))
            .count();
        let callback_count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        tracing::trace!(
            message = "holder.release",
            held,
            detached,
            callbacks = callback_count
        );
        detached
    }
}

impl Drop for HeldStates {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for HeldStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeldStates")
            .field("held", &self.entries.borrow().len())
            .field("callbacks", &self.callbacks.borrow().len())
            .finish()
    }
}

/// Stand-alone holder for owners that have nothing else to store.
#[derive(Debug, Default)]
pub struct Holder {
    states: HeldStates,
}

impl Holder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatesHolder for Holder {
    fn held_states(&self) -> &HeldStates {
        &self.states
    }
}

/// Token returned by every listener registration.
#[must_use = "an unheld subscription stays registered until its state is dropped; call `hold`, `guard` or `detach`"]
pub struct Subscription {
    id: ListenerId,
    source: WeakStateBox,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, source: WeakStateBox) -> Self {
        Self { id, source }
    }

    /// Identifier of the registered listener.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Bind the subscription's lifetime to `holder`.
    pub fn hold<H: StatesHolder + ?Sized>(self, holder: &H) {
        holder.held_states().hold(self.id, self.source);
    }

    /// Remove the listener now. Returns `false` if it was already gone.
    pub fn detach(self) -> bool {
        self.source.remove_listener(self.id)
    }

    /// Convert into a guard that detaches the listener when dropped.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            id: self.id,
            source: self.source,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish()
    }
}

/// RAII form of a [`Subscription`]: the listener is removed on drop.
#[must_use = "dropping the guard detaches the listener immediately"]
pub struct SubscriptionGuard {
    id: ListenerId,
    source: WeakStateBox,
}

impl SubscriptionGuard {
    /// Identifier of the guarded listener.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.source.remove_listener(self.id);
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Screen {
        states: HeldStates,
    }

    impl StatesHolder for Screen {
        fn held_states(&self) -> &HeldStates {
            &self.states
        }
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let clone = Rc::clone(&count);
        (count, clone)
    }

    #[test]
    fn release_detaches_held_listener() {
        let holder = Holder::new();
        let state = State::new(1);
        let (count, seen) = counter();
        state
            .listen_value(move |_| seen.set(seen.get() + 1))
            .hold(&holder);

        state.set(2);
        assert_eq!(count.get(), 1);

        holder.release_states();
        state.set(3);
        assert_eq!(count.get(), 1);
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn release_twice_is_noop() {
        let holder = Holder::new();
        let state = State::new(0);
        state.listen_change(|| {}).hold(&holder);
        assert_eq!(holder.held_states().len(), 1);
        assert_eq!(holder.held_states().release(), 1);
        assert_eq!(holder.held_states().release(), 0);
        holder.release_states();
        assert!(holder.held_states().is_empty());
    }

    #[test]
    fn dropping_custom_holder_detaches() {
        let state = State::new(0);
        let (count, seen) = counter();
        {
            let screen = Screen {
                states: HeldStates::new(),
            };
            state
                .listen_change(move || seen.set(seen.get() + 1))
                .hold(&screen);
            state.set(1);
        }
        state.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn holder_does_not_retain_state() {
        let holder = Holder::new();
        let state = State::new(0);
        let weak = state.downgrade();
        state.listen_change(|| {}).hold(&holder);
        drop(state);
        assert!(!weak.is_alive());
        // The stale entry is discarded without counting.
        assert_eq!(holder.held_states().release(), 0);
    }

    #[test]
    fn release_callbacks_run_once() {
        let holder = Holder::new();
        let (count, seen) = counter();
        holder.await_release(Box::new(move || seen.set(seen.get() + 1)));
        holder.release_states();
        holder.release_states();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn holder_works_through_trait_object() {
        let holder: Box<dyn StatesHolder> = Box::new(Holder::new());
        let state = State::new(0);
        state.listen_change(|| {}).hold(holder.as_ref());
        assert_eq!(holder.held_states().len(), 1);
        drop(holder);
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn unheld_subscription_stays_registered() {
        let state = State::new(0);
        let (count, seen) = counter();
        let sub = state.listen_change(move || seen.set(seen.get() + 1));
        drop(sub);
        state.set(1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn detach_removes_listener() {
        let state = State::new(0);
        let sub = state.listen_change(|| {});
        assert!(sub.detach());
        assert_eq!(state.listener_count(), 0);
    }

    #[test]
    fn guard_detaches_on_drop() {
        let state = State::new(0);
        let (count, seen) = counter();
        let guard = state
            .listen_change(move || seen.set(seen.get() + 1))
            .guard();
        state.set(1);
        drop(guard);
        state.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn release_from_inside_listener_stops_later_listeners() {
        let holder = Rc::new(Holder::new());
        let state = State::new(0);
        let (count, seen) = counter();

        let releaser = Rc::clone(&holder);
        let _keep = state.listen_change(move || releaser.release_states()).guard();
        state
            .listen_change(move || seen.set(seen.get() + 1))
            .hold(holder.as_ref());

        state.set(1);
        assert_eq!(count.get(), 0);
    }
}
