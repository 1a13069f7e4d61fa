#![forbid(unsafe_code)]

//! Two-source derivations.
//!
//! [`CombinedState`] pairs two states of possibly different types and derives
//! a third from both. It holds its sources weakly: a `CombinedState` kept
//! around after its sources were dropped simply has nothing to combine, and
//! [`map`](CombinedState::map) returns `None`.
//!
//! The derived state recomputes once per source write, reading both sources'
//! *current* values at that moment. Two back-to-back writes, one to each
//! source, recompute twice; there is no batching.

use std::fmt;
use std::rc::Rc;

use crate::state::State;
use crate::weak::WeakState;

/// Weak pair of states, created by [`CombinedState::new`] or [`State::and`].
pub struct CombinedState<A, B> {
    left: WeakState<A>,
    right: WeakState<B>,
}

impl<A: Clone + 'static, B: Clone + 'static> CombinedState<A, B> {
    pub fn new(left: &State<A>, right: &State<B>) -> Self {
        Self {
            left: left.downgrade(),
            right: right.downgrade(),
        }
    }

    /// Current left value, if the left state is alive.
    #[must_use]
    pub fn left(&self) -> Option<A> {
        self.left.get()
    }

    /// Current right value, if the right state is alive.
    #[must_use]
    pub fn right(&self) -> Option<B> {
        self.right.get()
    }

    /// Derive a state from both sources.
    ///
    /// Returns `None` if either source has already been dropped: the pair
    /// only holds weak handles, and without both values there is nothing to
    /// seed the derived state with.
    pub fn map<U: Clone + 'static>(
        &self,
        expression: impl Fn(&A, &B) -> U + 'static,
    ) -> Option<State<U>> {
        let left = self.left.upgrade()?;
        let right = self.right.upgrade()?;

        let expression = Rc::new(expression);
        let derived = State::new(left.with(|a| right.with(|b| expression(a, b))));

        let recompute = {
            let target = derived.downgrade();
            let left = self.left.clone();
            let right = self.right.clone();
            Rc::new(move || {
                let (Some(derived), Some(left), Some(right)) =
                    (target.upgrade(), left.upgrade(), right.upgrade())
                else {
                    return;
                };
                let value = left.with(|a| right.with(|b| expression(a, b)));
                derived.set(value);
            })
        };

        let on_left = Rc::clone(&recompute);
        left.listen_change(move || on_left()).hold(&derived);
        right.listen_change(move || recompute()).hold(&derived);
        Some(derived)
    }

    /// Derive a state from a nullary expression, recomputed whenever either
    /// source changes.
    ///
    /// Returns `None` if either source has already been dropped.
    pub fn map_any<U: Clone + 'static>(
        &self,
        expression: impl Fn() -> U + 'static,
    ) -> Option<State<U>> {
        let left = self.left.upgrade()?;
        let right = self.right.upgrade()?;
        Some(State::derive_all(&[&left, &right], expression))
    }
}

impl<A, B> Clone for CombinedState<A, B> {
    fn clone(&self) -> Self {
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

impl<A, B> fmt::Debug for CombinedState<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedState")
            .field("left", &self.left)
            .field("right", &self.right)
            .finish()
    }
}
