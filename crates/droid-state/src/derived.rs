#![forbid(unsafe_code)]

//! States derived from other states.
//!
//! # Design
//!
//! A derived state is an ordinary [`State<U>`] whose value is pushed to it by
//! a listener registered on each source. The listener captures the derived
//! state weakly and the subscription is held by the derived state itself, so:
//!
//! - the source never keeps the derived state alive;
//! - the derived state never keeps the source alive;
//! - dropping the derived state detaches its listeners from every source.
//!
//! Unlike a lazily recomputed value, a derived state is eager: the transform
//! runs once at creation to seed the value and once per source write, inside
//! the source's listener phase. It always reads the source's *current* value,
//! so a nested write made by an earlier listener of the same source is not
//! overwritten by the outer write's stale value. Derived states therefore notify their own
//! listeners and cascade through chains synchronously.
//!
//! # Invariants
//!
//! 1. After any completed source write, `derived.get() == f(source.get())`
//!    (for one-way maps, as long as the derived state was not written to
//!    directly).
//! 2. A two-way map propagates each logical change once: the forward
//!    direction is muted while a reverse write is in flight, and vice versa.
//!
//! # Failure Modes
//!
//! - **Source dropped**: the derived state keeps its last value and never
//!   changes again from that source.
//! - **Non-inverse transforms** in a two-way map are applied as given; no
//!   round-trip validation happens.

use std::rc::Rc;

use crate::state::{State, SyncFlag};
use crate::weak::AnyState;

impl<T: Clone + 'static> State<T> {
    /// One-way derived state: `f` is applied now and after every write to
    /// `self`.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> State<U> {
        let derived = State::new(self.with(&f));
        let target = derived.downgrade();
        let source = self.downgrade();
        self.listen_change(move || {
            if let (Some(derived), Some(source)) = (target.upgrade(), source.upgrade()) {
                derived.set(source.with(&f));
            }
        })
        .hold(&derived);
        derived
    }

    /// Two-way derived state.
    ///
    /// `to` maps source values forward as in [`map`](Self::map). Writing to
    /// the returned state applies `from` and writes the result to `self`.
    pub fn map_bidirectional<U: Clone + 'static>(
        &self,
        to: impl Fn(&T) -> U + 'static,
        from: impl Fn(&U) -> T + 'static,
    ) -> State<U> {
        let derived = State::new(self.with(&to));
        let syncing = SyncFlag::default();

        let target = derived.downgrade();
        let source = self.downgrade();
        let forward = syncing.clone();
        self.listen_change(move || {
            forward.run(|| {
                if let (Some(derived), Some(source)) = (target.upgrade(), source.upgrade()) {
                    derived.set(source.with(&to));
                }
            });
        })
        .hold(&derived);

        let target = derived.downgrade();
        let source = self.downgrade();
        derived
            .listen_change(move || {
                syncing.run(|| {
                    if let (Some(derived), Some(source)) = (target.upgrade(), source.upgrade()) {
                        source.set(derived.with(&from));
                    }
                });
            })
            .hold(&derived);

        derived
    }

    /// Derived state recomputed from a nullary expression whenever `self`
    /// changes. The expression reads whatever states it captured.
    pub fn map_any<U: Clone + 'static>(&self, expression: impl Fn() -> U + 'static) -> State<U> {
        State::derive(self, expression)
    }
}

impl<U: Clone + 'static> State<U> {
    /// State recomputed from `expression` whenever `source` changes.
    pub fn derive(source: &dyn AnyState, expression: impl Fn() -> U + 'static) -> Self {
        Self::derive_all(&[source], expression)
    }

    /// State recomputed from `expression` whenever any of `sources` changes.
    ///
    /// Sources may have different value types; the expression is expected to
    /// read the concrete states it closes over.
    pub fn derive_all(sources: &[&dyn AnyState], expression: impl Fn() -> U + 'static) -> Self {
        let derived = State::new(expression());
        let expression = Rc::new(expression);
        for source in sources {
            let target = derived.downgrade();
            let expression = Rc::clone(&expression);
            source
                .listen_any(Box::new(move || {
                    if let Some(derived) = target.upgrade() {
                        derived.set(expression());
                    }
                }))
                .hold(&derived);
        }
        derived
    }
}
