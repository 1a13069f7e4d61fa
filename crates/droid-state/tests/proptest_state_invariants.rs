#![forbid(unsafe_code)]

//! Property-based invariant tests for state propagation.
//!
//! These tests verify invariants that must hold for **any** sequence of
//! writes:
//!
//! 1. Each listener sees every write exactly once, with the prior value as
//!    `old`.
//! 2. N writes with M held listeners produce exactly N x M invocations.
//! 3. A one-way map always equals the transform of its source.
//! 4. A combined state always equals the transform of both current values.
//! 5. A two-way map keeps `derived == to(source)` when written from either
//!    side with inverse transforms.
//! 6. After release, no held listener fires again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use droid_state::{Holder, State, StatesHolder};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn writes() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(-1_000_000i64..1_000_000, 0..200)
}

#[derive(Debug, Clone)]
enum Side {
    Left(i64),
    Right(i64),
}

fn side_writes() -> impl Strategy<Value = Vec<Side>> {
    proptest::collection::vec(
        prop_oneof![
            (-10_000i64..10_000).prop_map(Side::Left),
            (-10_000i64..10_000).prop_map(Side::Right),
        ],
        0..100,
    )
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Listener sees (old, new) for each write
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn listener_sees_every_transition(initial in any::<i64>(), values in writes()) {
        let holder = Holder::new();
        let state = State::new(initial);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        state.listen(move |old, new| s.borrow_mut().push((*old, *new))).hold(&holder);

        let mut expected = Vec::with_capacity(values.len());
        let mut prev = initial;
        for &v in &values {
            state.set(v);
            expected.push((prev, v));
            prev = v;
        }
        prop_assert_eq!(&*seen.borrow(), &expected);
        prop_assert_eq!(state.get(), prev);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. N x M invocations
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn invocation_count_is_writes_times_listeners(
        n in 0usize..300,
        m in 0usize..30,
    ) {
        let holder = Holder::new();
        let state = State::new(0usize);
        let calls = Rc::new(Cell::new(0usize));
        for _ in 0..m {
            let c = Rc::clone(&calls);
            state.listen_change(move || c.set(c.get() + 1)).hold(&holder);
        }
        for i in 1..=n {
            state.set(i);
        }
        prop_assert_eq!(calls.get(), n * m);
        prop_assert_eq!(state.get(), n);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. One-way map consistency
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn map_tracks_source(initial in any::<i32>(), values in writes()) {
        let source = State::new(i64::from(initial));
        let mapped = source.map(|v| v.wrapping_mul(10));
        prop_assert_eq!(mapped.get(), source.get().wrapping_mul(10));
        for v in values {
            source.set(v);
            prop_assert_eq!(mapped.get(), v.wrapping_mul(10));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Combined state consistency
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn combined_tracks_both(ops in side_writes()) {
        let a = State::new(0i64);
        let b = State::new(0i64);
        let sum = a.and(&b).map(|x, y| x + y).expect("sources alive");
        for op in ops {
            match op {
                Side::Left(v) => a.set(v),
                Side::Right(v) => b.set(v),
            }
            prop_assert_eq!(sum.get(), a.get() + b.get());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Two-way map consistency
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bidirectional_stays_consistent(ops in side_writes()) {
        let source = State::new(0i64);
        let mapped = source.map_bidirectional(|v| v * 2, |v| v / 2);
        for op in ops {
            match op {
                Side::Left(v) => source.set(v),
                Side::Right(v) => mapped.set(v * 2),
            }
            prop_assert_eq!(mapped.get(), source.get() * 2);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Release is final
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn nothing_fires_after_release(before in writes(), after in writes()) {
        let holder = Holder::new();
        let state = State::new(0i64);
        let calls = Rc::new(Cell::new(0usize));
        let c = Rc::clone(&calls);
        state.begin_trigger(move || c.set(c.get() + 1)).hold(&holder);
        let c = Rc::clone(&calls);
        state.end_trigger(move || c.set(c.get() + 1)).hold(&holder);

        for &v in &before {
            state.set(v);
        }
        prop_assert_eq!(calls.get(), before.len() * 2);

        holder.release_states();
        holder.release_states();
        for &v in &after {
            state.set(v);
        }
        prop_assert_eq!(calls.get(), before.len() * 2);
        prop_assert_eq!(state.listener_count(), 0);
    }
}
