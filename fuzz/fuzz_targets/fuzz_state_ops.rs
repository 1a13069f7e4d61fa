#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use droid_state::{Holder, State, StatesHolder};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    SetSource(i32),
    SetMirror(i32),
    Reset,
    Listen,
    Release,
    Map,
    DropDerived,
}

fuzz_target!(|ops: Vec<Op>| {
    let holder = Holder::new();
    let source = State::new(0i64);
    let mirror = source.map_bidirectional(|v| v.wrapping_add(1), |v| v.wrapping_sub(1));
    let calls = Rc::new(Cell::new(0u64));
    let mut expected_calls = 0u64;
    let mut listeners = 0u64;
    let mut derived: Vec<State<i64>> = Vec::new();

    for op in ops.into_iter().take(512) {
        match op {
            Op::SetSource(v) => {
                source.set(i64::from(v));
                expected_calls += listeners;
            }
            Op::SetMirror(v) => {
                mirror.set(i64::from(v));
                expected_calls += listeners;
            }
            Op::Reset => {
                source.reset();
                expected_calls += listeners;
            }
            Op::Listen => {
                let c = Rc::clone(&calls);
                source.listen_change(move || c.set(c.get() + 1)).hold(&holder);
                listeners += 1;
            }
            Op::Release => {
                holder.release_states();
                listeners = 0;
            }
            Op::Map => {
                let next = derived.last().unwrap_or(&source).map(|v| v.wrapping_mul(3));
                derived.push(next);
            }
            Op::DropDerived => {
                derived.pop();
            }
        }

        assert_eq!(mirror.get(), source.get().wrapping_add(1));
        assert_eq!(calls.get(), expected_calls);
        let mut value = source.get();
        for state in &derived {
            value = value.wrapping_mul(3);
            assert_eq!(state.get(), value);
        }
    }
});
