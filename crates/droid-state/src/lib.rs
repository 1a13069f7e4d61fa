#![forbid(unsafe_code)]

//! Reactive state cells for UI bindings.
//!
//! This crate provides the change-propagation layer a view layer binds to:
//!
//! - [`State`]: a shared value cell. Every write runs begin triggers, value
//!   listeners `(old, new)` and end triggers, synchronously and in
//!   registration order.
//! - Derived states: [`State::map`], [`State::map_bidirectional`],
//!   [`State::derive_all`] and [`CombinedState`] produce states that follow
//!   their sources without keeping them alive.
//! - [`Subscription`] / [`StatesHolder`]: every registration returns a token
//!   that can be held by an owner; releasing the owner detaches everything it
//!   held.
//! - [`WeakState`] / [`WeakStateBox`]: non-owning handles.
//!
//! # Architecture
//!
//! `State<T>` uses `Rc` with `RefCell`/`Cell` interiors for single-threaded
//! shared ownership; none of the types here are `Send`. Back-references
//! (derived state to source, holder to state) are `Weak`.
//!
//! # Example
//!
//! ```
//! use droid_state::{Holder, State};
//!
//! let screen = Holder::new();
//! let count = State::new(1);
//! let label = count.map(|n| format!("{n} items"));
//!
//! label
//!     .listen_value(|text| println!("setText({text})"))
//!     .hold(&screen);
//!
//! count.set(2);
//! assert_eq!(label.get(), "2 items");
//! ```

pub mod combined;
pub mod config;
pub mod derived;
pub mod error;
pub mod holder;
pub mod registry;
pub mod state;
pub mod weak;

pub use combined::CombinedState;
pub use config::{ReentrancyPolicy, StateConfig};
pub use error::{Result, StateError};
pub use holder::{HeldStates, Holder, StatesHolder, Subscription, SubscriptionGuard};
pub use registry::ListenerId;
pub use state::State;
pub use weak::{AnyState, WeakState, WeakStateBox};
