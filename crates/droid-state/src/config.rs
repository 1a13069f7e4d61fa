#![forbid(unsafe_code)]

//! Per-state configuration.

use std::borrow::Cow;

/// How a state reacts to a write issued while its own listeners are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentrancyPolicy {
    /// Run a nested notification cascade. Breaking update cycles is left to
    /// the listeners themselves.
    #[default]
    Allow,
    /// Reject the write. [`State::set`](crate::State::set) logs and drops it,
    /// [`State::try_set`](crate::State::try_set) returns
    /// [`StateError::ReentrantUpdate`](crate::StateError::ReentrantUpdate).
    Guard,
}

/// Configuration attached to a [`State`](crate::State) at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateConfig {
    /// Name used in log records and error messages.
    pub label: Option<Cow<'static, str>>,
    /// Behavior for writes issued during the state's own notification.
    pub reentrancy: ReentrancyPolicy,
}

impl StateConfig {
    /// Default configuration: unlabeled, [`ReentrancyPolicy::Allow`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the reentrancy policy.
    #[must_use]
    pub fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }

    /// Label for display, `"<unnamed>"` when none was given.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed>")
    }
}
