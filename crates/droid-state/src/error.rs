use thiserror::Error;

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("re-entrant update rejected for state {label}")]
    ReentrantUpdate { label: String },
}

impl StateError {
    #[must_use]
    pub fn reentrant(label: impl Into<String>) -> Self {
        Self::ReentrantUpdate {
            label: label.into(),
        }
    }
}
