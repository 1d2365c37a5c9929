use thiserror::Error;

/// Errors surfaced by the control surface, the settings model and the
/// external collaborator traits.
#[derive(Debug, Error)]
pub enum Error {
    /// A setter argument failed validation; no state was changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Unknown instance, behavior, or persisted record.
    #[error("not found: {0}")]
    NotFound(String),

    /// The settings backend failed to save or load.
    #[error("storage failure: {0}")]
    Io(anyhow::Error),

    /// A behavior invocation reported failure.
    #[error("behavior invocation failed: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
