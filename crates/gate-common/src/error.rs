//! Error types for the verification core.

use thiserror::Error;

/// Failure reported by an external collaborator (messaging platform)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Edit rejected because the content did not change
    #[error("message not modified")]
    NotModified,

    /// Join approval for a user who is already in the group
    #[error("user already a participant")]
    AlreadyParticipant,

    /// Host lacks the permission to hide the join-request originator
    #[error("cannot hide join-request originator")]
    CannotHideRequester,

    /// Any other remote failure
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Returns true for failures that are expected and carry no information
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotModified | Self::AlreadyParticipant)
    }
}

/// Errors across the verification core
#[derive(Debug, Error)]
pub enum GateError {
    /// Interactive button data is malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No session, or the challenge referenced is no longer live
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Region coordinates outside the challenge grid
    #[error("Invalid region: x={x}, y={y}, grid={width}x{height}")]
    InvalidRegion { x: u8, y: u8, width: u8, height: u8 },

    /// Button command type the engine does not understand
    #[error("Invalid button type: {0}")]
    InvalidCommand(u8),

    /// Messaging collaborator failure
    #[error("External API error: {0}")]
    ExternalApi(#[from] ApiError),

    /// Chemistry collaborator failure (parse, detection, rendering)
    #[error("Chemistry error: {0}")]
    Chemistry(String),

    /// Index, bulk store, or persisted record failed an integrity check
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Requested compound record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Local file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns true if this error is reported to the user as an alert and
    /// leaves all state untouched
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::SessionNotFound(_)
                | Self::InvalidRegion { .. }
                | Self::InvalidCommand(_)
        )
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io(_))
    }
}
