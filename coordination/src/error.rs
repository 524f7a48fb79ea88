//! Error taxonomy for the debate engine, with retry classification.
//!
//! | Category    | Retriable | Raised by                                  |
//! |-------------|-----------|--------------------------------------------|
//! | Transient   | yes       | rate limits, timeouts, 5xx from a service  |
//! | Malformed   | no        | decode/validation at the collaborator edge |
//! | Unavailable | no        | auth failures, missing models              |
//! | Cancelled   | no        | caller stopped consuming events            |
//!
//! An attack judged invalid is not an error: it is a
//! [`ValidationResult`](crate::argumentation::ValidationResult) with
//! `valid == false`.

use std::fmt;

use thiserror::Error;

/// Classification used by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Rate limit or transient service failure, retried with backoff.
    Transient,
    /// Output could not be decoded into the expected structure.
    Malformed,
    /// Service rejected the call permanently.
    Unavailable,
    /// Consumer went away; no further calls are issued.
    Cancelled,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Malformed => write!(f, "malformed"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single call to an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Rate limiting or a transient service failure.
    #[error("transient collaborator failure [{collaborator}]: {message}")]
    Transient {
        collaborator: String,
        message: String,
    },

    /// The response could not be decoded or failed validation.
    #[error("malformed response from {collaborator}: {message}")]
    Malformed {
        collaborator: String,
        message: String,
    },

    /// Permanent failure (auth, unknown model, bad request).
    #[error("collaborator {collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: String,
        message: String,
    },

    /// The debate was cancelled while the call was pending.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl CollaboratorError {
    pub fn transient(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn malformed(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Classify this error for retry logic.
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::Transient { .. } => RetryCategory::Transient,
            Self::Malformed { .. } => RetryCategory::Malformed,
            Self::Unavailable { .. } => RetryCategory::Unavailable,
            Self::Cancelled(_) => RetryCategory::Cancelled,
        }
    }

    /// Returns `true` if the call may be retried.
    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }
}

/// Fatal configuration problem, raised before any debate state exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("persona '{0}' is not defined")]
    MissingPersona(String),

    #[error("a debate needs at least {min} personas, got {actual}")]
    TooFewPersonas { min: usize, actual: usize },

    #[error("duplicate persona id '{0}'")]
    DuplicatePersona(String),

    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal failure of a debate run.
#[derive(Debug, Error)]
pub enum DebateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Claim decomposition or another setup step failed.
    #[error("setup failed: {0}")]
    Setup(CollaboratorError),

    /// The event consumer dropped the receiving end.
    #[error("event stream closed by consumer")]
    Cancelled,

    /// The driver produced an event its own state fold rejected.
    #[error("event stream rejected: {0}")]
    Stream(#[from] ReplayError),
}

/// A persisted event stream that cannot be folded back into a state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("event stream is empty")]
    Empty,

    #[error("event #{sequence} ({kind}) arrived before debate_started")]
    NotStarted { sequence: u64, kind: String },

    #[error("debate_started repeated at event #{0}")]
    DuplicateStart(u64),

    #[error("sequence gap: expected #{expected}, got #{actual}")]
    SequenceGap { expected: u64, actual: u64 },

    #[error("event #{0} follows a terminal event")]
    AfterTerminal(u64),

    #[error("event references unknown crux room {0}")]
    UnknownRoom(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retriable() {
        let err = CollaboratorError::transient("agent_turn", "429 too many requests");
        assert!(err.is_retriable());
        assert_eq!(err.retry_category(), RetryCategory::Transient);
    }

    #[test]
    fn test_malformed_is_terminal_for_call() {
        let err = CollaboratorError::malformed("agent_turn", "missing field `stances`");
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("agent_turn"));
    }

    #[test]
    fn test_cancelled_not_retriable() {
        let err = CollaboratorError::Cancelled("consumer gone".into());
        assert_eq!(err.retry_category(), RetryCategory::Cancelled);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingPersona("skeptic".into());
        assert_eq!(err.to_string(), "persona 'skeptic' is not defined");

        let err = ConfigError::invalid("convergence.threshold", "must be in (0, 1]");
        assert!(err.to_string().contains("convergence.threshold"));
    }

    #[test]
    fn test_debate_error_from_config() {
        let err: DebateError = ConfigError::TooFewPersonas { min: 2, actual: 1 }.into();
        assert!(matches!(err, DebateError::Config(_)));
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_retry_category_display() {
        assert_eq!(RetryCategory::Transient.to_string(), "transient");
        assert_eq!(RetryCategory::Malformed.to_string(), "malformed");
        assert_eq!(RetryCategory::Unavailable.to_string(), "unavailable");
        assert_eq!(RetryCategory::Cancelled.to_string(), "cancelled");
    }
}
