//! Retry and degraded-mode handling for collaborator calls.
//!
//! ```text
//! collaborator call
//!   ├─ Ok                         → value
//!   ├─ Transient, attempts left   → sleep(step × attempt), retry
//!   └─ anything else / exhausted  → error for this call only
//!
//! caller fallback
//!   ├─ primary succeeded          → DegradedResponse { level: Full }
//!   └─ primary failed             → DegradedResponse { level: Fallback, warnings }
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collaborators::CollaboratorResult;

/// Attempt budget and linear backoff step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, first call included.
    pub max_attempts: u32,
    /// Sleep before retry `n` is `n × backoff_step_ms`.
    pub backoff_step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_step_ms: 0,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(attempt as u64))
    }
}

/// Run `call` until it succeeds, fails with a non-retriable error, or the
/// attempt budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> CollaboratorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollaboratorResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retriable() && attempt < max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "transient collaborator error, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// How a value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    /// The collaborator answered.
    Full,
    /// A local default stood in for the collaborator.
    Fallback,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A value together with how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedResponse<T> {
    pub payload: T,
    pub level: DegradationLevel,
    pub served_by: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl<T> DegradedResponse<T> {
    pub fn full(payload: T, served_by: &str) -> Self {
        Self {
            payload,
            level: DegradationLevel::Full,
            served_by: served_by.to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn fallback(payload: T, served_by: &str, warning: impl Into<String>) -> Self {
        Self {
            payload,
            level: DegradationLevel::Fallback,
            served_by: served_by.to_string(),
            warnings: vec![warning.into()],
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }

    /// Use `result` if it succeeded, otherwise `fallback()`.
    pub fn from_result<E: std::fmt::Display>(
        result: Result<T, E>,
        served_by: &str,
        fallback_by: &str,
        fallback: impl FnOnce() -> T,
    ) -> Self {
        match result {
            Ok(payload) => Self::full(payload, served_by),
            Err(e) => {
                warn!(served_by, fallback_by, error = %e, "falling back");
                Self::fallback(fallback(), fallback_by, format!("{} failed: {}", served_by, e))
            }
        }
    }
}
