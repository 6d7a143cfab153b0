//! Error taxonomy for lifecycle, invoice and payment operations.
use crate::model::{Action, ParticipationStatus};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    AlreadyParticipating(&'static str),
    #[error("cannot {action} a participation that is {from}")]
    InvalidTransition {
        from: ParticipationStatus,
        action: Action,
    },
    #[error("{0}")]
    Precondition(String),
    #[error("campaign {0} was modified concurrently")]
    Conflict(i64),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("integration failure: {0:#}")]
    Integration(#[source] anyhow::Error),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl LifecycleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LifecycleError::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        LifecycleError::Precondition(msg.into())
    }

    /// HTTP status an outer surface should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            LifecycleError::Validation(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::Precondition(_)
            | LifecycleError::InvalidSignature => 400,
            LifecycleError::NotFound(_) => 404,
            LifecycleError::AlreadyParticipating(_) | LifecycleError::Conflict(_) => 409,
            LifecycleError::Integration(_) => 502,
            LifecycleError::Storage(_) | LifecycleError::Serialization(_) => 500,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_user_facing_text() {
        assert_eq!(
            LifecycleError::NotFound("Content").to_string(),
            "Content not found"
        );
        let err = LifecycleError::InvalidTransition {
            from: ParticipationStatus::Pending,
            action: Action::SubmitWork,
        };
        assert_eq!(err.to_string(), "cannot submit_work a participation that is pending");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn json_shape() {
        let v = LifecycleError::InvalidSignature.to_json();
        assert_eq!(v, json!({ "error": "Invalid signature" }));
        assert_eq!(
            LifecycleError::Integration(anyhow::anyhow!("boom")).status_code(),
            502
        );
    }
}
