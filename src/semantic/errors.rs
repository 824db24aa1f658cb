use std::time::Duration;

use super::models::ModelKind;

/// Errors produced by the matching core.
///
/// `Clone` so a recorded initialization failure can be handed to every
/// later caller without retrying the load.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    #[error("{kind} model unavailable: {reason}")]
    ModelUnavailable { kind: ModelKind, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl AiError {
    pub fn unavailable(kind: ModelKind, reason: impl Into<String>) -> Self {
        AiError::ModelUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub fn inference(reason: impl std::fmt::Display) -> Self {
        AiError::Inference(reason.to_string())
    }

    /// Whether the failure is permanent for the lifetime of the process.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AiError::ModelUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AiError::unavailable(ModelKind::Text, "no network");
        assert_eq!(err.to_string(), "text model unavailable: no network");

        let err = AiError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "operation timed out after 1500ms");

        let err = AiError::DimensionMismatch {
            expected: 384,
            got: 512,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 512");
    }

    #[test]
    fn test_only_unavailable_is_permanent() {
        assert!(AiError::unavailable(ModelKind::Vision, "x").is_permanent());
        assert!(!AiError::inference("bad input").is_permanent());
        assert!(!AiError::Timeout(Duration::from_secs(1)).is_permanent());
    }
}
