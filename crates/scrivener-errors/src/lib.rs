//! Error taxonomy for the document pipeline orchestrator.
//!
//! Mirrors the kinds described in the error handling design: transient
//! broker/store failures, decode failures, collaborator (LLM/renderer)
//! failures, semantic failures that halt a stage without a successor, and
//! missing-context failures that `send_resume` surfaces synchronously.

use thiserror::Error;

/// Errors a stage processor can raise.
///
/// The worker harness inspects the variant to decide whether to `abandon`
/// the message (transient/decode/collaborator), publish a terminal
/// `*_FAILED` status with no successor enqueue (semantic), or propagate
/// synchronously to the caller (missing context).
#[derive(Error, Debug)]
pub enum StageError {
    /// Queue broker or object store call failed in a way redelivery can fix.
    #[error("transient {operation} failure: {reason}")]
    Transient { operation: String, reason: String },

    /// A queue message could not be decoded as JSON.
    #[error("failed to decode message on queue '{queue}': {reason}")]
    Decode { queue: String, reason: String },

    /// An LLM agent or the PlantUML renderer failed.
    #[error("collaborator '{collaborator}' failed: {reason}")]
    Collaborator { collaborator: String, reason: String },

    /// A semantic invariant was violated (e.g. invalid PlantUML). The stage
    /// halts without enqueueing a successor; an operator must intervene.
    #[error("semantic error in stage {stage}: {reason}")]
    Semantic { stage: String, reason: String },

    /// The payload lacked enough context (no `cycles`/`expected_cycles`)
    /// even after hydration from the status table.
    #[error("missing context for job {job_id}: {reason}")]
    MissingContext { job_id: String, reason: String },
}

impl StageError {
    /// Whether the worker harness should `abandon` the message for redelivery.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::Decode { .. } | Self::Collaborator { .. }
        )
    }

    /// Whether this error should terminate the stage without a successor message.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Semantic { .. } | Self::MissingContext { .. })
    }
}

/// Errors raised while computing a dependency ordering over outline sections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("cycle detected in section dependencies")]
    DependencyCycle,
}

/// Errors raised by [`scrivener_types`]'s path contract when a relative
/// segment would escape the job's storage root.
///
/// Defined here (rather than in `scrivener-types`) so both the store and
/// the types crate can depend on a single error vocabulary without a cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathSafetyError {
    #[error("relative path segment is empty")]
    Empty,
    #[error("relative path segment is absolute: {path}")]
    Absolute { path: String },
    #[error("relative path segment ascends above its root: {path}")]
    Ascends { path: String },
}

impl From<PathSafetyError> for StageError {
    fn from(err: PathSafetyError) -> Self {
        Self::Semantic {
            stage: "path_safety".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<CycleError> for StageError {
    fn from(err: CycleError) -> Self {
        Self::Semantic {
            stage: "dependency_graph".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_decode_and_collaborator_are_retryable() {
        assert!(StageError::Transient {
            operation: "put_text".into(),
            reason: "timeout".into()
        }
        .is_retryable());
        assert!(StageError::Decode {
            queue: "write".into(),
            reason: "bad json".into()
        }
        .is_retryable());
        assert!(StageError::Collaborator {
            collaborator: "writer".into(),
            reason: "500".into()
        }
        .is_retryable());
    }

    #[test]
    fn semantic_and_missing_context_are_terminal_not_retryable() {
        let semantic = StageError::Semantic {
            stage: "diagram_prep".into(),
            reason: "invalid plantuml".into(),
        };
        assert!(semantic.is_terminal());
        assert!(!semantic.is_retryable());

        let missing = StageError::MissingContext {
            job_id: "job-1".into(),
            reason: "no cycles".into(),
        };
        assert!(missing.is_terminal());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn path_safety_errors_convert_to_a_semantic_stage_error() {
        let err: StageError = PathSafetyError::Ascends { path: "../escape".into() }.into();
        assert!(err.is_terminal());
    }
}
