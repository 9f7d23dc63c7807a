use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("{0} is not set")]
    MissingCredentials(String),

    #[error("the model reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("the model reply has an unexpected shape: {0}")]
    UnexpectedShape(String),

    #[error("the model call failed: {0}")]
    ModelInvocation(String),

    #[error("question {} is malformed: {reason}", .index + 1)]
    SchemaViolation { index: usize, reason: String },

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("question {index} does not exist (quiz has {len})")]
    AnswerOutOfRange { index: usize, len: usize },
}

impl QuizError {
    /// Generation failures the user can recover from by asking again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuizError::InvalidJson(_)
                | QuizError::UnexpectedShape(_)
                | QuizError::ModelInvocation(_)
                | QuizError::SchemaViolation { .. }
        )
    }
}
