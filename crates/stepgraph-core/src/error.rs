use thiserror::Error;

/// Fatal conversion failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("No trigger node found in the flow")]
    MissingTrigger,
}

/// Failures while reading generator output or an editor submission.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Step generator refused to build a workflow: {0}")]
    Refused(String),

    #[error("Expected a step list, found {0}")]
    NotAStepList(&'static str),

    #[error("Invalid flow data: {0}")]
    InvalidFlow(String),
}
