use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupflowError {
    // Resolution errors: entry-scoped, the plan continues past them
    #[error("Group not found: {0}")]
    RegionNotFound(String),

    #[error("Ambiguous group title (multiple groups named '{0}')")]
    DuplicateRegion(String),

    #[error("Group '{0}' contains no output nodes")]
    NoOutputNodes(String),

    #[error("Group '{0}' resolved to an empty work item")]
    EmptyResolution(String),

    // Submission errors
    #[error("Work item rejected by host validation: {0}")]
    Validation(String),

    #[error("Host queueing failed: {0}")]
    Submission(String),

    #[error("Host request failed: {0}")]
    Host(String),

    // Plan store errors
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Invalid plan name: {0}")]
    InvalidPlanName(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GroupflowError>;
