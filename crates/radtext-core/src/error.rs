use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RadtextError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Trigger '{0}' already exists")]
    DuplicateTrigger(String),
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("Trigger with id '{0}' not found")]
    TriggerNotFound(String),
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),
    #[error("Template '{0}' is built in and cannot be modified")]
    BuiltinTemplate(String),
    #[error("Invalid template: {}", .0.join(", "))]
    ValidationFailure(Vec<String>),
    #[error("Measurement '{0}' not found")]
    MeasurementNotFound(String),
    #[error("The report is empty")]
    EmptyContent,
    #[error("Text generation failed: {0}")]
    Generation(String),
    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RadtextError>;
