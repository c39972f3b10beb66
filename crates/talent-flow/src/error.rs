use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::pipeline::{
    HistoryError, InstanceError, TransitionError, ValidationReport, WorkflowServiceError,
};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Decode(serde_json::Error),
    Export(csv::Error),
    Definition(ValidationReport),
    History(HistoryError),
    Instance(InstanceError),
    Transition(TransitionError),
    Workflow(WorkflowServiceError),
    Usage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Decode(err) => write!(f, "json error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::Definition(err) => write!(f, "definition error: {}", err),
            AppError::History(err) => write!(f, "history error: {}", err),
            AppError::Instance(err) => write!(f, "instance error: {}", err),
            AppError::Transition(err) => write!(f, "transition error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
            AppError::Usage(message) => write!(f, "usage error: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Decode(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::Definition(err) => Some(err),
            AppError::History(err) => Some(err),
            AppError::Instance(err) => Some(err),
            AppError::Transition(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            AppError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

impl From<ValidationReport> for AppError {
    fn from(value: ValidationReport) -> Self {
        Self::Definition(value)
    }
}

impl From<HistoryError> for AppError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

impl From<InstanceError> for AppError {
    fn from(value: InstanceError) -> Self {
        Self::Instance(value)
    }
}

impl From<TransitionError> for AppError {
    fn from(value: TransitionError) -> Self {
        Self::Transition(value)
    }
}

impl From<WorkflowServiceError> for AppError {
    fn from(value: WorkflowServiceError) -> Self {
        Self::Workflow(value)
    }
}
