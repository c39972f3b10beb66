use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_conflict_retries = match env::var("WORKFLOW_MAX_CONFLICT_RETRIES") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidRetryLimit(raw))?,
            Err(_) => DEFAULT_MAX_CONFLICT_RETRIES,
        };

        let definition_path = env::var("WORKFLOW_DEFINITION_PATH")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig {
                max_conflict_retries,
                definition_path,
            },
        })
    }
}

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Settings for the workflow service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Reload-and-retry budget when an instance write loses a revision race.
    pub max_conflict_retries: u32,
    /// Definition file used when a command is not given one explicitly.
    pub definition_path: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            definition_path: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidRetryLimit(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRetryLimit(value) => write!(
                f,
                "WORKFLOW_MAX_CONFLICT_RETRIES must be a valid u32 (got '{}')",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
