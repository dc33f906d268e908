use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Grist API error: {status}")]
    UpstreamStatus { status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// 對外可見的錯誤種類，HTTP 回應只暴露這一層
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Storage,
    Config,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn storage(message: impl Into<String>) -> Self {
        EtlError::StorageError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::UpstreamStatus { .. } => ErrorCategory::Upstream,
            EtlError::IoError(_) | EtlError::StorageError { .. } => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Config,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 上游暫時性錯誤，下次排程可能就恢復
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    /// Category-level text that is safe to hand to HTTP clients.
    pub fn public_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Upstream => "Upstream data source unavailable",
            ErrorCategory::Storage => "Storage unavailable",
            ErrorCategory::Config => "Service misconfigured",
            ErrorCategory::Internal => "Internal error",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::UpstreamStatus { status } => {
                format!("The Grist API answered with HTTP {}", status)
            }
            EtlError::ApiError(e) if e.is_timeout() => {
                "The Grist API did not answer in time".to_string()
            }
            EtlError::ApiError(_) => "Could not reach the Grist API".to_string(),
            EtlError::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::UpstreamStatus { status: 401 | 403 } => {
                "Check that GRIST_API_KEY is set and still valid"
            }
            EtlError::UpstreamStatus { status: 404 } => {
                "Check the document id and table id in the source config"
            }
            EtlError::UpstreamStatus { .. } | EtlError::ApiError(_) => {
                "Retry later; the next scheduled refresh will try again"
            }
            EtlError::IoError(_) | EtlError::StorageError { .. } => {
                "Check the storage location exists and is writable"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration file or environment",
            _ => "Inspect the logs for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
