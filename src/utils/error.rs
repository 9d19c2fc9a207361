use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtdError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{file}: line {line}: {message}")]
    FormatError {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Mapping error: {message}")]
    MappingError { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("No CTD cast identified for {platform} {deployment}")]
    NoCastIdentified { platform: String, deployment: String },

    #[error("Remote request to {url} failed ({status}): {message}")]
    RemoteError {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Plot rendering failed: {message}")]
    PlotError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Input,
    Configuration,
    Data,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CtdError {
    pub fn format(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        CtdError::FormatError {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CtdError::NotFound { what: what.into() }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CtdError::ApiError(_) | CtdError::RemoteError { .. } => ErrorCategory::Network,
            CtdError::IoError(_) | CtdError::WalkError(_) | CtdError::FormatError { .. } => {
                ErrorCategory::Input
            }
            CtdError::ConfigError { .. }
            | CtdError::MissingConfigError { .. }
            | CtdError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CtdError::CsvError(_)
            | CtdError::SerializationError(_)
            | CtdError::MappingError { .. }
            | CtdError::NotFound { .. }
            | CtdError::NoCastIdentified { .. }
            | CtdError::ValidationError { .. } => ErrorCategory::Data,
            CtdError::ZipError(_) | CtdError::PlotError { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CtdError::NoCastIdentified { .. } => ErrorSeverity::Low,
            CtdError::ApiError(_) | CtdError::RemoteError { .. } => ErrorSeverity::Medium,
            CtdError::IoError(_) | CtdError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the network connection, API credentials and retry",
            ErrorCategory::Input => "Check that the instrument files exist and are readable",
            ErrorCategory::Configuration => "Check the command line options and the TOML config",
            ErrorCategory::Data => "Check the mapping and cast tables for the requested entries",
            ErrorCategory::Output => "Check that the output directory is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CtdError::NoCastIdentified { platform, deployment } => format!(
                "No CTD cast identified for {} {}. Nothing to compare.",
                platform, deployment
            ),
            CtdError::RemoteError { status, message, .. } => {
                format!("Remote data request failed ({}): {}", status, message)
            }
            CtdError::FormatError { file, line, message } => {
                format!("Could not read instrument file {} (line {}): {}", file, line, message)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CtdError>;
