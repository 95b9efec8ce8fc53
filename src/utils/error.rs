use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("WAV decoding error: {0}")]
    WavError(#[from] hound::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Pattern compilation error: {0}")]
    PatternError(#[from] regex::Error),

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

    #[error("Input file '{path}' not found")]
    MissingInputError { path: String },

    #[error("Stage '{stage}' could not be launched: {message}")]
    StageLaunchError { stage: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// 錯誤分類，用於日誌與退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CompanionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CompanionError::ConfigError { .. }
            | CompanionError::ConfigValidationError { .. }
            | CompanionError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CompanionError::MissingInputError { .. }
            | CompanionError::WavError(_)
            | CompanionError::ImageError(_)
            | CompanionError::SerializationError(_) => ErrorCategory::Input,
            CompanionError::ProcessingError { .. }
            | CompanionError::CsvError(_)
            | CompanionError::PatternError(_) => ErrorCategory::Processing,
            CompanionError::IoError(_) | CompanionError::StageLaunchError { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Processing => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 退出碼依嚴重程度決定
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CompanionError::MissingInputError { .. } => {
                "Check the input path, or run from the folder that holds the recordings"
            }
            CompanionError::WavError(_) => "Make sure the audio file is an uncompressed PCM or float WAV",
            CompanionError::ImageError(_) => {
                "Pass image_width/image_height in the detections file or provide a readable JPEG/PNG"
            }
            CompanionError::SerializationError(_) => "Check that the JSON input is well formed",
            CompanionError::ConfigError { .. }
            | CompanionError::ConfigValidationError { .. }
            | CompanionError::InvalidConfigValueError { .. } => {
                "Fix the launcher configuration file and try again"
            }
            CompanionError::StageLaunchError { .. } => {
                "Check that the stage program is installed and on PATH"
            }
            CompanionError::IoError(_) => "Check file permissions and free disk space",
            CompanionError::CsvError(_)
            | CompanionError::PatternError(_)
            | CompanionError::ProcessingError { .. } => "Re-run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CompanionError::MissingInputError { path } => format!("ERROR: File '{}' not found.", path),
            CompanionError::ConfigValidationError { field, message } => {
                format!("Invalid launcher configuration ({}): {}", field, message)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompanionError>;
