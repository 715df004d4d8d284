use crate::app::forms::{FormErrors, NON_FIELD_ERRORS};
use crate::core::tables::StorageError;
use crate::domain::model::{CourseId, StudentId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Data file '{file}' is inconsistent: {source}")]
    CorruptDataFile {
        file: String,
        #[source]
        source: StorageError,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(FormErrors),

    #[error("This student is already enrolled in this course.")]
    DuplicateEnrollment { student: StudentId, course: CourseId },

    #[error("{model} with id {id} does not exist")]
    NotFound { model: &'static str, id: u64 },

    #[error("Unknown lookup field: {field}")]
    InvalidLookup { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl AdminError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AdminError::ValidationError(_)
            | AdminError::DuplicateEnrollment { .. }
            | AdminError::NotFound { .. }
            | AdminError::InvalidLookup { .. } => ErrorCategory::Validation,
            AdminError::ConfigError { .. } | AdminError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            AdminError::IoError(_)
            | AdminError::SerializationError(_)
            | AdminError::CsvError(_)
            | AdminError::StorageError(_)
            | AdminError::CorruptDataFile { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for the CLI: 1 validation, 2 configuration, 3 storage/IO.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,     // 資料驗證錯誤
            ErrorSeverity::Medium => 2,   // 設定錯誤
            ErrorSeverity::Critical => 3, // 儲存/IO 錯誤
        }
    }

    /// 給使用者看的錯誤訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            AdminError::ValidationError(errors) => {
                let mut message = String::from("Please correct the errors below.");
                for (field, messages) in errors.fields() {
                    for m in messages {
                        if field == NON_FIELD_ERRORS {
                            message.push_str(&format!("\n  - {}", m));
                        } else {
                            message.push_str(&format!("\n  - {}: {}", field, m));
                        }
                    }
                }
                message
            }
            AdminError::DuplicateEnrollment { .. } => self.to_string(),
            AdminError::NotFound { model, id } => {
                format!("{} with ID \"{}\" doesn't exist. Perhaps it was deleted?", model, id)
            }
            AdminError::StorageError(e) => format!("The database rejected the change: {}", e),
            AdminError::IoError(e) => format!("Could not read or write the data file: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AdminError::ValidationError(_) => "Fix the listed fields and submit again",
            AdminError::DuplicateEnrollment { .. } => {
                "Edit the existing enrollment instead of creating a new one"
            }
            AdminError::NotFound { .. } => "Run the matching `list` command to find valid ids",
            AdminError::InvalidLookup { .. } => "Check the field name passed to --filter",
            AdminError::ConfigError { .. } | AdminError::InvalidConfigValueError { .. } => {
                "Check the configuration file and command-line flags"
            }
            AdminError::SerializationError(_) | AdminError::CorruptDataFile { .. } => {
                "The data file may be corrupted; restore it from a backup"
            }
            AdminError::StorageError(_) => "Reload the record and retry the edit",
            AdminError::IoError(_) | AdminError::CsvError(_) => {
                "Check that the data directory exists and is writable"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
