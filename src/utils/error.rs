use thiserror::Error;

use crate::core::form::ValidationIssue;

#[derive(Error, Debug)]
pub enum VoucherError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Stored data under '{key}' is corrupt: {source}")]
    StorageCorruption {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed: {0}")]
    Validation(ValidationIssue),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("Field '{name}' not found in the PDF form")]
    FieldNotFound { name: String },

    #[error("Field '{name}' is a {kind} field and cannot hold text")]
    UnsupportedField { name: String, kind: String },

    #[error("Offline fetch failed for {url}: {message}")]
    OfflineError { url: String, message: String },

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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Input,
    Template,
    Network,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a failed command; never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 4,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl VoucherError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VoucherError::IoError(_)
            | VoucherError::SerializationError(_)
            | VoucherError::StorageCorruption { .. } => ErrorCategory::Storage,
            VoucherError::Validation(_) | VoucherError::NotFound { .. } => ErrorCategory::Input,
            VoucherError::PdfError(_)
            | VoucherError::InvalidTemplate { .. }
            | VoucherError::FieldNotFound { .. }
            | VoucherError::UnsupportedField { .. } => ErrorCategory::Template,
            VoucherError::NetworkError(_)
            | VoucherError::UrlError(_)
            | VoucherError::OfflineError { .. } => ErrorCategory::Network,
            VoucherError::ConfigError { .. }
            | VoucherError::ConfigValidationError { .. }
            | VoucherError::InvalidConfigValueError { .. }
            | VoucherError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VoucherError::FieldNotFound { .. } | VoucherError::UnsupportedField { .. } => {
                ErrorSeverity::Low
            }
            VoucherError::NetworkError(_) | VoucherError::OfflineError { .. } => {
                ErrorSeverity::Medium
            }
            VoucherError::StorageCorruption { .. } | VoucherError::IoError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    /// Short message suitable for a success/error notice.
    pub fn user_friendly_message(&self) -> String {
        match self {
            VoucherError::Validation(issue) => issue.message().to_string(),
            VoucherError::NotFound { entity, .. } => format!("{} not found.", entity),
            VoucherError::InvalidTemplate { reason, .. } => reason.clone(),
            VoucherError::StorageCorruption { key, .. } => {
                format!("Saved data for '{}' could not be read.", key)
            }
            VoucherError::PdfError(_) => "Could not generate the PDF.".to_string(),
            VoucherError::NetworkError(_) | VoucherError::OfflineError { .. } => {
                "Network unavailable and no cached copy exists.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Storage => {
                "Check the data directory; remove or repair the corrupt file to start that collection over"
            }
            ErrorCategory::Input => "Review the voucher fields and try again",
            ErrorCategory::Template => {
                "Upload a fillable PDF template for the agency in the configuration step"
            }
            ErrorCategory::Network => "Check the connection or install the offline cache first",
            ErrorCategory::Configuration => "Fix the configuration file or command-line flags",
        }
    }
}

pub type Result<T> = std::result::Result<T, VoucherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_is_critical_storage_error() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = VoucherError::StorageCorruption {
            key: "vouchers".to_string(),
            source,
        };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("vouchers"));
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let missing_field = VoucherError::FieldNotFound {
            name: "destino_01".to_string(),
        };
        assert_eq!(missing_field.severity(), ErrorSeverity::Low);
        assert_ne!(missing_field.severity().exit_code(), 0);

        let codes: Vec<i32> = [
            ErrorSeverity::Low,
            ErrorSeverity::Medium,
            ErrorSeverity::High,
            ErrorSeverity::Critical,
        ]
        .iter()
        .map(ErrorSeverity::exit_code)
        .collect();
        assert_eq!(codes, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_validation_message_is_user_facing() {
        let err = VoucherError::Validation(ValidationIssue::MissingContractorName);
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(
            err.user_friendly_message(),
            ValidationIssue::MissingContractorName.message()
        );
    }
}
