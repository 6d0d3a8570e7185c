use serde::Serialize;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not connected to Active Directory")]
    NotConnected,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("LDAP error: {0}")]
    LdapError(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Confirmation text did not match, aborting")]
    ConfirmationMismatch,

    #[error("No FSMO role holder is offline, nothing to seize")]
    NoOfflineRoles,

    #[error("Aborted by operator")]
    Aborted,

    #[error("Prompt error: {0}")]
    PromptError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Serializable error for JSON summaries
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for CommandError {
    fn from(err: &AppError) -> Self {
        CommandError {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        CommandError::from(self).serialize(serializer)
    }
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotConnected => "NOT_CONNECTED",
            AppError::AuthenticationFailed(_) => "AUTH_FAILED",
            AppError::LdapError(_) => "LDAP_ERROR",
            AppError::ObjectNotFound(_) => "NOT_FOUND",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::OperationFailed(_) => "OPERATION_FAILED",
            AppError::ToolFailed(_) => "TOOL_FAILED",
            AppError::ConfirmationMismatch => "CONFIRMATION_MISMATCH",
            AppError::NoOfflineRoles => "NO_OFFLINE_ROLES",
            AppError::Aborted => "ABORTED",
            AppError::PromptError(_) => "PROMPT_ERROR",
            AppError::CsvError(_) => "CSV_ERROR",
            AppError::IoError(_) => "IO_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Process exit code for a run that ended with this error.
    ///
    /// - 1: operation failure
    /// - 2: configuration or usage error
    /// - 3: connection or authentication failure
    /// - 4: aborted by the operator or a failed precondition
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::ConfigError(_) | AppError::InvalidInput(_) => 2,
            AppError::NotConnected | AppError::AuthenticationFailed(_) => 3,
            AppError::ConfirmationMismatch | AppError::NoOfflineRoles | AppError::Aborted => 4,
            _ => 1,
        }
    }
}

impl From<ldap3::LdapError> for AppError {
    fn from(err: ldap3::LdapError) -> Self {
        AppError::LdapError(err.to_string())
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::PromptError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::ConfirmationMismatch.exit_code(), 4);
        assert_eq!(AppError::NoOfflineRoles.exit_code(), 4);
        assert_eq!(AppError::ConfigError("x".into()).exit_code(), 2);
        assert_eq!(AppError::NotConnected.exit_code(), 3);
        assert_eq!(AppError::LdapError("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_serializes_as_code_and_message() {
        let json = serde_json::to_value(AppError::ObjectNotFound("CN=DC2".into())).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Object not found: CN=DC2");
    }
}
