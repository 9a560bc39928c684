use serde::{Deserialize, Serialize};

/// Coarse classification of a failed session operation, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidFileType,
    FileRead,
    ServiceRejected,
    TransportFault,
}

impl ErrorCode {
    /// Whether calling `submit()` again may succeed without user changes.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ServiceRejected | Self::TransportFault)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
