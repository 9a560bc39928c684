use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub const INVALID_FILE_TYPE_MESSAGE: &str = "Only CSV files are accepted";
pub const SERVICE_REJECTED_MESSAGE: &str = "Failed to process CSV";
pub const UNKNOWN_FAULT_MESSAGE: &str = "An unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{}", INVALID_FILE_TYPE_MESSAGE)]
    InvalidFileType,
    #[error("Failed to read file: {0}")]
    FileRead(String),
    #[error("{}", SERVICE_REJECTED_MESSAGE)]
    ServiceRejected { status: u16 },
    #[error("{}", fault_message(.0))]
    TransportFault(String),
}

fn fault_message(detail: &str) -> &str {
    let detail = detail.trim();
    if detail.is_empty() {
        UNKNOWN_FAULT_MESSAGE
    } else {
        detail
    }
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidFileType => ErrorCode::InvalidFileType,
            Self::FileRead(_) => ErrorCode::FileRead,
            Self::ServiceRejected { .. } => ErrorCode::ServiceRejected,
            Self::TransportFault(_) => ErrorCode::TransportFault,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if err.is_status() => Self::ServiceRejected {
                status: status.as_u16(),
            },
            _ => Self::TransportFault(err.to_string()),
        }
    }
}
