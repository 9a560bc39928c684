//! Wire contract of the remote conversion service.

use serde::{Deserialize, Serialize};

pub const UPLOAD_PATH: &str = "/upload";
pub const FILE_FIELD: &str = "file";
pub const COLUMN_FIELD: &str = "column";

pub const CSV_MEDIA_TYPE: &str = "text/csv";
pub const CSV_EXTENSION: &str = ".csv";

pub const PROCESSED_FILE_PREFIX: &str = "processed-";
pub const FALLBACK_FILE_NAME: &str = "data.csv";

/// Success body of `POST {base}/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Path of the converted file, relative to the service base address.
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body the service may attach to a non-2xx response. Never required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub error: String,
}

impl ServiceErrorBody {
    pub fn parse(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}
