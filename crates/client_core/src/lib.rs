use async_trait::async_trait;

pub mod config;
pub mod conversion;
pub mod error;
mod file_source;
pub mod headers;
pub mod session;

pub use conversion::{
    download_file_name, resolve_result_reference, HttpConversionService, ResultReference,
};
pub use error::SessionError;
pub use file_source::FsFileSource;
pub use headers::{extract_columns, is_accepted_file, LocalFile};
pub use session::{CompletionOutcome, FileSelection, SessionEvent, SessionSnapshot, UploadSession};

/// Remote endpoint that converts one column of an uploaded file.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn submit(&self, file: &LocalFile, column: &str)
        -> Result<ResultReference, SessionError>;
}

/// Stand-in used when a session never submits (e.g. header inspection only).
pub struct MissingConversionService;

#[async_trait]
impl ConversionService for MissingConversionService {
    async fn submit(
        &self,
        file: &LocalFile,
        column: &str,
    ) -> Result<ResultReference, SessionError> {
        Err(SessionError::TransportFault(format!(
            "conversion service is unavailable for file '{}' column '{column}'",
            file.name()
        )))
    }
}

/// Reads the bytes of a user-chosen file.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read(&self, file: &LocalFile) -> Result<Vec<u8>, SessionError>;
}
