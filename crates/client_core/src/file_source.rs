use async_trait::async_trait;
use tracing::debug;

use crate::{error::SessionError, headers::LocalFile, FileSource};

/// Reads files from the local filesystem without blocking the runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileSource;

#[async_trait]
impl FileSource for FsFileSource {
    async fn read(&self, file: &LocalFile) -> Result<Vec<u8>, SessionError> {
        let bytes = tokio::fs::read(file.path())
            .await
            .map_err(|err| SessionError::FileRead(format!("{}: {err}", file.path().display())))?;
        debug!(
            file = file.name(),
            size_bytes = bytes.len(),
            "upload: read local file"
        );
        Ok(bytes)
    }
}
