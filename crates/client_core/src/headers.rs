//! File acceptance rules and header (column) extraction.

use std::path::{Path, PathBuf};

use shared::protocol::{CSV_EXTENSION, CSV_MEDIA_TYPE};

/// A user-chosen local file, as handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    media_type: Option<String>,
}

impl LocalFile {
    /// Builds a handle whose declared media type is guessed from the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = mime_guess::from_path(&path)
            .first_raw()
            .map(str::to_string);
        Self {
            path,
            name,
            media_type,
        }
    }

    /// Overrides the declared media type, e.g. with the one a file picker reports.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// A file is accepted when it declares the CSV media type or carries a `.csv` name.
pub fn is_accepted_file(file: &LocalFile) -> bool {
    file.media_type() == Some(CSV_MEDIA_TYPE) || file.name().ends_with(CSV_EXTENSION)
}

/// Splits the first line of `content` into trimmed column names.
///
/// Order and duplicates are preserved. An empty first line yields a single
/// empty column name.
pub fn extract_columns(content: &[u8]) -> Vec<String> {
    let first_line = match content.iter().position(|b| *b == b'\n') {
        Some(end) => &content[..end],
        None => content,
    };
    String::from_utf8_lossy(first_line)
        .split(',')
        .map(|column| column.trim().to_string())
        .collect()
}
