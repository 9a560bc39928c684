//! HTTP client for the remote conversion service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::{Deserialize, Serialize};
use shared::protocol::{
    ServiceErrorBody, UploadResponse, COLUMN_FIELD, CSV_MEDIA_TYPE, FALLBACK_FILE_NAME,
    FILE_FIELD, PROCESSED_FILE_PREFIX, UPLOAD_PATH,
};
use tracing::{info, warn};
use url::Url;

use crate::{
    config::{normalize_base_url, ClientSettings},
    error::SessionError,
    file_source::FsFileSource,
    headers::LocalFile,
    ConversionService, FileSource,
};

/// Fully-qualified locator of a converted file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultReference(String);

impl ResultReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins the service base address with the `download_url` it returned.
///
/// An absolute `download_url` is taken as is.
pub fn resolve_result_reference(
    base_url: &str,
    download_url: &str,
) -> Result<ResultReference, SessionError> {
    let download_url = download_url.trim();
    if download_url.is_empty() {
        return Err(SessionError::TransportFault(
            "service response did not include a download_url".into(),
        ));
    }

    let joined = if is_http_url(download_url) {
        download_url.to_string()
    } else {
        let base = normalize_base_url(base_url);
        if download_url.starts_with('/') {
            format!("{base}{download_url}")
        } else {
            format!("{base}/{download_url}")
        }
    };

    Url::parse(&joined).map_err(|err| {
        SessionError::TransportFault(format!("invalid download url '{joined}': {err}"))
    })?;
    Ok(ResultReference(joined))
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Suggested name for the downloaded result of `file`.
pub fn download_file_name(file: Option<&LocalFile>) -> String {
    let name = file
        .map(LocalFile::name)
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_FILE_NAME);
    format!("{PROCESSED_FILE_PREFIX}{name}")
}

pub struct HttpConversionService {
    http: Client,
    base_url: String,
    files: Arc<dyn FileSource>,
}

impl HttpConversionService {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            http: Client::new(),
            base_url: normalize_base_url(base_url.as_ref()),
            files: Arc::new(FsFileSource),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: normalize_base_url(&settings.service_base_url),
            files: Arc::new(FsFileSource),
        })
    }

    pub fn with_file_source(mut self, files: Arc<dyn FileSource>) -> Self {
        self.files = files;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the converted file behind `reference`. One attempt, no retry.
    pub async fn download(&self, reference: &ResultReference) -> Result<Vec<u8>, SessionError> {
        let response = self.http.get(reference.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                url = reference.as_str(),
                "upload: result download rejected"
            );
            return Err(SessionError::ServiceRejected {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        info!(
            url = reference.as_str(),
            size_bytes = bytes.len(),
            "upload: downloaded converted file"
        );
        Ok(bytes.to_vec())
    }

    fn upload_form(
        &self,
        file: &LocalFile,
        bytes: Vec<u8>,
        column: &str,
    ) -> Result<Form, SessionError> {
        let part = Part::bytes(bytes)
            .file_name(file.name().to_string())
            .mime_str(file.media_type().unwrap_or(CSV_MEDIA_TYPE))
            .map_err(|err| {
                SessionError::TransportFault(format!(
                    "invalid media type for '{}': {err}",
                    file.name()
                ))
            })?;
        Ok(Form::new()
            .part(FILE_FIELD, part)
            .text(COLUMN_FIELD, column.to_string()))
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn submit(
        &self,
        file: &LocalFile,
        column: &str,
    ) -> Result<ResultReference, SessionError> {
        let bytes = self.files.read(file).await?;
        let size_bytes = bytes.len();
        let form = self.upload_form(file, bytes, column)?;

        info!(
            file = file.name(),
            column,
            size_bytes,
            "upload: submitting file to conversion service"
        );
        let response = self
            .http
            .post(format!("{}{UPLOAD_PATH}", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            match ServiceErrorBody::parse(&body) {
                Some(detail) => warn!(
                    status = status.as_u16(),
                    error = %detail.error,
                    "upload: conversion service rejected file"
                ),
                None => warn!(
                    status = status.as_u16(),
                    "upload: conversion service rejected file"
                ),
            }
            return Err(SessionError::ServiceRejected {
                status: status.as_u16(),
            });
        }

        let body: UploadResponse = response.json().await.map_err(|err| {
            SessionError::TransportFault(format!("malformed conversion service response: {err}"))
        })?;
        let reference = resolve_result_reference(&self.base_url, &body.download_url)?;
        info!(
            url = reference.as_str(),
            message = body.message.as_deref().unwrap_or_default(),
            "upload: conversion completed"
        );
        Ok(reference)
    }
}

#[cfg(test)]
#[path = "tests/conversion_tests.rs"]
mod tests;
