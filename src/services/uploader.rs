use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::services::payload::FilePayload;
use crate::services::progress::Reporter;
use crate::utils::{file, validation};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

/// Reply of the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploaderResponse {
    #[serde(rename = "statusCode")]
    pub status_code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Vec<UploadedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedItem {
    #[serde(rename = "result")]
    pub url: String,
    pub file_type: i32,
}

/// Sends payloads to the upload endpoint as `multipart/form-data`.
pub struct Uploader {
    client: Client,
    config: UploadConfig,
}

impl Uploader {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: UploadConfig) -> Self {
        Self { client, config }
    }

    /// Refuses files over `max_file_size` before any byte is sent.
    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        let limit = self.config.max_file_size;
        if size > limit {
            warn!("Refusing upload of {} bytes (limit {} bytes)", size, limit);
            return Err(UploadError::TooLarge { size, limit });
        }
        Ok(())
    }

    /// `base_url` joined with `upload_path`.
    pub fn endpoint(&self) -> Result<Url, UploadError> {
        Url::parse(&self.config.base_url)
            .and_then(|base| base.join(&self.config.upload_path))
            .map_err(|e| {
                UploadError::InvalidUrl(format!(
                    "{} + {}: {}",
                    self.config.base_url, self.config.upload_path, e
                ))
            })
    }

    /// Uploads one payload and decodes the server reply.
    pub async fn upload(&self, payload: FilePayload) -> Result<UploaderResponse, UploadError> {
        let url = self.endpoint()?;
        let length = payload.content_length().await?;
        self.check_size(length)?;
        let content_type = payload.content_type().to_string();
        let file_name = validation::upload_file_name(&self.config.file_stem, payload.content_type())?;

        info!(
            "Uploading {} ({} bytes, {}) to {}",
            payload.path().display(),
            length,
            content_type,
            url
        );

        let part = Part::stream_with_length(payload.into_body(), length)
            .file_name(file_name)
            .mime_str(&content_type)?;
        let form = Form::new().part(self.config.field_name.clone(), part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| error!("Upload request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Upload failed with status {}", status);
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: UploaderResponse = serde_json::from_str(&body)?;
        if reply.status_code != 200 {
            warn!("Upload rejected: {} {}", reply.status_code, reply.message);
            return Err(UploadError::Rejected {
                status_code: reply.status_code,
                message: reply.message,
            });
        }

        info!("Upload finished: {}", reply.message);
        Ok(reply)
    }

    /// Uploads `path` with the configured chunk size and progress mode.
    pub async fn upload_file(
        &self,
        path: &Path,
        content_type: &str,
        reporter: Option<Reporter>,
    ) -> Result<UploaderResponse, UploadError> {
        let mut payload = FilePayload::from_config(path, content_type, &self.config)?;
        if let Some(reporter) = reporter {
            payload = payload.with_reporter(reporter);
        }
        self.upload(payload).await
    }

    /// Snapshots `source` into the cache dir, uploads the snapshot, and removes
    /// it again whether or not the upload succeeded.
    pub async fn upload_staged(
        &self,
        source: &Path,
        content_type: &str,
        reporter: Option<Reporter>,
    ) -> Result<UploaderResponse, UploadError> {
        let mime = validation::parse_content_type(content_type)?;
        let extension = validation::extension_for(&mime)?;
        self.check_size(file::file_size(source).await?)?;
        let staged = file::stage_copy(source, &self.config.cache_dir, extension).await?;

        let result = self.upload_file(&staged, content_type, reporter).await;

        if let Err(e) = tokio::fs::remove_file(&staged).await {
            warn!("Failed to remove staged file {}: {}", staged.display(), e);
        }
        result
    }
}
