//! Multipart upload client and serialized upload queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dto::UploadResponse;
use crate::domain::entities::{ImageId, RawImage};
use crate::domain::errors::{TransportError, UploadError};
use crate::domain::ports::UploadPort;

/// Multipart field carrying the files.
pub const UPLOAD_FIELD: &str = "files";

/// Sends files to the upload endpoint as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct MultipartUploader {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl MultipartUploader {
    /// Creates an uploader posting to `endpoint`.
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Upload endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UploadPort for MultipartUploader {
    async fn upload(&self, file: &RawImage) -> Result<Vec<ImageId>, UploadError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TransportError::build(format!("invalid content type: {e}")))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        debug!(name = %file.name, size = file.len(), endpoint = %self.endpoint, "Uploading file");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        interpret_response(&self.endpoint, status, &body)
    }
}

/// Maps an upload endpoint answer to created ids.
///
/// Rate limiting and server errors become retryable transport errors; any
/// other refusal is a rejection carrying the server message.
///
/// # Errors
/// Returns an error when the server refused the file or answered with an
/// unexpected body.
pub fn interpret_response(
    endpoint: &str,
    status: u16,
    body: &str,
) -> Result<Vec<ImageId>, UploadError> {
    let parsed = serde_json::from_str::<UploadResponse>(body);

    if !(200..300).contains(&status) {
        if status == 429 || status >= 500 {
            return Err(TransportError::status(endpoint, status).into());
        }
        let message = parsed
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(UploadError::Rejected { message });
    }

    let response = parsed.map_err(|e| UploadError::InvalidResponse {
        message: e.to_string(),
    })?;

    if !response.success {
        return Err(UploadError::Rejected {
            message: response
                .message
                .unwrap_or_else(|| "upload not accepted".to_string()),
        });
    }

    let ids: Vec<ImageId> = response
        .data
        .map(|data| data.images.into_iter().map(|image| image.id.into()).collect())
        .unwrap_or_default();

    if ids.is_empty() {
        return Err(UploadError::InvalidResponse {
            message: "response contains no images".to_string(),
        });
    }
    Ok(ids)
}

/// Pacing and retry policy for batch uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Attempts per file, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Retry backoff unit; retry `n` waits `n` units.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Pause between consecutive files.
    #[serde(default = "default_inter_item_delay_ms")]
    pub inter_item_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_inter_item_delay_ms() -> u64 {
    1000
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            inter_item_delay_ms: default_inter_item_delay_ms(),
        }
    }
}

/// Outcome of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// File name.
    pub name: String,
    /// Attempts made.
    pub attempts: u32,
    /// Created ids, or the last error.
    pub result: Result<Vec<ImageId>, UploadError>,
}

impl UploadReport {
    /// Returns true if the file was stored.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Uploads files one at a time with per-file retries.
pub struct UploadQueue {
    port: Arc<dyn UploadPort>,
    policy: UploadPolicy,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl UploadQueue {
    /// Creates a queue sending through `port`.
    #[must_use]
    pub fn new(port: Arc<dyn UploadPort>, policy: UploadPolicy) -> Self {
        Self { port, policy }
    }

    /// Uploads every file in order and reports each outcome.
    ///
    /// A failed file never stops the batch. Once `cancel` fires, remaining
    /// files are reported as cancelled without being sent.
    pub async fn upload_all(
        &self,
        files: &[RawImage],
        cancel: Option<&CancellationToken>,
    ) -> Vec<UploadReport> {
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);
        let mut reports = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            if index > 0 && !self.pause(self.policy.inter_item_delay_ms, cancel).await {
                debug!("Upload batch cancelled between files");
            }

            let report = if cancel.is_cancelled() {
                UploadReport {
                    name: file.name.clone(),
                    attempts: 0,
                    result: Err(UploadError::Cancelled),
                }
            } else {
                self.upload_one(file, cancel).await
            };
            reports.push(report);
        }

        let stored = reports.iter().filter(|r| r.is_success()).count();
        info!(total = reports.len(), stored, "Upload batch finished");
        reports
    }

    async fn upload_one(&self, file: &RawImage, cancel: &CancellationToken) -> UploadReport {
        let total_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(UploadError::Cancelled),
                result = self.port.upload(file) => result,
            };

            match result {
                Ok(ids) => {
                    debug!(name = %file.name, attempt, ids = ids.len(), "Upload succeeded");
                    return UploadReport {
                        name: file.name.clone(),
                        attempts: attempt,
                        result: Ok(ids),
                    };
                }
                Err(e) if e.is_retryable() && attempt < total_attempts => {
                    let delay_ms = self.policy.retry_delay_ms.saturating_mul(u64::from(attempt));
                    warn!(name = %file.name, attempt, total_attempts, delay_ms, error = %e, "Upload failed, retrying");
                    if !self.pause(delay_ms, cancel).await {
                        return UploadReport {
                            name: file.name.clone(),
                            attempts: attempt,
                            result: Err(UploadError::Cancelled),
                        };
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(name = %file.name, attempt, error = %e, "Upload failed");
                    return UploadReport {
                        name: file.name.clone(),
                        attempts: attempt,
                        result: Err(e),
                    };
                }
            }
        }
    }

    async fn pause(&self, millis: u64, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(Duration::from_millis(millis)) => true,
        }
    }
}
