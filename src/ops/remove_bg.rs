// ============================================================================
// BACKGROUND REMOVAL: remote round trip used by the ingestion pipeline
// ============================================================================

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;

use crate::config::AppSettings;

#[derive(Debug, Error)]
pub enum RemoveBgError {
    #[error("no API key configured (set REMOVEBG_API_KEY)")]
    MissingApiKey,
    #[error("background removal is switched off")]
    Disabled,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered {code}: {body}")]
    Status { code: u16, body: String },
}

/// Anything that can strip the background from an encoded image.
///
/// The ingestion worker only talks to this trait, so tests can swap in a
/// canned implementation instead of the network client.
pub trait BackgroundRemover: Send + Sync {
    /// Returns the processed image as encoded bytes.
    fn remove_background(&self, payload: &[u8]) -> Result<Vec<u8>, RemoveBgError>;
}

/// remove.bg-compatible HTTP client.
pub struct RemoveBgClient {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoveBgClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            settings.remove_bg_endpoint.clone(),
            AppSettings::api_key(),
            Duration::from_secs(settings.remove_bg_timeout_secs),
        )
    }
}

impl BackgroundRemover for RemoveBgClient {
    fn remove_background(&self, payload: &[u8]) -> Result<Vec<u8>, RemoveBgError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(RemoveBgError::MissingApiKey)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let form = Form::new()
            .part("image_file", Part::bytes(payload.to_vec()).file_name("upload"))
            .text("size", "auto");

        tracing::debug!("POST {} ({} bytes)", self.endpoint, payload.len());
        let response = client
            .post(&self.endpoint)
            .header("X-Api-Key", key)
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RemoveBgError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Stand-in used when background removal is switched off in the settings
/// or on the command line. Always fails, so ingestion takes the fallback path.
pub struct Disabled;

impl BackgroundRemover for Disabled {
    fn remove_background(&self, _payload: &[u8]) -> Result<Vec<u8>, RemoveBgError> {
        Err(RemoveBgError::Disabled)
    }
}
