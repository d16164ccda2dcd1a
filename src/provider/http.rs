// src/provider/http.rs
// reqwest-backed provider client

use super::types::{
    CreateJobRequest, CreateJobResponse, JobStatusResponse, SyncTranscribeResponse,
    TranscribeError, TranscriptPart, UploadedMedia,
};
use super::ProviderClient;
use crate::broker::UploadCredential;
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use std::time::Duration;

const CONTROL_TIMEOUT_SECS: u64 = 30;

pub struct HttpProviderClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TranscribeError> {
        // Control-plane calls (job create/status) get a fixed client timeout;
        // data transfers override it per request with a size-scaled value.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscribeError::Provider(e.to_string()))?;

        tracing::info!("Provider client initialized for {}", base_url);

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn classify_response(status: StatusCode, body: String) -> TranscribeError {
        match status.as_u16() {
            401 | 402 | 403 => TranscribeError::AuthOrBilling(body),
            415 | 422 => TranscribeError::UnsupportedFormat(body),
            429 => TranscribeError::RateLimited,
            _ => TranscribeError::Provider(format!("HTTP {}: {}", status, body)),
        }
    }

    fn classify_transport(e: reqwest::Error) -> TranscribeError {
        if e.is_timeout() {
            TranscribeError::Timeout
        } else {
            TranscribeError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn upload_media(
        &self,
        credential: &UploadCredential,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<UploadedMedia, TranscribeError> {
        tracing::info!(
            "Uploading {} bytes to {} (timeout {}s)",
            bytes.len(),
            credential.upload_url,
            timeout.as_secs()
        );

        let response = self
            .client
            .post(&credential.upload_url)
            .header("Authorization", &credential.auth_token)
            .timeout(timeout)
            .body(bytes)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<UploadedMedia>()
                .await
                .map_err(|e| TranscribeError::Provider(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_response(status, body))
        }
    }

    async fn create_job(
        &self,
        audio_ref: &str,
        speaker_labels: bool,
    ) -> Result<String, TranscribeError> {
        let url = format!("{}/jobs", self.base_url);
        let request = CreateJobRequest {
            audio_ref: audio_ref.to_string(),
            speaker_labels,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            let created: CreateJobResponse = response
                .json()
                .await
                .map_err(|e| TranscribeError::Provider(e.to_string()))?;
            tracing::info!("Created transcription job: {}", created.job_id);
            Ok(created.job_id)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_response(status, body))
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, TranscribeError> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<JobStatusResponse>()
                .await
                .map_err(|e| TranscribeError::Provider(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_response(status, body))
        }
    }

    async fn transcribe_sync(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<TranscriptPart, TranscribeError> {
        let url = format!("{}/fallback-transcribe", self.base_url);

        tracing::info!(
            "Synchronous transcription of {} ({} bytes)",
            file_name,
            bytes.len()
        );

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| TranscribeError::Provider(e.to_string()))?;

        let form = multipart::Form::new().part("file", file_part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            let body: SyncTranscribeResponse = response
                .json()
                .await
                .map_err(|e| TranscribeError::Provider(e.to_string()))?;

            Ok(TranscriptPart {
                text: body.transcript_text,
                duration_secs: body.duration_seconds,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify_response(status, body))
        }
    }
}
