// src/broker.rs
// Credential broker client - requests ephemeral, scoped upload credentials

use crate::provider::types::{SourceFile, TranscribeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BROKER_TIMEOUT_SECS: u64 = 15;

/// Ephemeral, single-use upload credential.
///
/// Owned by the upload orchestrator for the duration of one attempt
/// sequence. Deliberately not serializable: credentials are never persisted
/// or reused across a pipeline restart.
#[derive(Debug, Clone)]
pub struct UploadCredential {
    pub upload_url: String,
    pub auth_token: String,
    pub issued_at: DateTime<Utc>,
}

/// Broker instruction to use the secondary, size-capped synchronous route.
#[derive(Debug, Clone)]
pub struct FallbackDirective {
    pub reason: String,
    pub max_fallback_size_bytes: u64,
    pub message: String,
}

/// Outcome of a credential request.
#[derive(Debug, Clone)]
pub enum CredentialGrant {
    Direct(UploadCredential),
    Fallback(FallbackDirective),
}

/// Trusted backend service issuing upload credentials.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn request_credential(
        &self,
        file: &SourceFile,
    ) -> Result<CredentialGrant, TranscribeError>;
}

#[derive(Debug, Serialize)]
struct CredentialRequest<'a> {
    #[serde(rename = "fileName")]
    file_name: &'a str,
    #[serde(rename = "fileSize")]
    file_size: u64,
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
}

// The broker answers with one of two shapes; the fallback variant is listed
// first so its required fields disambiguate the untagged parse.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CredentialResponse {
    Fallback {
        fallback: String,
        message: String,
        #[serde(rename = "maxFallbackSizeBytes")]
        max_fallback_size_bytes: u64,
    },
    Direct {
        #[serde(rename = "uploadUrl")]
        upload_url: String,
        #[serde(rename = "authToken")]
        auth_token: String,
    },
}

pub struct HttpCredentialBroker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCredentialBroker {
    pub fn new(base_url: &str) -> Result<Self, TranscribeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(BROKER_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscribeError::Provider(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl CredentialBroker for HttpCredentialBroker {
    async fn request_credential(
        &self,
        file: &SourceFile,
    ) -> Result<CredentialGrant, TranscribeError> {
        let url = format!("{}/credentials", self.base_url);
        let request = CredentialRequest {
            file_name: &file.name,
            file_size: file.byte_size,
            mime_type: &file.mime_type,
        };

        tracing::debug!(
            "Requesting upload credential for {} ({} bytes)",
            file.name,
            file.byte_size
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscribeError::Timeout
                } else {
                    TranscribeError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 402 | 403 => TranscribeError::AuthOrBilling(body),
                _ => TranscribeError::Provider(format!("HTTP {}: {}", status, body)),
            });
        }

        let parsed: CredentialResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Provider(format!("Invalid broker response: {}", e)))?;

        match parsed {
            CredentialResponse::Direct {
                upload_url,
                auth_token,
            } => {
                tracing::info!("Broker issued direct upload credential for {}", file.name);
                Ok(CredentialGrant::Direct(UploadCredential {
                    upload_url,
                    auth_token,
                    issued_at: Utc::now(),
                }))
            }
            CredentialResponse::Fallback {
                fallback,
                message,
                max_fallback_size_bytes,
            } => {
                tracing::warn!(
                    "Broker directed {} to fallback route ({}): {}",
                    file.name,
                    fallback,
                    message
                );
                Ok(CredentialGrant::Fallback(FallbackDirective {
                    reason: fallback,
                    max_fallback_size_bytes,
                    message,
                }))
            }
        }
    }
}
