//! Remote recognition service reached over JSON/HTTP.
//!
//! Request: `POST <endpoint>` with
//! `{"image": "<base64 PNG>", "mode": "<layout mode>", "language": "eng"}`.
//! Response: `{"text": "...", "confidence": 0-100}`.
//!
//! An optional bearer token is sent as `Authorization: Bearer <token>`.

use super::{LayoutMode, RawRecognition, RecognitionAdapter};
use crate::buffer::PixelBuffer;
use crate::error::RecognitionError;
use crate::pipeline::encode::encode_png_base64_async;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    image: String,
    mode: LayoutMode,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    text: String,
    confidence: f32,
}

/// Adapter for a recognition service that speaks the JSON protocol above.
#[derive(Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("endpoint", &self.endpoint)
            .field("language", &self.language)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HttpEngine {
    pub fn new(
        endpoint: impl Into<String>,
        language: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            language: language.into(),
            api_key: None,
            timeout_secs,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl RecognitionAdapter for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn recognize(
        &self,
        image: &PixelBuffer,
        mode: LayoutMode,
    ) -> Result<RawRecognition, RecognitionError> {
        let body = RecognizeRequest {
            image: encode_png_base64_async(image)
                .await
                .map_err(|e| RecognitionError::Failed(format!("PNG encode: {e}")))?,
            mode,
            language: &self.language,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RecognitionError::Timeout {
                    secs: self.timeout_secs,
                }
            } else if e.is_connect() {
                RecognitionError::Unavailable(format!("{}: {e}", self.endpoint))
            } else {
                RecognitionError::Failed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Failed(format!(
                "HTTP {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Malformed(e.to_string()))?;
        debug!(
            "http engine mode {} → {} chars @ {:.1}",
            mode,
            parsed.text.len(),
            parsed.confidence
        );

        Ok(RawRecognition {
            text: parsed.text,
            confidence: parsed.confidence,
        })
    }
}
