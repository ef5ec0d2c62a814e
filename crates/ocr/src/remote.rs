use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::config::RemoteApiConfig;
use crate::recognizer::{OcrBackend, OcrError};

/// Client for an OCR.space-compatible `parse/image` endpoint.
///
/// The service answers 2xx even when recognition fails; real failures are
/// flagged in the JSON body, which is why transport errors, flagged
/// processing errors, and malformed bodies map to three distinct variants.
pub struct RemoteRecognizer {
    client: reqwest::Client,
    config: RemoteApiConfig,
}

impl RemoteRecognizer {
    pub fn new(config: RemoteApiConfig) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OcrBackend for RemoteRecognizer {
    async fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<String, OcrError> {
        let part = multipart::Part::bytes(image_bytes.to_vec())
            .file_name("document.png")
            .mime_str("image/png")
            .map_err(|e| OcrError::Network(e.to_string()))?;
        let form = multipart::Form::new()
            .text("apikey", self.config.api_key.clone())
            .text("language", languages.to_string())
            .text(
                "isOverlayRequired",
                if self.config.overlay { "true" } else { "false" },
            )
            .part("file", part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Network(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;
        parse_response(&body)
    }
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ParseImageResponse {
    #[serde(rename = "IsErroredOnProcessing")]
    is_errored_on_processing: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Vec<String>,
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<ParsedResult>,
}

#[derive(Debug, Deserialize)]
struct ParsedResult {
    #[serde(rename = "ParsedText")]
    parsed_text: String,
}

/// Decode a 2xx response body into the first page's text.
fn parse_response(body: &str) -> Result<String, OcrError> {
    let parsed: ParseImageResponse =
        serde_json::from_str(body).map_err(|e| OcrError::Parse(e.to_string()))?;
    if parsed.is_errored_on_processing {
        let message = parsed
            .error_message
            .first()
            .cloned()
            .unwrap_or_else(|| "unspecified processing error".to_string());
        return Err(OcrError::ApiProcessing(message));
    }
    match parsed.parsed_results.into_iter().next() {
        Some(page) => Ok(page.parsed_text),
        None => Err(OcrError::Parse(
            "response contained no parsed results".to_string(),
        )),
    }
}
