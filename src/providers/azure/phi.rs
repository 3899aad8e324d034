//! Azure Language PHI detection provider
//!
//! Calls PII entity recognition with `domain=phi` for healthcare-specific
//! categories. The service caps document size, so long texts are split into
//! chunks at whitespace boundaries and the chunk base offsets are added back
//! afterwards; callers always see offsets into the original `full_text`.

use crate::config::AzureConfig;
use crate::domain::{MaskingLevel, PhiEntity, PhiProviderError, Result};
use crate::providers::azure::{backoff_delay, phi_transport_error};
use crate::providers::{should_include_category, PhiProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

const API_VERSION: &str = "2023-04-01";

/// Service document limit is 5120 chars; stay under it with headroom
const MAX_CHUNK_CHARS: usize = 5000;

/// PII recognition accepts up to five documents per request
const MAX_DOCS_PER_REQUEST: usize = 5;

/// Azure Language service PHI detection implementation
pub struct AzurePhiProvider {
    client: Client,
    endpoint: String,
    key: String,
    max_retries: u32,
    custom_categories: HashSet<String>,
}

impl AzurePhiProvider {
    pub fn new(config: &AzureConfig) -> Result<Self> {
        if config.language_endpoint.is_empty() || config.language_key.is_empty() {
            return Err(crate::domain::RedactifyError::Configuration(
                "Azure Language endpoint and key are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PhiProviderError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.language_endpoint.trim_end_matches('/').to_string(),
            key: config.language_key.clone(),
            max_retries: config.max_retries,
            custom_categories: HashSet::new(),
        })
    }

    /// Categories masked in CUSTOM mode
    pub fn with_custom_categories(mut self, categories: HashSet<String>) -> Self {
        self.custom_categories = categories;
        self
    }

    async fn recognize_batch(
        &self,
        batch: &[Chunk],
    ) -> std::result::Result<Vec<PhiEntity>, PhiProviderError> {
        let request = AnalyzeTextRequest {
            kind: "PiiEntityRecognition",
            analysis_input: AnalysisInput {
                documents: batch
                    .iter()
                    .enumerate()
                    .map(|(i, chunk)| DocumentInput {
                        id: i.to_string(),
                        language: "en".to_string(),
                        text: chunk.text.clone(),
                    })
                    .collect(),
            },
            parameters: PiiParameters {
                domain: "phi",
                string_index_type: "UnicodeCodePoint",
            },
        };

        let url = format!("{}/language/:analyze-text?api-version={API_VERSION}", self.endpoint);
        let response = self
            .client
            .post(url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&request)
            .send()
            .await
            .map_err(phi_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message));
        }

        let parsed: AnalyzeTextResponse = response.json().await.map_err(phi_transport_error)?;

        if let Some(failure) = parsed.results.errors.first() {
            return Err(PhiProviderError::DetectionFailed(
                failure.error.message.clone(),
            ));
        }

        let mut entities = Vec::new();
        for document in parsed.results.documents {
            let batch_index: usize = document.id.parse().map_err(|_| {
                PhiProviderError::InvalidResponse(format!(
                    "unexpected document id '{}'",
                    document.id
                ))
            })?;
            let base = batch
                .get(batch_index)
                .ok_or_else(|| {
                    PhiProviderError::InvalidResponse(format!(
                        "document id {batch_index} outside submitted batch"
                    ))
                })?
                .base_offset;

            for dto in document.entities {
                entities.push(PhiEntity {
                    text: dto.text,
                    category: dto.category,
                    subcategory: dto.subcategory,
                    offset: base + dto.offset,
                    length: dto.length,
                    confidence: dto.confidence_score,
                });
            }
        }
        Ok(entities)
    }
}

#[async_trait]
impl PhiProvider for AzurePhiProvider {
    async fn detect(&self, full_text: &str, level: MaskingLevel) -> Result<Vec<PhiEntity>> {
        if full_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            characters = full_text.chars().count(),
            %level,
            "starting Azure PHI detection"
        );

        let chunks = chunk_text(full_text, MAX_CHUNK_CHARS);
        let mut entities = Vec::new();

        for batch in chunks.chunks(MAX_DOCS_PER_REQUEST) {
            let mut attempt = 0u32;
            let batch_entities = loop {
                match self.recognize_batch(batch).await {
                    Ok(found) => break found,
                    Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                        attempt += 1;
                        tracing::warn!(attempt, error = %e, "retrying PHI detection batch");
                        tokio::time::sleep(backoff_delay(attempt - 1)).await;
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            entities.extend(batch_entities);
        }

        entities.retain(|e| should_include_category(&e.category, level, &self.custom_categories));
        entities.sort_by_key(|e| e.offset);

        tracing::info!(count = entities.len(), "Azure PHI detection completed");
        Ok(entities)
    }
}

fn is_retryable(err: &PhiProviderError) -> bool {
    matches!(
        err,
        PhiProviderError::ConnectionFailed(_)
            | PhiProviderError::Timeout(_)
            | PhiProviderError::ServerError { .. }
    )
}

fn status_error(status: StatusCode, message: String) -> PhiProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PhiProviderError::AuthenticationFailed(message)
        }
        s if s.is_server_error() => PhiProviderError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => PhiProviderError::ClientError {
            status: s.as_u16(),
            message,
        },
    }
}

/// A slice of the original text plus the char offset where it begins
#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    base_offset: usize,
    text: String,
}

/// Split text into chunks of at most `max_chars`, preferring whitespace
/// boundaries so entities are not cut in half
fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        let mut split = end;
        if end < chars.len() {
            if let Some(ws) = (start..end).rev().find(|&i| chars[i].is_whitespace()) {
                if ws > start {
                    split = ws + 1;
                }
            }
        }
        chunks.push(Chunk {
            base_offset: start,
            text: chars[start..split].iter().collect(),
        });
        start = split;
    }

    chunks
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeTextRequest {
    kind: &'static str,
    analysis_input: AnalysisInput,
    parameters: PiiParameters,
}

#[derive(Debug, Serialize)]
struct AnalysisInput {
    documents: Vec<DocumentInput>,
}

#[derive(Debug, Serialize)]
struct DocumentInput {
    id: String,
    language: String,
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PiiParameters {
    domain: &'static str,
    string_index_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeTextResponse {
    results: PiiResults,
}

#[derive(Debug, Deserialize)]
struct PiiResults {
    #[serde(default)]
    documents: Vec<PiiDocument>,
    #[serde(default)]
    errors: Vec<PiiDocumentError>,
}

#[derive(Debug, Deserialize)]
struct PiiDocument {
    id: String,
    #[serde(default)]
    entities: Vec<PiiEntityDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PiiEntityDto {
    text: String,
    category: String,
    subcategory: Option<String>,
    offset: usize,
    length: usize,
    confidence_score: f64,
}

#[derive(Debug, Deserialize)]
struct PiiDocumentError {
    #[allow(dead_code)]
    id: String,
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
