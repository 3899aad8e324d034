//! Azure Document Intelligence OCR provider
//!
//! Uses the `prebuilt-read` model over REST: submit the document, then poll
//! the returned operation until analysis completes. Words arrive as
//! four-corner polygons; they are collapsed to the axis-aligned box
//! enclosing the polygon. `stringIndexType=unicodeCodePoint` keeps the
//! `full_text` offsets char-based, matching the rest of the core.

use crate::config::AzureConfig;
use crate::document::DocumentFormat;
use crate::domain::{
    BoundingBox, OcrPage, OcrProviderError, OcrResult, OcrWord, Result,
};
use crate::providers::azure::{backoff_delay, ocr_transport_error};
use crate::providers::OcrProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const API_VERSION: &str = "2023-07-31";

/// Azure Document Intelligence OCR implementation
pub struct AzureOcrProvider {
    client: Client,
    endpoint: String,
    key: String,
    max_retries: u32,
    poll_interval: Duration,
    poll_budget: u32,
}

impl AzureOcrProvider {
    /// Create a provider from configuration
    ///
    /// Fails fast when the endpoint or key is missing so misconfiguration
    /// surfaces at startup rather than mid-document.
    pub fn new(config: &AzureConfig) -> Result<Self> {
        if config.document_intelligence_endpoint.is_empty()
            || config.document_intelligence_key.is_empty()
        {
            return Err(crate::domain::RedactifyError::Configuration(
                "Azure Document Intelligence endpoint and key are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OcrProviderError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config
                .document_intelligence_endpoint
                .trim_end_matches('/')
                .to_string(),
            key: config.document_intelligence_key.clone(),
            max_retries: config.max_retries,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_budget: config.timeout_seconds as u32,
        })
    }

    fn analyze_url(&self, language: Option<&str>) -> String {
        let mut url = format!(
            "{}/formrecognizer/documentModels/prebuilt-read:analyze\
             ?api-version={API_VERSION}&stringIndexType=unicodeCodePoint",
            self.endpoint
        );
        if let Some(locale) = language {
            url.push_str(&format!("&locale={locale}"));
        }
        url
    }

    /// Submit the document; returns the operation URL to poll
    async fn submit(
        &self,
        document_bytes: &[u8],
        content_type: &str,
        language: Option<&str>,
    ) -> std::result::Result<String, OcrProviderError> {
        let response = self
            .client
            .post(self.analyze_url(language))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", content_type)
            .body(document_bytes.to_vec())
            .send()
            .await
            .map_err(ocr_transport_error)?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return response
                .headers()
                .get("operation-location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    OcrProviderError::InvalidResponse(
                        "missing Operation-Location header".to_string(),
                    )
                });
        }

        let message = response.text().await.unwrap_or_default();
        Err(status_error(status, message))
    }

    /// Poll the operation until it reaches a terminal state
    async fn poll(&self, operation_url: &str) -> std::result::Result<AnalyzeResult, OcrProviderError> {
        for _ in 0..self.poll_budget {
            let response = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await
                .map_err(ocr_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(status_error(status, message));
            }

            let operation: AnalyzeOperation =
                response.json().await.map_err(ocr_transport_error)?;

            match operation.status.as_str() {
                "succeeded" => {
                    return operation.analyze_result.ok_or_else(|| {
                        OcrProviderError::InvalidResponse(
                            "succeeded operation carried no analyzeResult".to_string(),
                        )
                    })
                }
                "failed" => {
                    let message = operation
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "unspecified analysis error".to_string());
                    return Err(OcrProviderError::AnalysisFailed(message));
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(OcrProviderError::Timeout(format!(
            "analysis did not complete within {} polls",
            self.poll_budget
        )))
    }
}

#[async_trait]
impl OcrProvider for AzureOcrProvider {
    async fn analyze(
        &self,
        document_bytes: &[u8],
        format: DocumentFormat,
        language: Option<&str>,
    ) -> Result<OcrResult> {
        let content_type = content_type_for(format)?;
        tracing::info!(
            bytes = document_bytes.len(),
            content_type,
            "starting Azure OCR analysis"
        );

        let mut attempt = 0u32;
        let operation_url = loop {
            match self.submit(document_bytes, content_type, language).await {
                Ok(url) => break url,
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "retrying OCR submission");
                    tokio::time::sleep(backoff_delay(attempt - 1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let analyze_result = self.poll(&operation_url).await?;
        let ocr_result = convert_analyze_result(analyze_result)?;

        tracing::info!(
            pages = ocr_result.pages.len(),
            words = ocr_result.word_count(),
            characters = ocr_result.full_text.chars().count(),
            "Azure OCR completed"
        );
        Ok(ocr_result)
    }
}

fn content_type_for(format: DocumentFormat) -> std::result::Result<&'static str, OcrProviderError> {
    match format {
        DocumentFormat::Tiff => Ok("image/tiff"),
        DocumentFormat::Png => Ok("image/png"),
        DocumentFormat::Pdf => Ok("application/pdf"),
    }
}

fn is_retryable(err: &OcrProviderError) -> bool {
    matches!(
        err,
        OcrProviderError::ConnectionFailed(_)
            | OcrProviderError::Timeout(_)
            | OcrProviderError::ServerError { .. }
    )
}

fn status_error(status: StatusCode, message: String) -> OcrProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            OcrProviderError::AuthenticationFailed(message)
        }
        s if s.is_server_error() => OcrProviderError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => OcrProviderError::ClientError {
            status: s.as_u16(),
            message,
        },
    }
}

/// Convert the service response to the normalized model
///
/// Pages measured in pixels keep absolute coordinates. Pages measured in any
/// other unit (PDF input reports inches) are rescaled to normalized `[0, 1]`
/// coordinates and their dimensions dropped, so the painter scales them by
/// the real raster size later.
fn convert_analyze_result(result: AnalyzeResult) -> Result<OcrResult> {
    let mut pages = Vec::with_capacity(result.pages.len());

    for page in result.pages {
        let pixel_unit = page.unit.as_deref() == Some("pixel");
        let page_w = page.width.unwrap_or(0.0);
        let page_h = page.height.unwrap_or(0.0);

        let mut words = Vec::with_capacity(page.words.len());
        for word in page.words {
            let bounds = polygon_to_bbox(&word.polygon, page.page_number)?;
            let bounds = if pixel_unit || page_w <= 0.0 || page_h <= 0.0 {
                bounds
            } else {
                BoundingBox::normalized(
                    page.page_number,
                    bounds.x / page_w,
                    bounds.y / page_h,
                    bounds.width / page_w,
                    bounds.height / page_h,
                )
            };
            words.push(OcrWord::new(word.content, word.confidence, bounds));
        }

        let (width, height) = if pixel_unit { (page_w, page_h) } else { (1.0, 1.0) };
        pages.push(OcrPage {
            page_number: page.page_number,
            width,
            height,
            words,
        });
    }

    Ok(OcrResult {
        pages,
        full_text: result.content,
    })
}

/// Collapse a four-corner polygon `[x1, y1, ..., x4, y4]` to its enclosing
/// axis-aligned box
fn polygon_to_bbox(polygon: &[f64], page_number: u32) -> Result<BoundingBox> {
    if polygon.len() != 8 {
        return Err(OcrProviderError::InvalidResponse(format!(
            "expected 8 polygon coordinates, got {}",
            polygon.len()
        ))
        .into());
    }

    let xs = polygon.iter().step_by(2);
    let ys = polygon.iter().skip(1).step_by(2);
    let min_x = xs.clone().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_x = xs.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let min_y = ys.clone().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_y = ys.fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    Ok(BoundingBox::pixel(
        page_number,
        min_x,
        min_y,
        max_x - min_x,
        max_y - min_y,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    pages: Vec<AnalyzePage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzePage {
    page_number: u32,
    width: Option<f64>,
    height: Option<f64>,
    unit: Option<String>,
    #[serde(default)]
    words: Vec<AnalyzeWord>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeWord {
    content: String,
    #[serde(default)]
    polygon: Vec<f64>,
    confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CoordinateSpace;

    #[test]
    fn test_polygon_to_bbox() {
        // Slightly rotated rectangle
        let polygon = [100.0, 200.0, 150.0, 202.0, 149.0, 222.0, 99.0, 220.0];
        let bbox = polygon_to_bbox(&polygon, 1).unwrap();
        assert_eq!(bbox.x, 99.0);
        assert_eq!(bbox.y, 200.0);
        assert_eq!(bbox.width, 51.0);
        assert_eq!(bbox.height, 22.0);
    }

    #[test]
    fn test_polygon_wrong_arity_rejected() {
        assert!(polygon_to_bbox(&[1.0, 2.0], 1).is_err());
    }

    #[test]
    fn test_pixel_unit_pages_stay_absolute() {
        let result = AnalyzeResult {
            content: "Hi".to_string(),
            pages: vec![AnalyzePage {
                page_number: 1,
                width: Some(2550.0),
                height: Some(3300.0),
                unit: Some("pixel".to_string()),
                words: vec![AnalyzeWord {
                    content: "Hi".to_string(),
                    polygon: vec![10.0, 10.0, 40.0, 10.0, 40.0, 30.0, 10.0, 30.0],
                    confidence: 0.98,
                }],
            }],
        };
        let ocr = convert_analyze_result(result).unwrap();
        let word = ocr.words().next().unwrap();
        assert_eq!(word.bounds.space, CoordinateSpace::Pixel);
        assert_eq!(word.bounds.x, 10.0);
        assert_eq!(ocr.pixel_dims(1), Some((2550.0, 3300.0)));
    }

    #[test]
    fn test_inch_unit_pages_become_normalized() {
        let result = AnalyzeResult {
            content: "Hi".to_string(),
            pages: vec![AnalyzePage {
                page_number: 1,
                width: Some(8.5),
                height: Some(11.0),
                unit: Some("inch".to_string()),
                words: vec![AnalyzeWord {
                    content: "Hi".to_string(),
                    polygon: vec![0.85, 1.1, 1.7, 1.1, 1.7, 2.2, 0.85, 2.2],
                    confidence: 0.98,
                }],
            }],
        };
        let ocr = convert_analyze_result(result).unwrap();
        let word = ocr.words().next().unwrap();
        assert_eq!(word.bounds.space, CoordinateSpace::Normalized);
        assert!((word.bounds.x - 0.1).abs() < 1e-9);
        assert!((word.bounds.y - 0.1).abs() < 1e-9);
        // Unit-square page dims force painter to use real raster size
        assert_eq!(ocr.pixel_dims(1), None);
    }
}
