//! Normalized OCR / PHI data model
//!
//! These are the shapes every provider adapter must emit, and the shapes the
//! matcher and painter consume. All of them are request-scoped and immutable
//! after construction; nothing here outlives a single document.
//!
//! Character offsets (`PhiEntity::offset`, `PhiEntity::length`) count Unicode
//! scalar values in [`OcrResult::full_text`], not bytes.

use crate::domain::geometry::BoundingBox;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A single recognized word with its page geometry
///
/// Words are atomic: the core never splits one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// Recognition confidence in `[0, 1]`
    pub confidence: f64,
    pub bounds: BoundingBox,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f64, bounds: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bounds,
        }
    }
}

/// One page of OCR output
///
/// `words` is in reading order as supplied by the provider; that order is
/// authoritative and preserved end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPage {
    /// 1-based page number
    pub page_number: u32,
    /// Page width in pixels (or in the provider's unit for normalized boxes)
    pub width: f64,
    /// Page height in pixels
    pub height: f64,
    pub words: Vec<OcrWord>,
}

/// Complete OCR output for a document
///
/// `full_text` is the single concatenated string over which PHI character
/// offsets are defined. Whitespace between words is provider-dependent
/// (newlines, runs of spaces, punctuation glue); the offset index tolerates
/// that drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub pages: Vec<OcrPage>,
    pub full_text: String,
}

impl OcrResult {
    /// Total word count across all pages
    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }

    /// Iterate every word in page order, then reading order within the page
    pub fn words(&self) -> impl Iterator<Item = &OcrWord> {
        self.pages.iter().flat_map(|p| p.words.iter())
    }

    /// Look up a page by its 1-based number
    pub fn page(&self, page_number: u32) -> Option<&OcrPage> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Validate page and word geometry across the whole result
    ///
    /// A page or word with negative or non-finite dimensions is fatal for
    /// the request.
    pub fn validate(&self) -> crate::domain::Result<()> {
        for page in &self.pages {
            if !page.width.is_finite()
                || !page.height.is_finite()
                || page.width < 0.0
                || page.height < 0.0
            {
                return Err(crate::domain::RedactifyError::InvalidGeometry(format!(
                    "page {} has invalid dimensions {}x{}",
                    page.page_number, page.width, page.height
                )));
            }
            for word in &page.words {
                word.bounds.validate()?;
            }
        }
        Ok(())
    }

    /// Pixel dimensions for a page, when the provider reported real ones.
    ///
    /// Providers emitting normalized geometry often report unit dimensions;
    /// those are useless for scaling, so anything not clearly larger than a
    /// unit square is treated as absent and the image loader's dimensions
    /// win instead.
    pub fn pixel_dims(&self, page_number: u32) -> Option<(f64, f64)> {
        self.page(page_number)
            .filter(|p| p.width > 1.0 && p.height > 1.0)
            .map(|p| (p.width, p.height))
    }
}

/// A detected PHI span in `full_text`
///
/// When provider drift makes `full_text[offset..offset+length]` differ from
/// `text`, `text` is authoritative for what the entity says and
/// `offset`/`length` for where it sits; the matcher reconciles the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhiEntity {
    pub text: String,
    /// Free-form provider category tag (`Person`, `Date`, `SSN`, ...);
    /// treated as opaque, never normalized
    pub category: String,
    pub subcategory: Option<String>,
    /// Character offset into `full_text`
    pub offset: usize,
    /// Character length, always positive
    pub length: usize,
    /// Detection confidence in `[0, 1]`
    pub confidence: f64,
}

impl PhiEntity {
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        offset: usize,
        length: usize,
        confidence: f64,
    ) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            subcategory: None,
            offset,
            length,
            confidence,
        }
    }

    /// End of the entity's character range (exclusive)
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// HIPAA compliance level driving category filtering in the PHI provider
///
/// The core accepts whatever entities it is given; filtering is the
/// provider's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskingLevel {
    /// Mask all 18 Safe Harbor identifier categories
    #[default]
    SafeHarbor,
    /// Preserve provider/organization names for research use
    LimitedDataset,
    /// Mask only a caller-supplied category set
    Custom,
}

impl fmt::Display for MaskingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskingLevel::SafeHarbor => write!(f, "safe_harbor"),
            MaskingLevel::LimitedDataset => write!(f, "limited_dataset"),
            MaskingLevel::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for MaskingLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "safe_harbor" => Ok(MaskingLevel::SafeHarbor),
            "limited_dataset" => Ok(MaskingLevel::LimitedDataset),
            "custom" => Ok(MaskingLevel::Custom),
            other => Err(format!(
                "unknown masking level '{other}' (expected safe_harbor, limited_dataset or custom)"
            )),
        }
    }
}

/// One rectangle to paint, with its originating category and confidence
///
/// Produced only by the matcher. Pixel-space regions arrive already padded;
/// normalized regions are padded by the painter after scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskRegion {
    /// 1-based page number
    pub page: u32,
    pub bounds: BoundingBox,
    pub entity_category: String,
    pub confidence: f64,
}

/// Terminal status of a de-identification request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Failure,
}

/// Outcome of processing one document
///
/// Unmatched entities do not flip the status to failure: if OCR succeeded
/// and matching produced regions, the document is still produced and the
/// shortfall is visible in `entities_unmatched` and `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeidentificationResult {
    pub status: ProcessingStatus,
    /// Masked document bytes, same format as the input; empty on failure
    #[serde(skip)]
    pub masked_bytes: Vec<u8>,
    pub pages_processed: usize,
    pub entities_detected: usize,
    pub regions_produced: usize,
    pub entities_unmatched: usize,
    /// Entities dropped by the confidence threshold; not reported as failures
    pub entities_filtered: usize,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Ordered error and warning messages accumulated during the run
    pub errors: Vec<String>,
    pub regions: Vec<MaskRegion>,
    /// Region counts keyed by entity category
    pub regions_by_category: HashMap<String, usize>,
}

impl DeidentificationResult {
    /// Build a success result, deriving the per-category statistics
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        masked_bytes: Vec<u8>,
        pages_processed: usize,
        entities_detected: usize,
        entities_unmatched: usize,
        entities_filtered: usize,
        regions: Vec<MaskRegion>,
        processing_time_ms: u64,
        errors: Vec<String>,
    ) -> Self {
        let mut regions_by_category = HashMap::new();
        for region in &regions {
            *regions_by_category
                .entry(region.entity_category.clone())
                .or_insert(0) += 1;
        }

        Self {
            status: ProcessingStatus::Success,
            masked_bytes,
            pages_processed,
            entities_detected,
            regions_produced: regions.len(),
            entities_unmatched,
            entities_filtered,
            processing_time_ms,
            timestamp: Utc::now(),
            errors,
            regions,
            regions_by_category,
        }
    }

    /// Build a failure result with empty masked bytes
    pub fn failure(processing_time_ms: u64, errors: Vec<String>) -> Self {
        Self {
            status: ProcessingStatus::Failure,
            masked_bytes: Vec::new(),
            pages_processed: 0,
            entities_detected: 0,
            regions_produced: 0,
            entities_unmatched: 0,
            entities_filtered: 0,
            processing_time_ms,
            timestamp: Utc::now(),
            errors,
            regions: Vec::new(),
            regions_by_category: HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_level_round_trip() {
        for level in [
            MaskingLevel::SafeHarbor,
            MaskingLevel::LimitedDataset,
            MaskingLevel::Custom,
        ] {
            let parsed: MaskingLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn test_masking_level_accepts_dashes() {
        let parsed: MaskingLevel = "limited-dataset".parse().unwrap();
        assert_eq!(parsed, MaskingLevel::LimitedDataset);
        assert!("everything".parse::<MaskingLevel>().is_err());
    }

    #[test]
    fn test_entity_end() {
        let entity = PhiEntity::new("John", "Person", 10, 4, 0.95);
        assert_eq!(entity.end(), 14);
    }

    #[test]
    fn test_validate_rejects_bad_word_geometry() {
        let result = OcrResult {
            pages: vec![OcrPage {
                page_number: 1,
                width: 1000.0,
                height: 1000.0,
                words: vec![OcrWord::new(
                    "bad",
                    0.9,
                    BoundingBox::pixel(1, 10.0, 10.0, -5.0, 20.0),
                )],
            }],
            full_text: "bad".to_string(),
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_pixel_dims_ignores_unit_pages() {
        let result = OcrResult {
            pages: vec![
                OcrPage {
                    page_number: 1,
                    width: 1.0,
                    height: 1.0,
                    words: vec![],
                },
                OcrPage {
                    page_number: 2,
                    width: 2550.0,
                    height: 3300.0,
                    words: vec![],
                },
            ],
            full_text: String::new(),
        };
        assert_eq!(result.pixel_dims(1), None);
        assert_eq!(result.pixel_dims(2), Some((2550.0, 3300.0)));
    }

    #[test]
    fn test_result_category_stats() {
        let regions = vec![
            MaskRegion {
                page: 1,
                bounds: BoundingBox::pixel(1, 0.0, 0.0, 10.0, 10.0),
                entity_category: "Person".to_string(),
                confidence: 0.9,
            },
            MaskRegion {
                page: 1,
                bounds: BoundingBox::pixel(1, 20.0, 0.0, 10.0, 10.0),
                entity_category: "Person".to_string(),
                confidence: 0.8,
            },
        ];
        let result =
            DeidentificationResult::success(vec![1, 2, 3], 1, 2, 0, 0, regions, 12, vec![]);
        assert!(result.is_success());
        assert_eq!(result.regions_produced, 2);
        assert_eq!(result.regions_by_category.get("Person"), Some(&2));
    }
}
