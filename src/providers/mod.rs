//! Provider collaborator interfaces
//!
//! OCR and PHI detection are external collaborators behind narrow,
//! asynchronous interfaces; the core is provider-agnostic and providers are
//! swapped at construction (composition, never inheritance). Each
//! implementation owns its own client lifetime and surfaces failures through
//! the core's error kinds only.

pub mod azure;
pub mod mock;
pub mod pattern;

use crate::document::DocumentFormat;
use crate::domain::{MaskingLevel, OcrResult, PhiEntity, Result};
use async_trait::async_trait;
use std::collections::HashSet;

pub use azure::ocr::AzureOcrProvider;
pub use azure::phi::AzurePhiProvider;
pub use mock::MockOcrProvider;
pub use pattern::PatternPhiProvider;

/// OCR collaborator: extracts text and word-level geometry from a document
///
/// Implementations must emit reading-order words per page and a `full_text`
/// whose substring occurrences of each word align with reading order.
/// Providers returning polygons convert them to the axis-aligned box
/// enclosing the polygon.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn analyze(
        &self,
        document_bytes: &[u8],
        format: DocumentFormat,
        language: Option<&str>,
    ) -> Result<OcrResult>;
}

/// PHI detection collaborator: finds PHI spans in the concatenated text
///
/// Returned offsets are character offsets into the supplied text, even when
/// the backend has a document size limit and is invoked on chunks under the
/// hood. Filtering by [`MaskingLevel`] is the provider's responsibility.
#[async_trait]
pub trait PhiProvider: Send + Sync {
    async fn detect(&self, full_text: &str, level: MaskingLevel) -> Result<Vec<PhiEntity>>;
}

/// Categories suppressed in LIMITED_DATASET mode: provider and organization
/// names stay readable for research use under a data use agreement.
const PROVIDER_CATEGORIES: [&str; 6] = [
    "PersonType",
    "Organization",
    "HealthcareProfessional",
    "Doctor",
    "Physician",
    "Hospital",
];

/// Shared masking-level filter applied by every PHI provider
///
/// SAFE_HARBOR masks everything; LIMITED_DATASET suppresses
/// provider/organization categories; CUSTOM masks only the caller-supplied
/// set, falling back to SAFE_HARBOR behavior when that set is empty.
pub fn should_include_category(
    category: &str,
    level: MaskingLevel,
    custom_categories: &HashSet<String>,
) -> bool {
    match level {
        MaskingLevel::SafeHarbor => true,
        MaskingLevel::LimitedDataset => !PROVIDER_CATEGORIES.contains(&category),
        MaskingLevel::Custom => {
            if custom_categories.is_empty() {
                tracing::warn!(
                    "custom masking level selected but no categories configured; \
                     defaulting to safe_harbor behavior"
                );
                return true;
            }
            custom_categories.contains(category)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_harbor_includes_everything() {
        let custom = HashSet::new();
        assert!(should_include_category("Person", MaskingLevel::SafeHarbor, &custom));
        assert!(should_include_category("Organization", MaskingLevel::SafeHarbor, &custom));
    }

    #[test]
    fn test_limited_dataset_keeps_provider_names() {
        let custom = HashSet::new();
        assert!(!should_include_category(
            "Organization",
            MaskingLevel::LimitedDataset,
            &custom
        ));
        assert!(!should_include_category(
            "HealthcareProfessional",
            MaskingLevel::LimitedDataset,
            &custom
        ));
        assert!(should_include_category("Person", MaskingLevel::LimitedDataset, &custom));
    }

    #[test]
    fn test_custom_uses_supplied_set() {
        let custom: HashSet<String> = ["SSN".to_string()].into_iter().collect();
        assert!(should_include_category("SSN", MaskingLevel::Custom, &custom));
        assert!(!should_include_category("Person", MaskingLevel::Custom, &custom));
    }

    #[test]
    fn test_custom_empty_set_falls_back_to_safe_harbor() {
        let custom = HashSet::new();
        assert!(should_include_category("Person", MaskingLevel::Custom, &custom));
    }
}
