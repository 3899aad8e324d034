//! Offline pattern-based PHI provider
//!
//! Detects common PHI categories with regular expressions plus a simple
//! capitalized-name heuristic. Good enough for air-gapped runs and tests;
//! nowhere near the recall of a healthcare NER service.

use crate::domain::{MaskingLevel, PhiEntity, Result};
use crate::providers::{should_include_category, PhiProvider};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

struct PhiPattern {
    category: &'static str,
    regex: Regex,
    confidence: f64,
}

static PATTERNS: Lazy<Vec<PhiPattern>> = Lazy::new(|| {
    let pattern = |category, re: &str, confidence| PhiPattern {
        category,
        regex: Regex::new(re).expect("invalid built-in PHI pattern"),
        confidence,
    };
    vec![
        pattern("Date", r"\b\d{1,2}/\d{1,2}/\d{4}\b", 0.95),
        pattern("Date", r"\b\d{1,2}-\d{1,2}-\d{4}\b", 0.95),
        pattern("PhoneNumber", r"\(\d{3}\)\s*\d{3}-\d{4}", 0.95),
        pattern("PhoneNumber", r"\b\d{3}-\d{3}-\d{4}\b", 0.95),
        pattern(
            "Email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            0.95,
        ),
        pattern("SSN", r"\b\d{3}-\d{2}-\d{4}\b", 0.95),
        pattern("MedicalRecordNumber", r"\bMRN:\s*\d+\b", 0.95),
        pattern("MedicalRecordNumber", r"\bMedical Record\s*#?:?\s*\d+\b", 0.95),
        pattern("InsuranceId", r"\bMember ID:\s*[A-Z0-9]+\b", 0.95),
        pattern(
            "Address",
            r"\b\d+\s+[A-Z][a-z]+\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd)[,\s]+[A-Z][a-z]+[,\s]+[A-Z]{2}\s+\d{5}\b",
            0.95,
        ),
    ]
});

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\b").expect("invalid name pattern"));

/// Section headers and brands the name heuristic must not flag
const SKIP_PHRASES: [&str; 8] = [
    "Chief Complaint",
    "History Of",
    "Present Illness",
    "Past Medical",
    "Social History",
    "Blue Cross",
    "Blue Shield",
    "New England",
];

const PROVIDER_TITLES: [&str; 4] = ["Dr.", "Dr ", "Doctor", "Physician"];

/// Regex-based PHI detector requiring no network access
pub struct PatternPhiProvider {
    custom_categories: HashSet<String>,
}

impl PatternPhiProvider {
    pub fn new() -> Self {
        Self {
            custom_categories: HashSet::new(),
        }
    }

    /// Categories masked in CUSTOM mode
    pub fn with_custom_categories(mut self, categories: HashSet<String>) -> Self {
        self.custom_categories = categories;
        self
    }

    fn detect_patterns(&self, text: &str, offsets: &ByteToChar) -> Vec<PhiEntity> {
        let mut entities = Vec::new();
        for pattern in PATTERNS.iter() {
            for found in pattern.regex.find_iter(text) {
                entities.push(PhiEntity::new(
                    found.as_str(),
                    pattern.category,
                    offsets.char_index(found.start()),
                    found.as_str().chars().count(),
                    pattern.confidence,
                ));
            }
        }
        entities
    }

    /// Consecutive capitalized words are treated as a person name unless
    /// they sit in the skip list; a title in the preceding few characters
    /// reclassifies them as a healthcare professional.
    fn detect_names(&self, text: &str, offsets: &ByteToChar) -> Vec<PhiEntity> {
        let mut names = Vec::new();
        for found in NAME_PATTERN.find_iter(text) {
            let matched = found.as_str();
            if SKIP_PHRASES.iter().any(|skip| matched.contains(skip)) {
                continue;
            }

            let preceding: String = text[..found.start()]
                .chars()
                .rev()
                .take(12)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            let is_provider = PROVIDER_TITLES.iter().any(|t| preceding.contains(t));
            let category = if is_provider {
                "HealthcareProfessional"
            } else {
                "Person"
            };

            let mut entity = PhiEntity::new(
                matched,
                category,
                offsets.char_index(found.start()),
                matched.chars().count(),
                0.90,
            );
            entity.subcategory = Some("PersonName".to_string());
            names.push(entity);
        }
        names
    }
}

impl Default for PatternPhiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhiProvider for PatternPhiProvider {
    async fn detect(&self, full_text: &str, level: MaskingLevel) -> Result<Vec<PhiEntity>> {
        let offsets = ByteToChar::new(full_text);

        let mut entities = self.detect_patterns(full_text, &offsets);
        entities.extend(self.detect_names(full_text, &offsets));
        entities.retain(|e| should_include_category(&e.category, level, &self.custom_categories));
        entities.sort_by_key(|e| e.offset);

        tracing::debug!(count = entities.len(), "pattern PHI detection completed");
        Ok(entities)
    }
}

/// Translates the byte offsets regex reports into the character offsets the
/// rest of the core works in.
struct ByteToChar {
    byte_starts: Vec<usize>,
}

impl ByteToChar {
    fn new(text: &str) -> Self {
        Self {
            byte_starts: text.char_indices().map(|(i, _)| i).collect(),
        }
    }

    fn char_index(&self, byte_index: usize) -> usize {
        self.byte_starts.partition_point(|&b| b < byte_index)
    }
}
