//! Entity matcher
//!
//! Reconciles the two independent views of a document: the PHI detector's
//! character-offset annotations and OCR's word-level geometry. For every
//! entity it locates the OCR words the entity covers and yields one mask
//! rectangle per page touched.
//!
//! Matching escalates through three stages. The exact-offset stage trusts
//! the detector's offsets but validates the covered text against the
//! entity's text, so coincidental offset alignment never masks unrelated
//! content. The fuzzy-offset stage re-anchors the entity near its claimed
//! offset when the offsets have drifted. The aggressive stage falls back to
//! a literal search across the whole text. An entity that survives none of
//! the stages is reported unmatched; the document is still produced.

use crate::domain::{BoundingBox, CoordinateSpace, MaskRegion, OcrResult, OcrWord, PhiEntity, Result};
use crate::matching::distance::{levenshtein_bounded, similarity_from_distance};
use crate::matching::offset_index::WordOffset;
use std::collections::BTreeMap;

/// Tunables for entity-to-geometry resolution
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Entities below this confidence are dropped before matching
    pub confidence_threshold: f64,
    /// Padding added on all four sides of each produced box, in pixels
    pub padding_px: f64,
    /// Max edit distance accepted when validating or re-anchoring a span
    pub fuzzy_entity_threshold: usize,
    /// Guards the fuzzy fallback against coincidental alignment
    pub min_similarity_ratio: f64,
    /// Union same-page words into one region; never unions across pages
    pub merge_adjacent: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0,
            padding_px: 5.0,
            fuzzy_entity_threshold: 2,
            min_similarity_ratio: 0.6,
            merge_adjacent: true,
        }
    }
}

/// Which stage located the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    ExactOffset,
    FuzzyOffset,
    Aggressive,
}

/// Terminal state of one entity
///
/// `Filtered` is terminal and not reported as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    Filtered,
    Matched(MatchStage),
    Unmatched,
}

/// Everything the matcher produced for one document
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Mask regions ordered by (page, y, x)
    pub regions: Vec<MaskRegion>,
    /// One outcome per input entity, in input order
    pub outcomes: Vec<EntityOutcome>,
    pub matched: usize,
    pub unmatched: usize,
    pub filtered: usize,
    /// Human-readable notes for unmatched entities
    pub warnings: Vec<String>,
}

/// Maps PHI entities to OCR word bounding boxes
pub struct EntityMatcher {
    config: MatcherConfig,
}

/// 1:1 case fold that preserves character offsets (multi-char expansions
/// keep only their first character).
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn fold_str(s: &str) -> Vec<char> {
    s.chars().map(fold).collect()
}

impl EntityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Resolve every entity against the offset index and emit mask regions
    ///
    /// Entities are processed in input order. The produced regions are
    /// deduplicated (same page and rectangle within 1 px) and ordered by
    /// (page, y, x). Matching is deterministic: the same inputs always
    /// yield the same report.
    pub fn match_entities(
        &self,
        ocr: &OcrResult,
        index: &[WordOffset],
        entities: &[PhiEntity],
    ) -> Result<MatchReport> {
        let folded_text: Vec<char> = ocr.full_text.chars().map(fold).collect();
        let flat_words: Vec<(u32, &OcrWord)> = ocr
            .pages
            .iter()
            .flat_map(|p| p.words.iter().map(move |w| (p.page_number, w)))
            .collect();

        let mut report = MatchReport::default();

        for entity in entities {
            if entity.confidence < self.config.confidence_threshold {
                tracing::debug!(
                    entity = %entity.text,
                    confidence = entity.confidence,
                    threshold = self.config.confidence_threshold,
                    "skipping low-confidence entity"
                );
                report.outcomes.push(EntityOutcome::Filtered);
                report.filtered += 1;
                continue;
            }

            match self.locate(entity, &folded_text, index, &flat_words) {
                Some((stage, covered)) => {
                    self.emit_regions(ocr, &flat_words, &covered, entity, &mut report.regions)?;
                    report.outcomes.push(EntityOutcome::Matched(stage));
                    report.matched += 1;
                }
                None => {
                    let warning = format!(
                        "could not match entity '{}' (offset={}, length={}) to any OCR words",
                        entity.text, entity.offset, entity.length
                    );
                    tracing::warn!(
                        entity = %entity.text,
                        offset = entity.offset,
                        length = entity.length,
                        "entity unmatched; it may sit in an image or OCR quality is too poor"
                    );
                    report.warnings.push(warning);
                    report.outcomes.push(EntityOutcome::Unmatched);
                    report.unmatched += 1;
                }
            }
        }

        report.regions = dedup_regions(report.regions);
        report.regions.sort_by(|a, b| {
            (a.page, a.bounds.y, a.bounds.x)
                .partial_cmp(&(b.page, b.bounds.y, b.bounds.x))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(report)
    }

    /// Run the three-stage location pipeline for one entity
    fn locate<'i>(
        &self,
        entity: &PhiEntity,
        folded_text: &[char],
        index: &'i [WordOffset],
        flat_words: &[(u32, &OcrWord)],
    ) -> Option<(MatchStage, Vec<&'i WordOffset>)> {
        let entity_chars = fold_str(&entity.text);
        if entity_chars.is_empty() {
            return None;
        }

        // Stage 1: trust the detector's offsets, then validate the text
        let overlapping = overlap_span(index, entity.offset, entity.end());
        if !overlapping.is_empty() && self.validates(&overlapping, flat_words, &entity_chars) {
            return Some((MatchStage::ExactOffset, overlapping));
        }

        // Stage 2: re-anchor near the claimed offset
        if let Some((start, end)) = self.fuzzy_offset_search(entity, &entity_chars, folded_text) {
            let covered = overlap_span(index, start, end);
            if !covered.is_empty() {
                return Some((MatchStage::FuzzyOffset, covered));
            }
        }

        // Stage 3: literal occurrence anywhere, nearest to the claimed offset
        if let Some(start) = nearest_occurrence(folded_text, &entity_chars, entity.offset) {
            let covered = overlap_span(index, start, start + entity_chars.len());
            if !covered.is_empty() {
                return Some((MatchStage::Aggressive, covered));
            }
        }

        None
    }

    /// Validate that the covered words actually read like the entity
    ///
    /// Rejects offset matches whose text differs from the entity's by more
    /// than the fuzzy threshold, which happens when the detector's offsets
    /// coincidentally land on unrelated words.
    fn validates(
        &self,
        covered: &[&WordOffset],
        flat_words: &[(u32, &OcrWord)],
        entity_chars: &[char],
    ) -> bool {
        let joined = covered
            .iter()
            .map(|w| flat_words[w.word_index].1.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        levenshtein_bounded(
            &fold_str(&joined),
            entity_chars,
            self.config.fuzzy_entity_threshold,
        )
        .is_some()
    }

    /// Slide a window of the entity's own length around the claimed offset
    /// and pick the position minimizing edit distance, tie-broken toward the
    /// smaller offset delta.
    fn fuzzy_offset_search(
        &self,
        entity: &PhiEntity,
        entity_chars: &[char],
        folded_text: &[char],
    ) -> Option<(usize, usize)> {
        let elen = entity_chars.len();
        let n = folded_text.len();
        if elen == 0 || elen > n {
            return None;
        }

        let lo = entity.offset.saturating_sub(entity.length);
        let hi = (entity.offset + entity.length).min(n - elen);
        if lo > hi {
            return None;
        }

        let mut best: Option<(usize, usize, usize)> = None; // (distance, delta, position)
        for p in lo..=hi {
            let candidate = &folded_text[p..p + elen];
            if let Some(distance) =
                levenshtein_bounded(entity_chars, candidate, self.config.fuzzy_entity_threshold)
            {
                let delta = p.abs_diff(entity.offset);
                let better = match best {
                    None => true,
                    Some((bd, bdelta, _)) => distance < bd || (distance == bd && delta < bdelta),
                };
                if better {
                    best = Some((distance, delta, p));
                }
            }
        }

        let (distance, _, position) = best?;
        let similarity = similarity_from_distance(distance, elen, elen);
        if similarity < self.config.min_similarity_ratio {
            return None;
        }
        Some((position, position + elen))
    }

    /// Emit padded mask regions for the covered words, one per page touched
    /// (or one per word when adjacent merging is disabled).
    fn emit_regions(
        &self,
        ocr: &OcrResult,
        flat_words: &[(u32, &OcrWord)],
        covered: &[&WordOffset],
        entity: &PhiEntity,
        regions: &mut Vec<MaskRegion>,
    ) -> Result<()> {
        let mut by_page: BTreeMap<u32, Vec<BoundingBox>> = BTreeMap::new();
        for word_offset in covered {
            let (_, word) = flat_words[word_offset.word_index];
            word.bounds.validate()?;
            by_page
                .entry(word_offset.page)
                .or_default()
                .push(word.bounds);
        }

        for (page, boxes) in by_page {
            let page_dims = ocr.pixel_dims(page);
            if self.config.merge_adjacent {
                let merged = BoundingBox::union(&boxes)?;
                regions.push(self.region_from(merged, page, entity, page_dims));
            } else {
                for bounds in boxes {
                    regions.push(self.region_from(bounds, page, entity, page_dims));
                }
            }
        }

        Ok(())
    }

    fn region_from(
        &self,
        bounds: BoundingBox,
        page: u32,
        entity: &PhiEntity,
        page_dims: Option<(f64, f64)>,
    ) -> MaskRegion {
        // Pixel-space boxes are padded here; normalized boxes are padded by
        // the painter once real pixel dimensions are known.
        let padded = match bounds.space {
            CoordinateSpace::Pixel => bounds.inflate(self.config.padding_px, page_dims),
            CoordinateSpace::Normalized => bounds,
        };
        MaskRegion {
            page,
            bounds: padded,
            entity_category: entity.category.clone(),
            confidence: entity.confidence,
        }
    }
}

/// All resolved index entries overlapping the half-open char range
fn overlap_span<'i>(index: &'i [WordOffset], start: usize, end: usize) -> Vec<&'i WordOffset> {
    index
        .iter()
        .filter(|w| w.overlaps_range(start, end))
        .collect()
}

/// Position of the literal occurrence of `needle` nearest to `anchor`
fn nearest_occurrence(haystack: &[char], needle: &[char], anchor: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let mut best: Option<(usize, usize)> = None; // (delta, position)
    for p in 0..=haystack.len() - needle.len() {
        if &haystack[p..p + needle.len()] == needle {
            let delta = p.abs_diff(anchor);
            if best.map_or(true, |(bd, _)| delta < bd) {
                best = Some((delta, p));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Drop regions identical (within 1 px, or 0.001 normalized) to an earlier one
fn dedup_regions(regions: Vec<MaskRegion>) -> Vec<MaskRegion> {
    let mut kept: Vec<MaskRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        let tolerance = match region.bounds.space {
            CoordinateSpace::Pixel => 1.0,
            CoordinateSpace::Normalized => 1e-3,
        };
        if !kept
            .iter()
            .any(|k| k.page == region.page && k.bounds.approx_eq(&region.bounds, tolerance))
        {
            kept.push(region);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OcrPage, OcrWord};
    use crate::matching::offset_index::build_offset_index;

    fn word(text: &str, x: f64, y: f64, w: f64) -> OcrWord {
        OcrWord::new(text, 0.99, BoundingBox::pixel(1, x, y, w, 20.0))
    }

    fn single_page(words: Vec<OcrWord>, full_text: &str) -> OcrResult {
        OcrResult {
            pages: vec![OcrPage {
                page_number: 1,
                width: 1000.0,
                height: 1000.0,
                words,
            }],
            full_text: full_text.to_string(),
        }
    }

    fn run(
        ocr: &OcrResult,
        entities: &[PhiEntity],
        config: MatcherConfig,
    ) -> MatchReport {
        let index = build_offset_index(ocr, 2);
        EntityMatcher::new(config)
            .match_entities(ocr, &index, entities)
            .unwrap()
    }

    #[test]
    fn test_exact_offset_match() {
        let ocr = single_page(vec![word("John", 100.0, 200.0, 50.0)], "John");
        let entities = [PhiEntity::new("John", "Person", 0, 4, 0.95)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.matched, 1);
        assert_eq!(report.outcomes, vec![EntityOutcome::Matched(MatchStage::ExactOffset)]);
        let bounds = report.regions[0].bounds;
        assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (95.0, 195.0, 60.0, 30.0));
    }

    #[test]
    fn test_coincidental_offset_rejected() {
        // Offsets point at completely different text; no literal occurrence
        // of the entity exists, so the entity must end up unmatched rather
        // than masking unrelated words.
        let ocr = single_page(vec![word("Hello", 100.0, 200.0, 60.0)], "Hello");
        let entities = [PhiEntity::new("Goodbye", "Person", 0, 7, 0.9)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.unmatched, 1);
        assert!(report.regions.is_empty());
        assert_eq!(report.outcomes, vec![EntityOutcome::Unmatched]);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_confidence_filter_is_silent() {
        let ocr = single_page(vec![word("John", 100.0, 200.0, 50.0)], "John");
        let entities = [PhiEntity::new("John", "Person", 0, 4, 0.5)];
        let config = MatcherConfig {
            confidence_threshold: 0.8,
            ..MatcherConfig::default()
        };
        let report = run(&ocr, &entities, config);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.unmatched, 0);
        assert!(report.regions.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_fuzzy_offset_reanchors_drifted_entity() {
        // Detector offsets shifted by three characters
        let ocr = single_page(
            vec![word("Patient:", 20.0, 200.0, 90.0), word("Samuel", 120.0, 200.0, 70.0)],
            "Patient: Samuel",
        );
        let entities = [PhiEntity::new("Samuel", "Person", 6, 6, 0.9)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.matched, 1);
        // Offsets [6, 12) overlap both words, and the joined text fails
        // validation, so the matcher re-anchors onto "Samuel" alone.
        assert_eq!(report.outcomes, vec![EntityOutcome::Matched(MatchStage::FuzzyOffset)]);
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.regions[0].bounds.x, 115.0);
    }

    #[test]
    fn test_aggressive_literal_search() {
        // Offsets point nowhere near the real occurrence
        let ocr = single_page(
            vec![word("MRN:", 100.0, 200.0, 48.0), word("12345678", 160.0, 200.0, 96.0)],
            "MRN: 12345678",
        );
        let entities = [PhiEntity::new("12345678", "MedicalRecordNumber", 0, 3, 0.9)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.matched, 1);
        assert_eq!(report.outcomes, vec![EntityOutcome::Matched(MatchStage::Aggressive)]);
        assert_eq!(report.regions[0].bounds.x, 155.0);
    }

    #[test]
    fn test_two_word_merge() {
        let ocr = single_page(
            vec![word("John", 100.0, 200.0, 50.0), word("Smith", 155.0, 200.0, 60.0)],
            "John Smith",
        );
        let entities = [PhiEntity::new("John Smith", "Person", 0, 10, 0.95)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.regions.len(), 1);
        let bounds = report.regions[0].bounds;
        assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (95.0, 195.0, 125.0, 30.0));
    }

    #[test]
    fn test_merge_adjacent_disabled_emits_per_word() {
        let ocr = single_page(
            vec![word("John", 100.0, 200.0, 50.0), word("Smith", 155.0, 200.0, 60.0)],
            "John Smith",
        );
        let entities = [PhiEntity::new("John Smith", "Person", 0, 10, 0.95)];
        let config = MatcherConfig {
            merge_adjacent: false,
            ..MatcherConfig::default()
        };
        let report = run(&ocr, &entities, config);
        assert_eq!(report.regions.len(), 2);
    }

    #[test]
    fn test_page_spanning_entity_yields_region_per_page() {
        let ocr = OcrResult {
            pages: vec![
                OcrPage {
                    page_number: 1,
                    width: 1000.0,
                    height: 1000.0,
                    words: vec![word("123", 100.0, 900.0, 40.0), word("Main", 150.0, 900.0, 50.0)],
                },
                OcrPage {
                    page_number: 2,
                    width: 1000.0,
                    height: 1000.0,
                    words: vec![OcrWord::new(
                        "Street",
                        0.99,
                        BoundingBox::pixel(2, 100.0, 50.0, 70.0, 20.0),
                    )],
                },
            ],
            full_text: "123 Main\nStreet".to_string(),
        };
        let entities = [PhiEntity::new("123 Main\nStreet", "Address", 0, 15, 0.9)];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.matched, 1);
        assert_eq!(report.regions.len(), 2);
        assert_eq!(report.regions[0].page, 1);
        assert_eq!(report.regions[1].page, 2);
        for region in &report.regions {
            assert_eq!(region.entity_category, "Address");
            assert_eq!(region.confidence, 0.9);
        }
    }

    #[test]
    fn test_duplicate_regions_deduplicated() {
        let ocr = single_page(vec![word("John", 100.0, 200.0, 50.0)], "John");
        let entities = [
            PhiEntity::new("John", "Person", 0, 4, 0.95),
            PhiEntity::new("John", "Name", 0, 4, 0.90),
        ];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.matched, 2);
        assert_eq!(report.regions.len(), 1);
    }

    #[test]
    fn test_regions_ordered_by_page_then_position() {
        let ocr = single_page(
            vec![
                word("Bottom", 50.0, 800.0, 70.0),
                word("Top", 400.0, 100.0, 40.0),
            ],
            "Bottom Top",
        );
        let entities = [
            PhiEntity::new("Bottom", "Person", 0, 6, 0.9),
            PhiEntity::new("Top", "Person", 7, 3, 0.9),
        ];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.regions.len(), 2);
        assert!(report.regions[0].bounds.y < report.regions[1].bounds.y);
    }

    #[test]
    fn test_matcher_is_idempotent() {
        let ocr = single_page(
            vec![word("John", 100.0, 200.0, 50.0), word("Smith", 155.0, 200.0, 60.0)],
            "John Smith",
        );
        let entities = [PhiEntity::new("John Smith", "Person", 0, 10, 0.95)];
        let index = build_offset_index(&ocr, 2);
        let matcher = EntityMatcher::new(MatcherConfig::default());
        let first = matcher.match_entities(&ocr, &index, &entities).unwrap();
        let second = matcher.match_entities(&ocr, &index, &entities).unwrap();
        assert_eq!(first.regions.len(), second.regions.len());
        for (a, b) in first.regions.iter().zip(second.regions.iter()) {
            assert_eq!(a.page, b.page);
            assert!(a.bounds.approx_eq(&b.bounds, 0.0));
        }
    }

    #[test]
    fn test_word_box_union_covered_when_padding_zero() {
        let ocr = single_page(
            vec![word("John", 100.0, 200.0, 50.0), word("Smith", 155.0, 200.0, 60.0)],
            "John Smith",
        );
        let entities = [PhiEntity::new("John Smith", "Person", 0, 10, 0.95)];
        let config = MatcherConfig {
            padding_px: 0.0,
            ..MatcherConfig::default()
        };
        let report = run(&ocr, &entities, config);
        let region = &report.regions[0].bounds;
        for w in ocr.words() {
            assert!(region.x <= w.bounds.x);
            assert!(region.y <= w.bounds.y);
            assert!(region.right() >= w.bounds.right());
            assert!(region.bottom() >= w.bounds.bottom());
        }
    }

    #[test]
    fn test_empty_ocr_leaves_all_entities_unmatched() {
        let ocr = single_page(vec![], "");
        let entities = [
            PhiEntity::new("John", "Person", 0, 4, 0.95),
            PhiEntity::new("Smith", "Person", 5, 5, 0.95),
        ];
        let report = run(&ocr, &entities, MatcherConfig::default());
        assert_eq!(report.unmatched, 2);
        assert!(report.regions.is_empty());
    }
}
