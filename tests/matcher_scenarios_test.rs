//! End-to-end matching scenarios with literal geometry expectations
//!
//! Each scenario builds exact OCR and PHI structures, runs the offset index
//! builder plus the entity matcher, and checks the produced regions down to
//! the pixel.

use redactify::domain::{BoundingBox, OcrPage, OcrResult, OcrWord, PhiEntity};
use redactify::matching::{
    build_offset_index, EntityMatcher, EntityOutcome, MatchReport, MatcherConfig,
};

fn page(page_number: u32, words: Vec<OcrWord>) -> OcrPage {
    OcrPage {
        page_number,
        width: 1000.0,
        height: 1000.0,
        words,
    }
}

fn word(page: u32, text: &str, confidence: f64, x: f64, y: f64, w: f64, h: f64) -> OcrWord {
    OcrWord::new(text, confidence, BoundingBox::pixel(page, x, y, w, h))
}

fn run(ocr: &OcrResult, entities: &[PhiEntity], config: MatcherConfig) -> MatchReport {
    let index = build_offset_index(ocr, 2);
    EntityMatcher::new(config)
        .match_entities(ocr, &index, entities)
        .unwrap()
}

fn assert_box(bounds: &BoundingBox, x: f64, y: f64, w: f64, h: f64) {
    assert_eq!(bounds.x, x, "x mismatch");
    assert_eq!(bounds.y, y, "y mismatch");
    assert_eq!(bounds.width, w, "width mismatch");
    assert_eq!(bounds.height, h, "height mismatch");
}

/// Scenario A: single-word exact match with default padding
#[test]
fn single_word_exact_match() {
    let ocr = OcrResult {
        pages: vec![page(1, vec![word(1, "John", 0.99, 100.0, 200.0, 50.0, 20.0)])],
        full_text: "John".to_string(),
    };
    let entities = [PhiEntity::new("John", "Person", 0, 4, 0.95)];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(report.regions.len(), 1);
    let region = &report.regions[0];
    assert_eq!(region.page, 1);
    assert_eq!(region.entity_category, "Person");
    assert_eq!(region.confidence, 0.95);
    assert_box(&region.bounds, 95.0, 195.0, 60.0, 30.0);
}

/// Scenario B: two adjacent words merge into one padded region
#[test]
fn two_word_merge() {
    let ocr = OcrResult {
        pages: vec![page(
            1,
            vec![
                word(1, "John", 0.99, 100.0, 200.0, 50.0, 20.0),
                word(1, "Smith", 0.99, 155.0, 200.0, 60.0, 20.0),
            ],
        )],
        full_text: "John Smith".to_string(),
    };
    let entities = [PhiEntity::new("John Smith", "Person", 0, 10, 0.95)];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(report.regions.len(), 1);
    // Union (100, 200, 115, 20), then padded by 5 on every side
    assert_box(&report.regions[0].bounds, 95.0, 195.0, 125.0, 30.0);
}

/// Scenario C: OCR misread one glyph; fuzzy matching recovers the word
#[test]
fn ocr_error_fuzzy_recovery() {
    let ocr = OcrResult {
        pages: vec![page(1, vec![word(1, "5amuel", 0.85, 100.0, 200.0, 70.0, 20.0)])],
        full_text: "5amuel".to_string(),
    };
    let entities = [PhiEntity::new("Samuel", "Person", 0, 6, 0.95)];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, 0);
    assert_eq!(report.regions.len(), 1);
    assert_box(&report.regions[0].bounds, 95.0, 195.0, 80.0, 30.0);
}

/// Scenario D: an entity spanning two pages yields exactly one region per
/// page, both carrying the entity's category and confidence
#[test]
fn page_spanning_entity() {
    let ocr = OcrResult {
        pages: vec![
            page(
                1,
                vec![
                    word(1, "123", 0.99, 100.0, 950.0, 40.0, 20.0),
                    word(1, "Main", 0.99, 150.0, 950.0, 50.0, 20.0),
                ],
            ),
            page(2, vec![word(2, "Street", 0.99, 100.0, 40.0, 70.0, 20.0)]),
        ],
        full_text: "123 Main\nStreet".to_string(),
    };
    let entities = [PhiEntity::new("123 Main\nStreet", "Address", 0, 15, 0.88)];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(report.matched, 1);
    assert_eq!(report.regions.len(), 2);
    assert_eq!(report.regions[0].page, 1);
    assert_eq!(report.regions[1].page, 2);
    for region in &report.regions {
        assert_eq!(region.entity_category, "Address");
        assert_eq!(region.confidence, 0.88);
    }
    // Never merged across pages even though they belong to one entity
    assert_ne!(report.regions[0].page, report.regions[1].page);
}

/// Scenario E: entity text that appears nowhere ends up unmatched; nothing
/// is painted and nothing aborts
#[test]
fn unmatched_entity() {
    let ocr = OcrResult {
        pages: vec![page(1, vec![word(1, "Hello", 0.99, 100.0, 200.0, 60.0, 20.0)])],
        full_text: "Hello".to_string(),
    };
    let entities = [PhiEntity::new("Goodbye", "Person", 0, 7, 0.9)];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert!(report.regions.is_empty());
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.filtered, 0);
    assert_eq!(report.outcomes, vec![EntityOutcome::Unmatched]);
}

/// Scenario F: entities below the confidence threshold are dropped silently
#[test]
fn confidence_filter() {
    let ocr = OcrResult {
        pages: vec![page(1, vec![word(1, "John", 0.99, 100.0, 200.0, 50.0, 20.0)])],
        full_text: "John".to_string(),
    };
    let entities = [PhiEntity::new("John", "Person", 0, 4, 0.50)];

    let config = MatcherConfig {
        confidence_threshold: 0.80,
        ..MatcherConfig::default()
    };
    let report = run(&ocr, &entities, config);

    assert!(report.regions.is_empty());
    assert_eq!(report.filtered, 1);
    assert_eq!(report.unmatched, 0);
    assert!(report.warnings.is_empty());
    assert_eq!(report.outcomes, vec![EntityOutcome::Filtered]);
}

/// Entity offsets at both extremes of the text resolve correctly
#[test]
fn boundary_offsets_resolve() {
    let ocr = OcrResult {
        pages: vec![page(
            1,
            vec![
                word(1, "John", 0.99, 100.0, 200.0, 50.0, 20.0),
                word(1, "Smith", 0.99, 155.0, 200.0, 60.0, 20.0),
                word(1, "X", 0.99, 400.0, 200.0, 12.0, 20.0),
            ],
        )],
        full_text: "John Smith X".to_string(),
    };
    let entities = [
        PhiEntity::new("John", "Person", 0, 4, 0.95),
        // Last character of the text
        PhiEntity::new("X", "Initial", 11, 1, 0.95),
    ];

    let report = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(report.matched, 2);
    assert_eq!(report.regions.len(), 2);
    let last = report
        .regions
        .iter()
        .find(|r| r.entity_category == "Initial")
        .unwrap();
    assert_box(&last.bounds, 395.0, 195.0, 22.0, 30.0);
}

/// Running the matcher twice over identical inputs yields identical regions
#[test]
fn matching_is_idempotent() {
    let ocr = OcrResult {
        pages: vec![page(
            1,
            vec![
                word(1, "Samuel", 0.99, 100.0, 200.0, 70.0, 20.0),
                word(1, "Grummons", 0.99, 180.0, 200.0, 95.0, 20.0),
            ],
        )],
        full_text: "Samuel Grummons".to_string(),
    };
    let entities = [PhiEntity::new("Samuel Grummons", "Person", 0, 15, 0.97)];

    let first = run(&ocr, &entities, MatcherConfig::default());
    let second = run(&ocr, &entities, MatcherConfig::default());

    assert_eq!(first.regions.len(), second.regions.len());
    for (a, b) in first.regions.iter().zip(second.regions.iter()) {
        assert_eq!(a.page, b.page);
        assert!(a.bounds.approx_eq(&b.bounds, 0.0));
        assert_eq!(a.entity_category, b.entity_category);
    }
}
