//! Entity-to-geometry resolution
//!
//! The hard problem of the service: reconciling a PHI detector's
//! character-offset annotations with OCR's word-level geometry. Composed
//! leaves-first:
//!
//! - [`distance`] - bounded edit-distance primitives
//! - [`offset_index`] - aligns every OCR word to its `[start, end)` range in
//!   the concatenated document text
//! - [`matcher`] - resolves each entity to word boxes and emits mask regions

pub mod distance;
pub mod matcher;
pub mod offset_index;

pub use matcher::{EntityMatcher, EntityOutcome, MatchReport, MatchStage, MatcherConfig};
pub use offset_index::{build_offset_index, WordOffset};
