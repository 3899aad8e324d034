//! Domain models and types for Redactify
//!
//! The domain layer provides:
//! - **Geometry primitives** ([`BoundingBox`], [`CoordinateSpace`]) with
//!   validation, overlap, union and outward pixel rounding
//! - **The normalized provider model** ([`OcrResult`], [`OcrPage`],
//!   [`OcrWord`], [`PhiEntity`]) that every OCR / PHI backend must emit
//! - **Output types** ([`MaskRegion`], [`DeidentificationResult`])
//! - **Error types** ([`RedactifyError`], [`OcrProviderError`],
//!   [`PhiProviderError`]) and the [`Result`] alias
//!
//! Everything in this module is request-scoped and immutable after
//! construction; there is no shared mutable state in the core.

pub mod errors;
pub mod geometry;
pub mod model;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{OcrProviderError, PhiProviderError, RedactifyError};
pub use geometry::{BoundingBox, CoordinateSpace, PixelRect};
pub use model::{
    DeidentificationResult, MaskRegion, MaskingLevel, OcrPage, OcrResult, OcrWord, PhiEntity,
    ProcessingStatus,
};
pub use result::Result;
