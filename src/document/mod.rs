//! Document I/O
//!
//! Multi-page raster load/save behind the [`DocumentCodec`] trait, plus the
//! mask painter. Codecs work with [`image::DynamicImage`] as the common
//! in-memory page representation and must round-trip DPI and color mode.

pub mod painter;
pub mod png;
pub mod tiff;

pub use painter::MaskPainter;
pub use png::PngCodec;
pub use tiff::TiffCodec;

use crate::domain::{RedactifyError, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Tiff,
    Png,
    /// Recognized but not yet loadable; kept so callers get a clean error
    Pdf,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Tiff => write!(f, "tiff"),
            DocumentFormat::Png => write!(f, "png"),
            DocumentFormat::Pdf => write!(f, "pdf"),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches('.') {
            "tiff" | "tif" => Ok(DocumentFormat::Tiff),
            "png" => Ok(DocumentFormat::Png),
            "pdf" => Ok(DocumentFormat::Pdf),
            other => Err(format!("unsupported document format '{other}'")),
        }
    }
}

/// Format-specific details preserved across a load/save round trip
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub format: DocumentFormat,
    /// (x, y) dots per inch from the source document
    pub dpi: Option<(u32, u32)>,
    /// Informational color mode tag of the first page
    pub color_mode: Option<String>,
    pub page_count: usize,
}

impl DocumentMetadata {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            dpi: None,
            color_mode: None,
            page_count: 0,
        }
    }
}

/// Format-specific loading and reassembly
///
/// Implementations never mutate the supplied images.
pub trait DocumentCodec: Send + Sync {
    /// Split a document into per-page images plus preserved metadata
    fn load(&self, document_bytes: &[u8]) -> Result<(Vec<DynamicImage>, DocumentMetadata)>;

    /// Reassemble pages into document bytes, restoring metadata
    fn save(&self, images: &[DynamicImage], metadata: &DocumentMetadata) -> Result<Vec<u8>>;
}

/// Select the codec for a format
pub fn codec_for(format: DocumentFormat) -> Result<Box<dyn DocumentCodec>> {
    match format {
        DocumentFormat::Tiff => Ok(Box::new(TiffCodec)),
        DocumentFormat::Png => Ok(Box::new(PngCodec)),
        DocumentFormat::Pdf => Err(RedactifyError::DocumentLoad(
            "PDF documents are not supported yet".to_string(),
        )),
    }
}

/// Rough raw-pixel size estimate used to gate OCR upload optimization
pub fn estimated_raw_size_mb(images: &[DynamicImage]) -> f64 {
    images
        .iter()
        .map(|img| {
            let bytes_per_pixel = img.color().bytes_per_pixel() as u64;
            (img.width() as u64 * img.height() as u64 * bytes_per_pixel) as f64
        })
        .sum::<f64>()
        / (1024.0 * 1024.0)
}

/// Prepare pages for the OCR upload
///
/// Applies lossless recompression through the codec; when the estimated raw
/// size exceeds `max_size_mb` the overshoot is logged so operators can spot
/// documents that strain the provider's upload limits.
pub fn optimize_for_ocr(
    codec: &dyn DocumentCodec,
    images: &[DynamicImage],
    metadata: &DocumentMetadata,
    max_size_mb: f64,
) -> Result<Vec<u8>> {
    let estimated = estimated_raw_size_mb(images);
    if estimated > max_size_mb {
        tracing::warn!(
            estimated_mb = format!("{estimated:.1}"),
            limit_mb = max_size_mb,
            "document exceeds OCR size target; relying on lossless compression"
        );
    }
    codec.save(images, metadata)
}
