//! Single-page PNG codec

use crate::document::{DocumentCodec, DocumentFormat, DocumentMetadata};
use crate::domain::{RedactifyError, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// PNG load/save; PNG has no page concept, so exactly one page is allowed
pub struct PngCodec;

impl DocumentCodec for PngCodec {
    fn load(&self, document_bytes: &[u8]) -> Result<(Vec<DynamicImage>, DocumentMetadata)> {
        let img = image::load_from_memory_with_format(document_bytes, ImageFormat::Png)
            .map_err(|e| RedactifyError::DocumentLoad(e.to_string()))?;

        let mut metadata = DocumentMetadata::new(DocumentFormat::Png);
        metadata.color_mode = Some(format!("{:?}", img.color()).to_lowercase());
        metadata.page_count = 1;

        Ok((vec![img], metadata))
    }

    fn save(&self, images: &[DynamicImage], _metadata: &DocumentMetadata) -> Result<Vec<u8>> {
        let page = match images {
            [single] => single,
            [] => {
                return Err(RedactifyError::DocumentSave(
                    "cannot save an empty document".to_string(),
                ))
            }
            _ => {
                return Err(RedactifyError::DocumentSave(format!(
                    "PNG holds a single page, got {}",
                    images.len()
                )))
            }
        };

        let mut buffer = Cursor::new(Vec::new());
        page.write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| RedactifyError::DocumentSave(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_round_trip_is_pixel_identical() {
        let codec = PngCodec;
        let original = DynamicImage::ImageRgb8(ImageBuffer::from_fn(30, 20, |x, y| {
            Rgb([(x * 8) as u8, (y * 12) as u8, 77])
        }));
        let metadata = DocumentMetadata::new(DocumentFormat::Png);

        let bytes = codec.save(&[original.clone()], &metadata).unwrap();
        let (pages, _) = codec.load(&bytes).unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].to_rgb8().as_raw(), original.to_rgb8().as_raw());
    }

    #[test]
    fn test_multi_page_rejected() {
        let codec = PngCodec;
        let page = DynamicImage::new_rgb8(4, 4);
        let metadata = DocumentMetadata::new(DocumentFormat::Png);
        assert!(codec.save(&[page.clone(), page], &metadata).is_err());
    }
}
