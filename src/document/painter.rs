//! Mask painter
//!
//! Applies mask regions to page images. Production masks are solid opaque
//! rectangles; a debug mode renders semi-transparent category-colored fills
//! with a border instead, for inspecting what would be redacted. Inputs are
//! never mutated; masked pages are new images.
//!
//! Pixel-space regions arrive from the matcher already padded. Normalized
//! regions are scaled here by the page's pixel dimensions (OCR-reported
//! dimensions win when present, otherwise the loaded image's) and then
//! padded, since real pixel sizes are only known at this point.

use crate::domain::{CoordinateSpace, MaskRegion, OcrResult, RedactifyError, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::collections::HashMap;

/// Paints mask regions onto page images
pub struct MaskPainter {
    mask_color: [u8; 3],
    padding_px: f64,
    debug_mode: bool,
}

impl MaskPainter {
    pub fn new(mask_color: [u8; 3], padding_px: f64, debug_mode: bool) -> Self {
        if debug_mode {
            tracing::warn!(
                "mask painter running in DEBUG MODE; masks are semi-transparent \
                 and must not be used for production output"
            );
        }
        Self {
            mask_color,
            padding_px,
            debug_mode,
        }
    }

    /// Apply regions to pages, returning new images
    ///
    /// Page `n` (1-based) maps to `images[n - 1]`. Pages without regions are
    /// cloned untouched, so a run with zero regions is a pixel-identical
    /// copy.
    pub fn apply_masks(
        &self,
        images: &[DynamicImage],
        regions: &[MaskRegion],
        ocr: &OcrResult,
    ) -> Result<Vec<DynamicImage>> {
        if images.is_empty() {
            return Err(RedactifyError::Validation(
                "cannot mask an empty image list".to_string(),
            ));
        }

        let mut regions_by_page: HashMap<u32, Vec<&MaskRegion>> = HashMap::new();
        for region in regions {
            regions_by_page.entry(region.page).or_default().push(region);
        }

        let mut masked = Vec::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            let page_number = i as u32 + 1;
            match regions_by_page.get(&page_number) {
                Some(page_regions) => {
                    masked.push(self.mask_page(img, page_regions, ocr.pixel_dims(page_number)));
                    tracing::info!(
                        page = page_number,
                        regions = page_regions.len(),
                        "masked page"
                    );
                }
                None => masked.push(img.clone()),
            }
        }

        tracing::info!(
            regions = regions.len(),
            pages = images.len(),
            "applied masks"
        );
        Ok(masked)
    }

    fn mask_page(
        &self,
        img: &DynamicImage,
        regions: &[&MaskRegion],
        ocr_dims: Option<(f64, f64)>,
    ) -> DynamicImage {
        let (img_w, img_h) = (img.width(), img.height());
        let mut canvas: RgbaImage = img.to_rgba8();

        for region in regions {
            let bounds = match region.bounds.space {
                CoordinateSpace::Pixel => region.bounds,
                CoordinateSpace::Normalized => {
                    let (page_w, page_h) = ocr_dims.unwrap_or((f64::from(img_w), f64::from(img_h)));
                    region
                        .bounds
                        .to_pixel_space(page_w, page_h)
                        .inflate(self.padding_px, Some((f64::from(img_w), f64::from(img_h))))
                }
            };

            let Some((x, y, w, h)) = bounds.to_pixel_rect().clamp_to(img_w, img_h) else {
                tracing::debug!(page = region.page, "mask region lies outside the page raster");
                continue;
            };
            let rect = Rect::at(x as i32, y as i32).of_size(w, h);

            if self.debug_mode {
                self.draw_debug_mask(&mut canvas, rect, &region.entity_category);
            } else {
                let [r, g, b] = self.mask_color;
                draw_filled_rect_mut(&mut canvas, rect, Rgba([r, g, b, 255]));
            }
        }

        restore_color_mode(img, canvas)
    }

    /// Semi-transparent category-colored fill plus a solid border
    fn draw_debug_mask(&self, canvas: &mut RgbaImage, rect: Rect, category: &str) {
        let [r, g, b] = debug_color(category);
        for y in rect.top()..rect.top() + rect.height() as i32 {
            for x in rect.left()..rect.left() + rect.width() as i32 {
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                pixel.0 = [
                    ((u16::from(pixel.0[0]) + u16::from(r)) / 2) as u8,
                    ((u16::from(pixel.0[1]) + u16::from(g)) / 2) as u8,
                    ((u16::from(pixel.0[2]) + u16::from(b)) / 2) as u8,
                    255,
                ];
            }
        }
        draw_hollow_rect_mut(canvas, rect, Rgba([255, 0, 0, 255]));
    }
}

/// Convert the painted canvas back to the source image's color mode so the
/// document round-trips without a mode change
fn restore_color_mode(original: &DynamicImage, canvas: RgbaImage) -> DynamicImage {
    let painted = DynamicImage::ImageRgba8(canvas);
    match original {
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(painted.to_luma8()),
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma16(painted.to_luma16()),
        DynamicImage::ImageRgb8(_) => DynamicImage::ImageRgb8(painted.to_rgb8()),
        DynamicImage::ImageRgb16(_) => DynamicImage::ImageRgb16(painted.to_rgb16()),
        _ => painted,
    }
}

fn debug_color(category: &str) -> [u8; 3] {
    match category {
        "Person" => [255, 0, 0],
        "Date" => [0, 255, 0],
        "PhoneNumber" => [0, 0, 255],
        "Email" => [255, 255, 0],
        "SSN" => [255, 0, 255],
        "Address" => [0, 255, 255],
        _ => [128, 128, 128],
    }
}
