//! Geometry primitives
//!
//! Axis-aligned bounding boxes in page-local coordinates. Two coordinate
//! conventions exist in the wild: absolute pixels (Azure Document
//! Intelligence on raster input) and normalized `[0, 1]` fractions of the
//! page (AWS Textract). The convention is carried on the box itself so the
//! two are never mixed silently; conversion to pixels happens at the paint
//! step.

use crate::domain::{RedactifyError, Result};
use serde::{Deserialize, Serialize};

/// Coordinate convention of a [`BoundingBox`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Absolute pixel coordinates in the page raster
    Pixel,
    /// Fractions of the page dimensions, each component in `[0, 1]`
    Normalized,
}

/// Axis-aligned rectangle in page-local coordinates
///
/// `page` is 1-based. `width` and `height` are non-negative; all components
/// must be finite (see [`BoundingBox::validate`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub space: CoordinateSpace,
}

impl BoundingBox {
    /// Create a box in absolute pixel coordinates
    pub fn pixel(page: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
            space: CoordinateSpace::Pixel,
        }
    }

    /// Create a box in normalized `[0, 1]` coordinates
    pub fn normalized(page: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
            space: CoordinateSpace::Normalized,
        }
    }

    /// Right edge (`x + width`)
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`)
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check the geometric invariants: finite components, non-negative
    /// dimensions, 1-based page.
    pub fn validate(&self) -> Result<()> {
        let components = [self.x, self.y, self.width, self.height];
        if components.iter().any(|c| !c.is_finite()) {
            return Err(RedactifyError::InvalidGeometry(format!(
                "non-finite component in box on page {}: ({}, {}, {}, {})",
                self.page, self.x, self.y, self.width, self.height
            )));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(RedactifyError::InvalidGeometry(format!(
                "negative dimensions on page {}: {}x{}",
                self.page, self.width, self.height
            )));
        }
        if self.page == 0 {
            return Err(RedactifyError::InvalidGeometry(
                "page numbers are 1-based".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether two boxes share any interior area
    ///
    /// Boxes on different pages or in different coordinate spaces never
    /// overlap. Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        if self.page != other.page || self.space != other.space {
            return false;
        }
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Union of a non-empty set of boxes: `min` over top-left corners and
    /// `max` over bottom-right corners
    ///
    /// Fails unless every box lives on the same page and in the same
    /// coordinate space.
    pub fn union(boxes: &[BoundingBox]) -> Result<BoundingBox> {
        let first = boxes.first().ok_or_else(|| {
            RedactifyError::InvalidGeometry("cannot union an empty set of boxes".to_string())
        })?;

        if boxes
            .iter()
            .any(|b| b.page != first.page || b.space != first.space)
        {
            return Err(RedactifyError::InvalidGeometry(
                "cannot union boxes across pages or coordinate spaces".to_string(),
            ));
        }

        let min_x = boxes.iter().map(|b| b.x).fold(f64::INFINITY, f64::min);
        let min_y = boxes.iter().map(|b| b.y).fold(f64::INFINITY, f64::min);
        let max_x = boxes.iter().map(|b| b.right()).fold(f64::NEG_INFINITY, f64::max);
        let max_y = boxes.iter().map(|b| b.bottom()).fold(f64::NEG_INFINITY, f64::max);

        Ok(BoundingBox {
            page: first.page,
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
            space: first.space,
        })
    }

    /// Grow the box by `padding` on all four sides
    ///
    /// When `page_dims` is supplied the result is clamped to
    /// `[0, width] x [0, height]`; otherwise only the origin is clamped to
    /// zero.
    pub fn inflate(&self, padding: f64, page_dims: Option<(f64, f64)>) -> BoundingBox {
        let min_x = (self.x - padding).max(0.0);
        let min_y = (self.y - padding).max(0.0);
        let mut max_x = self.right() + padding;
        let mut max_y = self.bottom() + padding;

        if let Some((page_w, page_h)) = page_dims {
            max_x = max_x.min(page_w);
            max_y = max_y.min(page_h);
        }

        BoundingBox {
            page: self.page,
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(0.0),
            height: (max_y - min_y).max(0.0),
            space: self.space,
        }
    }

    /// Scale a normalized box into absolute pixels
    ///
    /// Pixel-space boxes pass through unchanged.
    pub fn to_pixel_space(&self, page_width: f64, page_height: f64) -> BoundingBox {
        match self.space {
            CoordinateSpace::Pixel => *self,
            CoordinateSpace::Normalized => BoundingBox {
                page: self.page,
                x: self.x * page_width,
                y: self.y * page_height,
                width: self.width * page_width,
                height: self.height * page_height,
                space: CoordinateSpace::Pixel,
            },
        }
    }

    /// Round the box outward to integer pixel corners:
    /// `floor(x), floor(y), ceil(x+w), ceil(y+h)`
    ///
    /// Guarantees the painted rectangle fully covers the mathematical box.
    pub fn to_pixel_rect(&self) -> PixelRect {
        PixelRect {
            x0: self.x.floor() as i64,
            y0: self.y.floor() as i64,
            x1: self.right().ceil() as i64,
            y1: self.bottom().ceil() as i64,
        }
    }

    /// Approximate equality within `tolerance` on every corner, used for
    /// duplicate-region suppression
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        self.page == other.page
            && self.space == other.space
            && (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.right() - other.right()).abs() <= tolerance
            && (self.bottom() - other.bottom()).abs() <= tolerance
    }
}

/// An outward-rounded rectangle in integer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelRect {
    /// Intersect with an image of `width` x `height` pixels, returning
    /// `(x, y, w, h)` or `None` when nothing remains to paint.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x0.clamp(0, width as i64);
        let y0 = self.y0.clamp(0, height as i64);
        let x1 = self.x1.clamp(0, width as i64);
        let y1 = self.y1.clamp(0, height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_two_words() {
        let a = BoundingBox::pixel(1, 100.0, 200.0, 50.0, 20.0);
        let b = BoundingBox::pixel(1, 155.0, 200.0, 60.0, 20.0);
        let merged = BoundingBox::union(&[a, b]).unwrap();
        assert_eq!(merged.x, 100.0);
        assert_eq!(merged.y, 200.0);
        assert_eq!(merged.width, 115.0);
        assert_eq!(merged.height, 20.0);
    }

    #[test]
    fn test_union_rejects_cross_page() {
        let a = BoundingBox::pixel(1, 0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::pixel(2, 0.0, 0.0, 10.0, 10.0);
        assert!(BoundingBox::union(&[a, b]).is_err());
    }

    #[test]
    fn test_union_rejects_empty() {
        assert!(BoundingBox::union(&[]).is_err());
    }

    #[test]
    fn test_overlap_requires_interior() {
        let a = BoundingBox::pixel(1, 0.0, 0.0, 10.0, 10.0);
        let touching = BoundingBox::pixel(1, 10.0, 0.0, 10.0, 10.0);
        let crossing = BoundingBox::pixel(1, 5.0, 5.0, 10.0, 10.0);
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&crossing));
    }

    #[test]
    fn test_overlap_different_pages() {
        let a = BoundingBox::pixel(1, 0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::pixel(2, 0.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_inflate_clamps_to_page() {
        let b = BoundingBox::pixel(1, 2.0, 3.0, 10.0, 10.0);
        let inflated = b.inflate(5.0, Some((14.0, 20.0)));
        assert_eq!(inflated.x, 0.0);
        assert_eq!(inflated.y, 0.0);
        assert_eq!(inflated.right(), 14.0);
        assert_eq!(inflated.bottom(), 18.0);
    }

    #[test]
    fn test_inflate_without_dims_clamps_origin_only() {
        let b = BoundingBox::pixel(1, 100.0, 200.0, 50.0, 20.0);
        let inflated = b.inflate(5.0, None);
        assert_eq!(inflated.x, 95.0);
        assert_eq!(inflated.y, 195.0);
        assert_eq!(inflated.width, 60.0);
        assert_eq!(inflated.height, 30.0);
    }

    #[test]
    fn test_validate_rejects_negative_dims() {
        let b = BoundingBox {
            page: 1,
            x: 0.0,
            y: 0.0,
            width: -1.0,
            height: 5.0,
            space: CoordinateSpace::Pixel,
        };
        assert!(matches!(
            b.validate(),
            Err(RedactifyError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let b = BoundingBox::pixel(1, f64::NAN, 0.0, 1.0, 1.0);
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_normalized_to_pixel_space() {
        let b = BoundingBox::normalized(1, 0.1, 0.2, 0.5, 0.25);
        let px = b.to_pixel_space(1000.0, 2000.0);
        assert_eq!(px.space, CoordinateSpace::Pixel);
        assert_eq!(px.x, 100.0);
        assert_eq!(px.y, 400.0);
        assert_eq!(px.width, 500.0);
        assert_eq!(px.height, 500.0);
    }

    #[test]
    fn test_outward_rounding_covers_box() {
        let b = BoundingBox::pixel(1, 10.4, 20.6, 5.2, 3.1);
        let rect = b.to_pixel_rect();
        assert_eq!(rect.x0, 10);
        assert_eq!(rect.y0, 20);
        assert_eq!(rect.x1, 16); // ceil(15.6)
        assert_eq!(rect.y1, 24); // ceil(23.7)
    }

    #[test]
    fn test_pixel_rect_clamp() {
        let rect = PixelRect {
            x0: -5,
            y0: 10,
            x1: 30,
            y1: 50,
        };
        assert_eq!(rect.clamp_to(20, 40), Some((0, 10, 20, 30)));
        let offscreen = PixelRect {
            x0: 100,
            y0: 100,
            x1: 110,
            y1: 110,
        };
        assert_eq!(offscreen.clamp_to(20, 40), None);
    }
}
