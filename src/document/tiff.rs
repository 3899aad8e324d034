//! Multi-page TIFF codec
//!
//! Decodes every directory of a TIFF into a page image and reassembles
//! pages with lossless LZW compression, preserving DPI across the round
//! trip. 16-bit pages are kept at full depth.

use crate::document::{DocumentCodec, DocumentFormat, DocumentMetadata};
use crate::domain::{RedactifyError, Result};
use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use std::io::{Cursor, Read, Seek, Write};
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, compression::Lzw, Rational, TiffEncoder};
use tiff::tags::{ResolutionUnit, Tag};
use tiff::ColorType;

/// TIFF load/save with multi-page and DPI support
pub struct TiffCodec;

impl DocumentCodec for TiffCodec {
    fn load(&self, document_bytes: &[u8]) -> Result<(Vec<DynamicImage>, DocumentMetadata)> {
        let mut decoder = Decoder::new(Cursor::new(document_bytes)).map_err(load_err)?;

        let mut images = Vec::new();
        let mut metadata = DocumentMetadata::new(DocumentFormat::Tiff);

        loop {
            let (width, height) = decoder.dimensions().map_err(load_err)?;
            let color_type = decoder.colortype().map_err(load_err)?;

            if images.is_empty() {
                metadata.dpi = read_dpi(&mut decoder);
                metadata.color_mode = Some(mode_name(color_type).to_string());
            }

            let decoded = decoder.read_image().map_err(load_err)?;
            images.push(page_to_image(width, height, color_type, decoded)?);

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(load_err)?;
        }

        metadata.page_count = images.len();
        tracing::info!(
            pages = images.len(),
            dpi = ?metadata.dpi,
            color_mode = ?metadata.color_mode,
            "loaded TIFF document"
        );

        Ok((images, metadata))
    }

    fn save(&self, images: &[DynamicImage], metadata: &DocumentMetadata) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(RedactifyError::DocumentSave(
                "cannot save an empty document".to_string(),
            ));
        }

        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = TiffEncoder::new(&mut buffer).map_err(save_err)?;

        for img in images {
            match img {
                DynamicImage::ImageLuma8(page) => write_page::<_, colortype::Gray8>(
                    &mut encoder,
                    page.width(),
                    page.height(),
                    page.as_raw(),
                    metadata.dpi,
                )?,
                DynamicImage::ImageRgb8(page) => write_page::<_, colortype::RGB8>(
                    &mut encoder,
                    page.width(),
                    page.height(),
                    page.as_raw(),
                    metadata.dpi,
                )?,
                DynamicImage::ImageRgba8(page) => write_page::<_, colortype::RGBA8>(
                    &mut encoder,
                    page.width(),
                    page.height(),
                    page.as_raw(),
                    metadata.dpi,
                )?,
                DynamicImage::ImageLuma16(page) => write_page::<_, colortype::Gray16>(
                    &mut encoder,
                    page.width(),
                    page.height(),
                    page.as_raw(),
                    metadata.dpi,
                )?,
                DynamicImage::ImageRgb16(page) => write_page::<_, colortype::RGB16>(
                    &mut encoder,
                    page.width(),
                    page.height(),
                    page.as_raw(),
                    metadata.dpi,
                )?,
                other => {
                    let page = other.to_rgb8();
                    write_page::<_, colortype::RGB8>(
                        &mut encoder,
                        page.width(),
                        page.height(),
                        page.as_raw(),
                        metadata.dpi,
                    )?
                }
            }
        }

        drop(encoder);
        let bytes = buffer.into_inner();
        tracing::info!(
            pages = images.len(),
            size_mb = format!("{:.2}", bytes.len() as f64 / (1024.0 * 1024.0)),
            "saved TIFF document"
        );
        Ok(bytes)
    }
}

fn write_page<W, C>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    dpi: Option<(u32, u32)>,
) -> Result<()>
where
    W: Write + Seek,
    C: colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
{
    let mut page = encoder
        .new_image_with_compression::<C, _>(width, height, Lzw)
        .map_err(save_err)?;

    if let Some((x_dpi, y_dpi)) = dpi {
        page.resolution(ResolutionUnit::Inch, Rational { n: x_dpi, d: 1 });
        if y_dpi != x_dpi {
            page.y_resolution(Rational { n: y_dpi, d: 1 });
        }
    }

    page.write_data(data).map_err(save_err)?;
    Ok(())
}

fn page_to_image(
    width: u32,
    height: u32,
    color_type: ColorType,
    decoded: DecodingResult,
) -> Result<DynamicImage> {
    let mismatch = || RedactifyError::DocumentLoad("pixel buffer size mismatch".to_string());

    match (color_type, decoded) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => Ok(DynamicImage::ImageLuma8(
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buf).ok_or_else(mismatch)?,
        )),
        (ColorType::RGB(8), DecodingResult::U8(buf)) => Ok(DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buf).ok_or_else(mismatch)?,
        )),
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => Ok(DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, buf).ok_or_else(mismatch)?,
        )),
        (ColorType::Gray(16), DecodingResult::U16(buf)) => Ok(DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf).ok_or_else(mismatch)?,
        )),
        (ColorType::RGB(16), DecodingResult::U16(buf)) => Ok(DynamicImage::ImageRgb16(
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buf).ok_or_else(mismatch)?,
        )),
        (color, _) => Err(RedactifyError::DocumentLoad(format!(
            "unsupported TIFF color type {color:?}"
        ))),
    }
}

fn mode_name(color_type: ColorType) -> &'static str {
    match color_type {
        ColorType::Gray(8) => "gray8",
        ColorType::Gray(16) => "gray16",
        ColorType::RGB(8) => "rgb8",
        ColorType::RGB(16) => "rgb16",
        ColorType::RGBA(8) => "rgba8",
        _ => "other",
    }
}

fn read_dpi<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<(u32, u32)> {
    let x = resolution_value(decoder.find_tag(Tag::XResolution).ok().flatten()?)?;
    let y = resolution_value(decoder.find_tag(Tag::YResolution).ok().flatten()?)?;
    Some((x, y))
}

fn resolution_value(value: Value) -> Option<u32> {
    match value {
        Value::Rational(numerator, denominator) if denominator != 0 => {
            Some((numerator as f64 / denominator as f64).round() as u32)
        }
        Value::Unsigned(v) => Some(v),
        Value::Short(v) => Some(u32::from(v)),
        _ => None,
    }
}

fn load_err(err: impl std::fmt::Display) -> RedactifyError {
    RedactifyError::DocumentLoad(err.to_string())
}

fn save_err(err: impl std::fmt::Display) -> RedactifyError {
    RedactifyError::DocumentSave(err.to_string())
}
