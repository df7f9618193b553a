use crate::domain::ports::Watermarker;
use crate::error::{GateError, Result};
use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::io::Cursor;

pub const DEFAULT_BAND_HEIGHT: u32 = 60;
pub const DEFAULT_LABEL: &str = "Trial - pixgate";

const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Marks trial results with a darkened band along the bottom edge carrying a
/// white label, then re-encodes them as JPEG.
#[derive(Debug, Clone)]
pub struct BandWatermarker {
    band_height: u32,
    label: String,
}

impl BandWatermarker {
    pub fn new(band_height: u32, label: impl Into<String>) -> Self {
        Self {
            band_height,
            label: label.into(),
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, top: u32) -> Result<()> {
        let label = self.label.trim();
        let (width, height) = canvas.dimensions();
        let band = height - top;
        if label.is_empty() || band == 0 {
            return Ok(());
        }
        let font = FontRef::try_from_slice(LABEL_FONT)
            .map_err(|e| GateError::Transform(format!("cannot load watermark font: {e}")))?;

        let mut scale = PxScale::from(band as f32 * 0.55);
        let (text_width, _) = text_size(scale, &font, label);
        let room = width as f32 * 0.9;
        if text_width as f32 > room {
            scale = PxScale::from(scale.y * room / text_width as f32);
        }
        let (text_width, text_height) = text_size(scale, &font, label);

        let x = width.saturating_sub(text_width) / 2;
        let y = top + band.saturating_sub(text_height) / 2;
        draw_text_mut(canvas, LABEL_COLOR, x as i32, y as i32, scale, &font, label);
        Ok(())
    }
}

impl Default for BandWatermarker {
    fn default() -> Self {
        Self::new(DEFAULT_BAND_HEIGHT, DEFAULT_LABEL)
    }
}

impl Watermarker for BandWatermarker {
    fn apply(&self, image: &[u8]) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| GateError::Transform(format!("cannot decode result image: {e}")))?;
        let mut canvas = decoded.to_rgb8();
        let (width, height) = canvas.dimensions();
        let top = height.saturating_sub(self.band_height);

        for y in top..height {
            for x in 0..width {
                for channel in canvas.get_pixel_mut(x, y).0.iter_mut() {
                    *channel /= 2;
                }
            }
        }
        self.draw_label(&mut canvas, top)?;

        let mut encoded = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut encoded, ImageFormat::Jpeg)
            .map_err(|e| GateError::Transform(format!("cannot encode watermarked image: {e}")))?;
        Ok(encoded.into_inner())
    }
}
