use std::sync::Arc;

use fast_image_resize as fr;
use fr::images::Image;
use image::RgbImage;
use serde::Serialize;

use crate::composite::backdrop::BackdropId;
use crate::composite::error::{CompositeError, Result};
use crate::composite::watermark::{self, PlateRect, WatermarkStyle};

/// Output canvas, portrait.
pub const CANVAS_WIDTH: u32 = 600;
pub const CANVAS_HEIGHT: u32 = 800;

/// Rectangle on the canvas that receives the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Default head-and-shoulders placement: horizontally centred, upper third.
pub const FACE_PLACEMENT: Placement = Placement {
    x: 100,
    y: 160,
    width: 400,
    height: 480,
};

/// A finished composite. Never mutated; re-run the engine to change it.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: Arc<RgbImage>,
    pub backdrop_id: BackdropId,
    pub watermark: String,
    pub plate: PlateRect,
}

/// Pure compositor: backdrop cover-scaled to the canvas, foreground
/// cover-scaled into the placement, watermark stamped last.
#[derive(Debug, Clone)]
pub struct CompositeEngine {
    width: u32,
    height: u32,
    placement: Placement,
    style: WatermarkStyle,
}

impl CompositeEngine {
    pub fn new() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            placement: FACE_PLACEMENT,
            style: WatermarkStyle::default(),
        }
    }

    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }

    /// Backdrop and foreground layers without the watermark.
    pub fn compose_layers(&self, foreground: &RgbImage, backdrop: &RgbImage) -> Result<RgbImage> {
        let mut canvas = cover(backdrop, self.width, self.height)?;
        let p = self.placement;
        let face = cover(foreground, p.width, p.height)?;
        image::imageops::replace(&mut canvas, &face, i64::from(p.x), i64::from(p.y));
        Ok(canvas)
    }

    pub fn composite(
        &self,
        foreground: &RgbImage,
        backdrop: &RgbImage,
        backdrop_id: BackdropId,
        watermark_text: &str,
    ) -> Result<CompositeResult> {
        let mut canvas = self.compose_layers(foreground, backdrop)?;
        let plate = watermark::stamp(&mut canvas, watermark_text, &self.style);
        tracing::debug!(
            "composited onto backdrop {backdrop_id} ({}x{})",
            canvas.width(),
            canvas.height()
        );
        Ok(CompositeResult {
            image: Arc::new(canvas),
            backdrop_id,
            watermark: watermark_text.to_string(),
            plate,
        })
    }
}

impl Default for CompositeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale to fill `width` x `height`, cropping the overflow evenly on both
/// sides.
fn cover(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if src.width() == 0 || src.height() == 0 || width == 0 || height == 0 {
        return Err(CompositeError::EmptyImage);
    }
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }

    let src_image = Image::from_vec_u8(
        src.width(),
        src.height(),
        src.as_raw().clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| CompositeError::Resize(e.to_string()))?;
    let mut dst_image = Image::new(width, height, fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new().fit_into_destination(Some((0.5, 0.5)));
    fr::Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CompositeError::Resize(e.to_string()))?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CompositeError::Resize("resized buffer has wrong length".to_string()))
}
