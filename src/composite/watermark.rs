use image::{Rgb, RgbImage};
use serde::Serialize;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Blank columns between glyphs.
const GLYPH_SPACING: u32 = 1;
/// Largest font upscale honoured by [`stamp`].
pub const MAX_SCALE: u32 = 64;

/// Plate and ink settings for the watermark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkStyle {
    pub fill: Rgb<u8>,
    pub fill_alpha: f32,
    pub ink: Rgb<u8>,
    pub ink_alpha: f32,
    /// Gap between the plate and the canvas edges.
    pub margin: u32,
    /// Gap between the plate edge and the text.
    pub padding: u32,
    /// Integer upscale of the 5x7 font, clamped to `1..=MAX_SCALE`.
    pub scale: u32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            fill: Rgb([255, 255, 255]),
            fill_alpha: 0.5,
            ink: Rgb([40, 40, 40]),
            ink_alpha: 0.8,
            margin: 12,
            padding: 8,
            scale: 2,
        }
    }
}

/// Where the plate landed on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlateRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Alpha-blend one channel.
pub fn blend(base: u8, over: u8, alpha: f32) -> u8 {
    let a = alpha.clamp(0.0, 1.0);
    (f32::from(base) * (1.0 - a) + f32::from(over) * a).round() as u8
}

fn blend_pixel(img: &mut RgbImage, x: u32, y: u32, over: Rgb<u8>, alpha: f32) {
    let px = img.get_pixel_mut(x, y);
    for (c, o) in px.0.iter_mut().zip(over.0) {
        *c = blend(*c, o, alpha);
    }
}

/// Text size in pixels at `scale`.
pub fn measure(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return (0, 0);
    }
    let width = chars
        .saturating_mul(GLYPH_WIDTH + GLYPH_SPACING)
        .saturating_sub(GLYPH_SPACING)
        .saturating_mul(scale);
    (width, GLYPH_HEIGHT.saturating_mul(scale))
}

/// Blend the plate into the bottom-right corner of `canvas` and stamp
/// `text` onto it. Text that does not fit is clipped at the canvas edge.
pub fn stamp(canvas: &mut RgbImage, text: &str, style: &WatermarkStyle) -> PlateRect {
    let scale = style.scale.clamp(1, MAX_SCALE);
    let (text_w, text_h) = measure(text, scale);
    let (canvas_w, canvas_h) = canvas.dimensions();
    let inset = style.padding.saturating_mul(2);

    let width = text_w.saturating_add(inset).min(canvas_w);
    let height = text_h.saturating_add(inset).min(canvas_h);
    let plate = PlateRect {
        x: canvas_w.saturating_sub(style.margin.saturating_add(width)),
        y: canvas_h.saturating_sub(style.margin.saturating_add(height)),
        width,
        height,
    };

    for y in plate.y..plate.y + plate.height {
        for x in plate.x..plate.x + plate.width {
            blend_pixel(canvas, x, y, style.fill, style.fill_alpha);
        }
    }

    let origin_x = plate.x.saturating_add(style.padding);
    let origin_y = plate.y.saturating_add(style.padding);
    let advance = (GLYPH_WIDTH + GLYPH_SPACING) * scale;
    for (i, ch) in text.chars().enumerate() {
        let cell_x = u32::try_from(i)
            .unwrap_or(u32::MAX)
            .saturating_mul(advance)
            .saturating_add(origin_x);
        if cell_x >= canvas_w || origin_y >= canvas_h {
            break;
        }
        let glyph = glyph(ch);
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = cell_x.saturating_add(col * scale);
                let y0 = origin_y.saturating_add(row as u32 * scale);
                for y in y0..y0.saturating_add(scale) {
                    for x in x0..x0.saturating_add(scale) {
                        if x < canvas_w && y < canvas_h {
                            blend_pixel(canvas, x, y, style.ink, style.ink_alpha);
                        }
                    }
                }
            }
        }
    }

    plate
}

/// 5x7 bitmap rows, most significant of the low five bits is the leftmost
/// column. Lowercase maps to uppercase; anything unsupported draws a box.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ' ' => [0x00; 7],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}
