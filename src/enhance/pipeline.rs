use image::RgbImage;

use crate::enhance::params::{EnhancementParams, MIN_BLUR_SIGMA};

/// Rec.709 luma weights used by the saturate matrix.
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// One step of the filter chain, in application order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Multiply every channel.
    Brightness(f32),
    /// Scale distance from mid-grey.
    Contrast(f32),
    /// Luma-preserving saturation scale.
    Saturation(f32),
    /// Gaussian blur with the given sigma.
    Blur(f32),
}

/// The operations `params` asks for, identity steps left out.
pub fn plan(params: EnhancementParams) -> Vec<Operation> {
    let c = params.coefficients();
    let mut ops = Vec::with_capacity(4);
    if c.brightness != 1.0 {
        ops.push(Operation::Brightness(c.brightness));
    }
    if c.contrast != 1.0 {
        ops.push(Operation::Contrast(c.contrast));
    }
    if c.saturation != 1.0 {
        ops.push(Operation::Saturation(c.saturation));
    }
    if c.blur_sigma >= MIN_BLUR_SIGMA {
        ops.push(Operation::Blur(c.blur_sigma));
    }
    ops
}

/// Run the enhancement chain on `source`.
///
/// The output has the input's dimensions. With nothing to do (subtlety 0)
/// the output is a pixel-identical copy.
pub fn apply(source: &RgbImage, params: EnhancementParams) -> RgbImage {
    let ops = plan(params);
    let colour_ops: Vec<Operation> = ops
        .iter()
        .copied()
        .filter(|op| !matches!(op, Operation::Blur(_)))
        .collect();

    let mut out = source.clone();
    if !colour_ops.is_empty() {
        for pixel in out.pixels_mut() {
            let mut v = pixel.0.map(|c| f32::from(c) / 255.0);
            for op in &colour_ops {
                v = apply_colour(*op, v);
            }
            pixel.0 = v.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
        }
    }

    match ops.last() {
        Some(Operation::Blur(sigma)) => image::imageops::blur(&out, *sigma),
        _ => out,
    }
}

fn apply_colour(op: Operation, [r, g, b]: [f32; 3]) -> [f32; 3] {
    let out = match op {
        Operation::Brightness(k) => [r * k, g * k, b * k],
        Operation::Contrast(k) => [r, g, b].map(|v| (v - 0.5) * k + 0.5),
        Operation::Saturation(s) => {
            let [lr, lg, lb] = LUMA;
            [
                (lr + (1.0 - lr) * s) * r + (lg - lg * s) * g + (lb - lb * s) * b,
                (lr - lr * s) * r + (lg + (1.0 - lg) * s) * g + (lb - lb * s) * b,
                (lr - lr * s) * r + (lg - lg * s) * g + (lb + (1.0 - lb) * s) * b,
            ]
        }
        Operation::Blur(_) => [r, g, b],
    };
    out.map(|v| v.clamp(0.0, 1.0))
}
