use serde::{Deserialize, Serialize};

/// Brightness gain at full subtlety.
pub const BRIGHTNESS_GAIN: f32 = 0.10;
/// Contrast gain at full subtlety.
pub const CONTRAST_GAIN: f32 = 0.05;
/// Saturation gain at full subtlety.
pub const SATURATION_GAIN: f32 = 0.20;
/// Gaussian blur sigma (pixels) at full subtlety.
pub const BLUR_GAIN: f32 = 1.0;
/// Blur below this sigma is indistinguishable from none and is skipped.
pub const MIN_BLUR_SIGMA: f32 = 0.05;

pub const DEFAULT_SUBTLETY: u8 = 50;
pub const MAX_SUBTLETY: u8 = 100;

/// User-facing enhancement strength (0-100). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct EnhancementParams {
    subtlety: u8,
}

impl EnhancementParams {
    pub fn new(subtlety: i64) -> Self {
        Self {
            subtlety: subtlety.clamp(0, i64::from(MAX_SUBTLETY)) as u8,
        }
    }

    pub fn subtlety(self) -> u8 {
        self.subtlety
    }

    /// Normalised strength `L = subtlety / 100`.
    pub fn level(self) -> f32 {
        f32::from(self.subtlety) / f32::from(MAX_SUBTLETY)
    }

    pub fn coefficients(self) -> Coefficients {
        let level = self.level();
        Coefficients {
            brightness: 1.0 + level * BRIGHTNESS_GAIN,
            contrast: 1.0 + level * CONTRAST_GAIN,
            saturation: 1.0 + level * SATURATION_GAIN,
            blur_sigma: level * BLUR_GAIN,
        }
    }
}

impl Default for EnhancementParams {
    fn default() -> Self {
        Self {
            subtlety: DEFAULT_SUBTLETY,
        }
    }
}

impl From<i64> for EnhancementParams {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<EnhancementParams> for u8 {
    fn from(params: EnhancementParams) -> Self {
        params.subtlety
    }
}

/// Filter strengths derived from [`EnhancementParams`].
///
/// Scales of `1.0` and a sigma of `0.0` are the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficients {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur_sigma: f32,
}
