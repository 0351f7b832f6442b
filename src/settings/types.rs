use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::types::FacingMode;
use crate::composite::backdrop::{Backdrop, BackdropCatalog, BackdropId};
use crate::composite::encode::OutputFormat;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "POLISHPIC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "polishpic.json";

/// Application configuration. Every field has a default, so a partial or
/// missing file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Delay between detection ticks while live.
    pub tick_interval_ms: u64,
    /// Upper bound on fetching and decoding one backdrop.
    pub backdrop_timeout_ms: u64,
    pub watermark_text: String,
    /// Directory holding the detection model. `None` uses built-in tuning.
    pub model_dir: Option<PathBuf>,
    pub facing: FacingMode,
    pub backdrops: Vec<Backdrop>,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    pub preferences_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            backdrop_timeout_ms: 5000,
            watermark_text: "POLISHPIC PREVIEW".to_string(),
            model_dir: None,
            facing: FacingMode::User,
            backdrops: BackdropCatalog::default_entries(),
            output_dir: PathBuf::from("output"),
            output_format: OutputFormat::Png,
            preferences_path: PathBuf::from("polishpic-preferences.json"),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, returning defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&contents).map_err(|e| format!("{}: {e}", path.display()))
    }

    /// Path from `POLISHPIC_CONFIG`, else `polishpic.json` in the working
    /// directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Tick interval, never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn backdrop_timeout(&self) -> Duration {
        Duration::from_millis(self.backdrop_timeout_ms)
    }

    pub fn catalog(&self) -> BackdropCatalog {
        BackdropCatalog::new(self.backdrops.clone())
    }
}

/// User choices remembered between sessions. No image data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub subtlety: Option<u8>,
    pub backdrop_id: Option<BackdropId>,
}
