use std::path::PathBuf;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::composite::error::BackdropError;

pub type BackdropId = u32;

/// Edge length of the swatch produced for solid backdrops. The engine
/// cover-scales it to the canvas.
const SOLID_SWATCH: u32 = 16;

/// Where a backdrop's pixels come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackdropSource {
    /// Image file bundled with the application.
    File { path: PathBuf },
    /// Remote image fetched over http(s).
    Url { url: String },
    /// Plain studio colour.
    Solid { rgb: [u8; 3] },
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backdrop {
    pub id: BackdropId,
    pub name: String,
    pub source: BackdropSource,
}

impl Backdrop {
    pub fn solid(id: BackdropId, name: impl Into<String>, rgb: [u8; 3]) -> Self {
        Self {
            id,
            name: name.into(),
            source: BackdropSource::Solid { rgb },
        }
    }
}

/// Ordered, static list of backdrops the user can choose from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackdropCatalog {
    entries: Vec<Backdrop>,
}

impl BackdropCatalog {
    /// Build a catalog. Later entries with an id already present are dropped.
    pub fn new(entries: Vec<Backdrop>) -> Self {
        let mut unique: Vec<Backdrop> = Vec::with_capacity(entries.len());
        for entry in entries {
            if unique.iter().any(|b| b.id == entry.id) {
                tracing::warn!("duplicate backdrop id {} ignored", entry.id);
                continue;
            }
            unique.push(entry);
        }
        Self { entries: unique }
    }

    /// Three studio colours that need no assets.
    pub fn default_entries() -> Vec<Backdrop> {
        vec![
            Backdrop::solid(1, "Studio White", [236, 236, 232]),
            Backdrop::solid(2, "Slate Grey", [92, 99, 110]),
            Backdrop::solid(3, "Corporate Navy", [28, 42, 74]),
        ]
    }

    pub fn get(&self, id: BackdropId) -> Option<&Backdrop> {
        self.entries.iter().find(|b| b.id == id)
    }

    pub fn first(&self) -> Option<&Backdrop> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backdrop> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BackdropCatalog {
    fn default() -> Self {
        Self::new(Self::default_entries())
    }
}

/// Fetches and decodes backdrop pixels.
#[async_trait]
pub trait BackdropLoader: Send + Sync {
    async fn load(&self, backdrop: &Backdrop) -> Result<RgbImage, BackdropError>;
}

/// Loader for all [`BackdropSource`] kinds: files via `tokio::fs`, URLs via
/// `reqwest`, solids generated in memory.
pub struct DefaultBackdropLoader {
    client: reqwest::Client,
}

impl DefaultBackdropLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BackdropError> {
        let http_error = |e: reqwest::Error| BackdropError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?;
        let bytes = response.bytes().await.map_err(http_error)?;
        Ok(bytes.to_vec())
    }
}

impl Default for DefaultBackdropLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackdropLoader for DefaultBackdropLoader {
    async fn load(&self, backdrop: &Backdrop) -> Result<RgbImage, BackdropError> {
        let bytes = match &backdrop.source {
            BackdropSource::Solid { rgb } => {
                return Ok(RgbImage::from_pixel(SOLID_SWATCH, SOLID_SWATCH, Rgb(*rgb)));
            }
            BackdropSource::File { path } => {
                tokio::fs::read(path)
                    .await
                    .map_err(|e| BackdropError::Io {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?
            }
            BackdropSource::Url { url } => self.fetch(url).await?,
        };
        tracing::debug!("decoding backdrop {} ({} bytes)", backdrop.id, bytes.len());
        decode(bytes).await
    }
}

/// Decode off the async runtime.
async fn decode(bytes: Vec<u8>) -> Result<RgbImage, BackdropError> {
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| BackdropError::Decode(e.to_string()))
    })
    .await
    .map_err(|e| BackdropError::Decode(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn default_catalog_has_three_solids() {
        let catalog = BackdropCatalog::default();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(catalog
            .iter()
            .all(|b| matches!(b.source, BackdropSource::Solid { .. })));
    }

    #[test]
    fn duplicate_ids_keep_first_entry() {
        let catalog = BackdropCatalog::new(vec![
            Backdrop::solid(7, "First", [0, 0, 0]),
            Backdrop::solid(7, "Second", [255, 255, 255]),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(7).unwrap().name, "First");
        assert!(catalog.get(8).is_none());
    }

    #[test]
    fn source_deserialises_from_tagged_json() {
        let backdrop: Backdrop = serde_json::from_str(
            r#"{"id": 4, "name": "Office", "source": {"kind": "url", "url": "https://example.com/office.jpg"}}"#,
        )
        .unwrap();
        assert_eq!(
            backdrop.source,
            BackdropSource::Url {
                url: "https://example.com/office.jpg".to_string()
            }
        );
    }

    #[tokio::test]
    async fn solid_backdrop_loads_without_io() {
        let loader = DefaultBackdropLoader::new();
        let img = loader
            .load(&Backdrop::solid(1, "White", [250, 250, 250]))
            .await
            .unwrap();
        assert!(img.pixels().all(|p| p.0 == [250, 250, 250]));
    }

    #[tokio::test]
    async fn file_backdrop_is_decoded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("office.png");
        let mut png = Vec::new();
        RgbImage::from_pixel(8, 4, Rgb([10, 200, 30]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(&path, png).unwrap();

        let loader = DefaultBackdropLoader::new();
        let img = loader
            .load(&Backdrop {
                id: 9,
                name: "Office".into(),
                source: BackdropSource::File { path },
            })
            .await
            .unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(0, 0).0, [10, 200, 30]);
    }

    #[tokio::test]
    async fn broken_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = DefaultBackdropLoader::new()
            .load(&Backdrop {
                id: 9,
                name: "Broken".into(),
                source: BackdropSource::File { path },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackdropError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = DefaultBackdropLoader::new()
            .load(&Backdrop {
                id: 9,
                name: "Missing".into(),
                source: BackdropSource::File {
                    path: PathBuf::from("/nonexistent/backdrop.png"),
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackdropError::Io { .. }));
    }
}
