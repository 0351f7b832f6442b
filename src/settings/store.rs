use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::composite::backdrop::BackdropId;
use crate::settings::types::Preferences;

const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Persistent preferences store with debounced saving.
pub struct PreferencesStore {
    path: PathBuf,
    data: Mutex<Preferences>,
    save_notify: Notify,
    is_dirty: AtomicBool,
}

impl PreferencesStore {
    /// Create a new store, loading from disk if the file exists.
    pub fn new(path: PathBuf) -> Self {
        let data = match Self::load(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("ignoring unreadable preferences at {}: {e}", path.display());
                Preferences::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
            save_notify: Notify::new(),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Load preferences from a JSON file, returning default on missing file.
    pub fn load(path: &Path) -> Result<Preferences, String> {
        if !path.exists() {
            return Ok(Preferences::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    }

    /// Save current preferences to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<(), String> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data).map_err(|e| e.to_string())?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| e.to_string())?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Save now if anything changed since the last save.
    pub fn flush(&self) -> Result<(), String> {
        if self.is_dirty.swap(false, Ordering::AcqRel) {
            self.save()?;
        }
        Ok(())
    }

    pub fn get(&self) -> Preferences {
        self.data.lock().clone()
    }

    /// Remember the enhancement subtlety. Triggers a debounced save.
    pub fn set_subtlety(&self, subtlety: u8) {
        self.update(|prefs| prefs.subtlety = Some(subtlety));
    }

    /// Remember the chosen backdrop. Triggers a debounced save.
    pub fn set_backdrop(&self, id: BackdropId) {
        self.update(|prefs| prefs.backdrop_id = Some(id));
    }

    fn update(&self, apply: impl FnOnce(&mut Preferences)) {
        {
            let mut data = self.data.lock();
            let before = data.clone();
            apply(&mut data);
            if *data == before {
                return;
            }
        }
        self.is_dirty.store(true, Ordering::Release);
        self.save_notify.notify_one();
    }

    /// Start the debounce task: wait for a dirty notification, sleep 500ms,
    /// then save.
    ///
    /// Uses an `AtomicBool` dirty flag so notifications arriving between a
    /// save and the next `notified().await` are not lost.
    pub fn start_debounce_task(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                store.save_notify.notified().await;
                tokio::time::sleep(SAVE_DEBOUNCE).await;
                if let Err(e) = store.flush() {
                    tracing::warn!("Failed to save preferences: {e}");
                }
            }
        })
    }
}
