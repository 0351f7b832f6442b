// Settings: application config file and remembered user preferences.

pub mod store;
pub mod types;

pub use store::PreferencesStore;
pub use types::{AppConfig, Preferences};
