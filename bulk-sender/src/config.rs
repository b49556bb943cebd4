//! Persistent operator preferences.
//!
//! The store is an opaque string map saved as JSON. Every known key has a
//! human-readable default so forms can be pre-filled on first run; values are
//! never validated here.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ConfigError;

const APPLICATION_DIR: &str = "bulk-sender";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ContactsUrl,
    ButtonFile,
    ButtonDownload,
    ButtonExtension,
    WhatsappUrl,
    ColName,
    ColSurname,
    ColPhone,
    Template,
    WebdriverUrl,
    PaceMs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 11] = [
        ConfigKey::ContactsUrl,
        ConfigKey::ButtonFile,
        ConfigKey::ButtonDownload,
        ConfigKey::ButtonExtension,
        ConfigKey::WhatsappUrl,
        ConfigKey::ColName,
        ConfigKey::ColSurname,
        ConfigKey::ColPhone,
        ConfigKey::Template,
        ConfigKey::WebdriverUrl,
        ConfigKey::PaceMs,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ContactsUrl => "contacts_url",
            ConfigKey::ButtonFile => "button_file",
            ConfigKey::ButtonDownload => "button_download",
            ConfigKey::ButtonExtension => "button_extension",
            ConfigKey::WhatsappUrl => "whatsapp_url",
            ConfigKey::ColName => "col_name",
            ConfigKey::ColSurname => "col_surname",
            ConfigKey::ColPhone => "col_phone",
            ConfigKey::Template => "template",
            ConfigKey::WebdriverUrl => "webdriver_url",
            ConfigKey::PaceMs => "pace_ms",
        }
    }

    pub const fn default_value(&self) -> &'static str {
        match self {
            ConfigKey::ContactsUrl => "",
            ConfigKey::ButtonFile => "File",
            ConfigKey::ButtonDownload => "Download",
            ConfigKey::ButtonExtension => "Comma Separated Values (.csv)",
            ConfigKey::WhatsappUrl => "https://web.whatsapp.com/",
            ConfigKey::ColName => "Name",
            ConfigKey::ColSurname => "Surname",
            ConfigKey::ColPhone => "Phone",
            ConfigKey::Template => "Hi {Name}! How are you?",
            ConfigKey::WebdriverUrl => "http://localhost:9515",
            ConfigKey::PaceMs => "500",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }

    fn default_for(name: &str) -> &'static str {
        Self::parse(name).map(|key| key.default_value()).unwrap_or("")
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    /// `<config dir>/bulk-sender/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APPLICATION_DIR).join(CONFIG_FILE))
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(Self::default_path()?)
    }

    /// Loads the store at `path`. A missing file yields an empty store that
    /// answers every lookup with its default.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Config file not found at {:?}, using defaults", path);
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored value, else the key's default, else the empty string.
    pub fn get(&self, key: impl AsRef<str>) -> String {
        let key = key.as_ref();
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| ConfigKey::default_for(key).to_string())
    }

    pub fn is_set(&self, key: impl AsRef<str>) -> bool {
        self.values.contains_key(key.as_ref())
    }

    /// Stores a value and persists the store.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Result<(), ConfigError> {
        self.values.insert(key.as_ref().to_string(), value.into());
        self.save()
    }

    /// Stores several values with a single write.
    pub fn update<K, V, I>(&mut self, pairs: I) -> Result<(), ConfigError>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.values.insert(key.as_ref().to_string(), value.into());
        }
        self.save()
    }

    /// Effective values of every known key followed by any other stored keys.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = ConfigKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), self.get(key)))
            .collect();
        entries.extend(
            self.values
                .iter()
                .filter(|(key, _)| ConfigKey::parse(key).is_none())
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        entries
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        debug!("Saved config to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
        assert_eq!(store.get(ConfigKey::WhatsappUrl), "https://web.whatsapp.com/");
        assert_eq!(store.get("col_phone"), "Phone");
        assert_eq!(store.get("unknown"), "");
        assert!(!store.is_set(ConfigKey::ColPhone));
    }

    #[test]
    fn test_set_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut store = ConfigStore::open(&path).unwrap();
        store.set(ConfigKey::ColPhone, "Cellulare").unwrap();
        store
            .update([("col_name", "Nome"), ("custom", "value")])
            .unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.get(ConfigKey::ColPhone), "Cellulare");
        assert_eq!(reopened.get(ConfigKey::ColName), "Nome");
        assert_eq!(reopened.get("custom"), "value");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(ConfigStore::open(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_entries_lists_known_then_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("c.json")).unwrap();
        store.set("zzz", "1").unwrap();
        let entries = store.entries();
        assert_eq!(entries.len(), ConfigKey::ALL.len() + 1);
        assert_eq!(entries[0].0, "contacts_url");
        assert_eq!(entries.last().unwrap(), &("zzz".to_string(), "1".to_string()));
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(ConfigKey::parse(key.as_str()), Some(key));
        }
    }
}
