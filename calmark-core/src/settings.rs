//! The user-facing setting and where it is persisted.

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub show_duration: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_duration: true,
        }
    }
}

/// One changed key, as delivered by the storage change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<T>,
    pub new_value: T,
}

/// Storage change notification. Keys that did not change are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_duration: Option<ValueChange<bool>>,
}

impl StorageChange {
    pub fn between(old: Option<Settings>, new: Settings) -> Self {
        let old_value = old.map(|s| s.show_duration);
        let show_duration = (old_value != Some(new.show_duration)).then_some(ValueChange {
            old_value,
            new_value: new.show_duration,
        });
        Self { show_duration }
    }

    pub fn is_empty(&self) -> bool {
        self.show_duration.is_none()
    }
}

/// Persisted settings, read with defaults for missing keys.
pub trait SettingsStore {
    fn get(&self, defaults: Settings) -> Result<Settings>;
    /// Persists `settings` and returns the change listeners should see.
    fn set(&mut self, settings: Settings) -> Result<StorageChange>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    stored: Option<Settings>,
}

impl MemorySettingsStore {
    pub fn with(settings: Settings) -> Self {
        Self {
            stored: Some(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, defaults: Settings) -> Result<Settings> {
        Ok(self.stored.unwrap_or(defaults))
    }

    fn set(&mut self, settings: Settings) -> Result<StorageChange> {
        let change = StorageChange::between(self.stored, settings);
        self.stored = Some(settings);
        Ok(change)
    }
}

/// Keys as written on disk; all optional so older files keep loading.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    show_duration: Option<bool>,
}

/// Settings kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Default settings file: `{data_dir}/calmark/settings.json`
    /// - macOS:   `~/Library/Application Support/calmark/settings.json`
    /// - Linux:   `$XDG_DATA_HOME/calmark/settings.json` or `~/.local/share/calmark/settings.json`
    /// - Windows: `%APPDATA%\calmark\settings.json`
    pub fn default_path() -> PathBuf {
        if let Some(base) = BaseDirs::new() {
            base.data_dir().join("calmark").join("settings.json")
        } else {
            PathBuf::from("./calmark/settings.json")
        }
    }

    fn read(&self) -> Result<Option<StoredSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let stored = serde_json::from_str(&s)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(stored))
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, defaults: Settings) -> Result<Settings> {
        let stored = self.read()?.unwrap_or_default();
        Ok(Settings {
            show_duration: stored.show_duration.unwrap_or(defaults.show_duration),
        })
    }

    fn set(&mut self, settings: Settings) -> Result<StorageChange> {
        let previous = self.read()?.and_then(|s| {
            s.show_duration
                .map(|show_duration| Settings { show_duration })
        });
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating parent directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(StorageChange::between(previous, settings))
    }
}
