use anyhow::{Context, Result, bail};
use directories::BaseDirs;
use serde::Deserialize;
use strum::IntoEnumIterator;
use std::{fs, path::PathBuf};

use crate::render::LabelState;
use crate::selectors::{Matcher, class_name};
use crate::settings::{FileSettingsStore, Settings};

/// Where the engine looks on the host page. All matchers use the selector subset
/// described in [`crate::selectors`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selectors {
    /// Subtree the mutation observer watches.
    pub container: Matcher,
    /// Event chips.
    pub chip: Matcher,
    /// Time-display element inside a chip; links are tried as one fallback chain.
    pub time_display: Vec<Matcher>,
    /// Class that marks labels owned by the engine.
    pub label_class: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            container: Matcher::Tag("body".to_string()),
            chip: Matcher::All(vec![
                Matcher::AttrEquals("role".to_string(), "button".to_string()),
                Matcher::HasAttr("data-eventchip".to_string()),
                Matcher::Not(Box::new(Matcher::AttrEquals(
                    "aria-hidden".to_string(),
                    "true".to_string(),
                ))),
                Matcher::Not(Box::new(Matcher::Class("placeholder".to_string()))),
            ]),
            time_display: vec![
                Matcher::All(vec![
                    Matcher::Tag("div".to_string()),
                    Matcher::AttrContains("class".to_string(), "gVNoLb".to_string()),
                ]),
                Matcher::All(vec![
                    Matcher::Tag("div".to_string()),
                    Matcher::AttrContains("class".to_string(), "Jmftzc".to_string()),
                ]),
            ],
            label_class: "event-duration".to_string(),
        }
    }
}

impl Selectors {
    pub fn label(&self) -> Matcher {
        Matcher::Class(self.label_class.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Value of `show_duration` used when the settings store has none.
    pub show_duration: bool,
    /// File backing the persisted settings.
    pub settings_path: PathBuf,
    pub selectors: Selectors,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    show_duration: Option<bool>,
    settings_path: Option<PathBuf>,
    /// Optional table:
    /// [selectors]
    /// chip = '[role="button"][data-eventchip]'
    /// time_display = ['div[class*="gVNoLb"]', 'div[class*="Jmftzc"]']
    selectors: Option<FileSelectors>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSelectors {
    container: Option<Matcher>,
    chip: Option<Matcher>,
    time_display: Option<Vec<Matcher>>,
    label_class: Option<String>,
}

impl Config {
    /// Public entrypoint: load config from disk (first XDG path, then native) and apply defaults.
    pub fn load() -> Result<Self> {
        let file_config = Self::read_file_config()?;
        Self::from_file_config(file_config)
    }

    /// Builds a config from TOML text, applying defaults for everything left out.
    pub fn from_toml(s: &str) -> Result<Self> {
        Self::from_file_config(Self::parse_file(s)?)
    }

    pub fn defaults(&self) -> Settings {
        Settings {
            show_duration: self.show_duration,
        }
    }

    pub fn settings_store(&self) -> FileSettingsStore {
        FileSettingsStore::new(self.settings_path.clone())
    }

    /// First config file candidate that exists, if any.
    pub fn config_file() -> Option<PathBuf> {
        Self::config_file_paths().into_iter().find(|p| p.exists())
    }

    fn from_file_config(file_config: FileConfig) -> Result<Self> {
        let defaults = Selectors::default();
        let selectors = match file_config.selectors {
            Some(s) => Selectors {
                container: s.container.unwrap_or(defaults.container),
                chip: s.chip.unwrap_or(defaults.chip),
                time_display: s
                    .time_display
                    .filter(|chain| !chain.is_empty())
                    .unwrap_or(defaults.time_display),
                label_class: match s.label_class.as_deref().map(str::trim) {
                    Some(c) if !c.is_empty() => Self::label_class(c)?,
                    _ => defaults.label_class,
                },
            },
            None => defaults,
        };

        Ok(Self {
            show_duration: file_config
                .show_duration
                .unwrap_or(Settings::default().show_duration),
            settings_path: file_config
                .settings_path
                .unwrap_or_else(FileSettingsStore::default_path),
            selectors,
        })
    }

    /// Labels are found by this class and lose their state class on update, so it
    /// must be one identifier distinct from every state class.
    fn label_class(c: &str) -> Result<String> {
        let class = class_name(c).context("invalid `selectors.label_class`")?;
        if LabelState::iter().any(|s| AsRef::<str>::as_ref(&s) == class) {
            bail!("invalid `selectors.label_class`: `{class}` is reserved for label state");
        }
        Ok(class)
    }

    fn config_file_paths() -> Vec<PathBuf> {
        let mut v = Vec::new();
        if let Some(b) = BaseDirs::new() {
            let xdg = b
                .home_dir()
                .join(".config")
                .join("calmark")
                .join("config.toml");
            v.push(xdg);
            let native = b.config_dir().join("calmark").join("config.toml");
            v.push(native);
        }
        v
    }

    /// Read the first existing config file and parse it.
    fn read_file_config() -> Result<FileConfig> {
        for path in Self::config_file_paths() {
            if !path.exists() {
                continue;
            }
            let s =
                fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            return Self::parse_file(&s).with_context(|| format!("parsing {}", path.display()));
        }
        Ok(FileConfig::default())
    }

    /// Parse a TOML string into `FileConfig`.
    fn parse_file(s: &str) -> Result<FileConfig> {
        Ok(toml::from_str::<FileConfig>(s)?)
    }
}
