//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where the data
//! corpus lives, which resort is active, the offline cache build tag, and the
//! feature flags that switch optional widgets on and off.
//!
//! Configuration is stored at `~/.config/slopecast/config.json`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "slopecast";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_DATA_ROOT: &str = "https://slopecast.app/data/";
const DEFAULT_ORIGIN: &str = "https://slopecast.app/";

const ENV_DATA_ROOT: &str = "SLOPECAST_DATA_ROOT";
const ENV_RESORT: &str = "SLOPECAST_RESORT";
const ENV_BUILD_TAG: &str = "SLOPECAST_BUILD_TAG";

/// Boolean switches for optional behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub daily_briefs: bool,
    pub live_lift_data: bool,
    pub date_picker: bool,
    pub brief_dismissable: bool,
    pub show_ikon_resorts: bool,
    pub show_vail_resorts: bool,
    pub show_incomplete_data: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            daily_briefs: false,
            live_lift_data: true,
            date_picker: false,
            brief_dismissable: true,
            show_ikon_resorts: true,
            show_vail_resorts: true,
            show_incomplete_data: false,
        }
    }
}

/// Names of the recognized flags, as they appear in the settings blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureFlag {
    DailyBriefs,
    LiveLiftData,
    DatePicker,
    BriefDismissable,
    ShowIkonResorts,
    ShowVailResorts,
    ShowIncompleteData,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 7] = [
        FeatureFlag::DailyBriefs,
        FeatureFlag::LiveLiftData,
        FeatureFlag::DatePicker,
        FeatureFlag::BriefDismissable,
        FeatureFlag::ShowIkonResorts,
        FeatureFlag::ShowVailResorts,
        FeatureFlag::ShowIncompleteData,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FeatureFlag::DailyBriefs => "dailyBriefs",
            FeatureFlag::LiveLiftData => "liveLiftData",
            FeatureFlag::DatePicker => "datePicker",
            FeatureFlag::BriefDismissable => "briefDismissable",
            FeatureFlag::ShowIkonResorts => "showIkonResorts",
            FeatureFlag::ShowVailResorts => "showVailResorts",
            FeatureFlag::ShowIncompleteData => "showIncompleteData",
        }
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FeatureFlag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FeatureFlag::ALL
            .into_iter()
            .find(|flag| flag.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown feature flag: {}", s))
    }
}

impl FeatureFlags {
    pub fn get(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::DailyBriefs => self.daily_briefs,
            FeatureFlag::LiveLiftData => self.live_lift_data,
            FeatureFlag::DatePicker => self.date_picker,
            FeatureFlag::BriefDismissable => self.brief_dismissable,
            FeatureFlag::ShowIkonResorts => self.show_ikon_resorts,
            FeatureFlag::ShowVailResorts => self.show_vail_resorts,
            FeatureFlag::ShowIncompleteData => self.show_incomplete_data,
        }
    }

    pub fn set(&mut self, flag: FeatureFlag, value: bool) {
        let slot = match flag {
            FeatureFlag::DailyBriefs => &mut self.daily_briefs,
            FeatureFlag::LiveLiftData => &mut self.live_lift_data,
            FeatureFlag::DatePicker => &mut self.date_picker,
            FeatureFlag::BriefDismissable => &mut self.brief_dismissable,
            FeatureFlag::ShowIkonResorts => &mut self.show_ikon_resorts,
            FeatureFlag::ShowVailResorts => &mut self.show_vail_resorts,
            FeatureFlag::ShowIncompleteData => &mut self.show_incomplete_data,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the JSON corpus (`index.json` lives directly under it)
    pub data_root: String,
    /// Origin the offline cache treats as same-origin
    pub origin: String,
    pub resort: Option<String>,
    /// Version stamp for offline cache namespaces
    pub build_tag: String,
    pub flags: FeatureFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: DEFAULT_DATA_ROOT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            resort: None,
            build_tag: format!("v{}", env!("CARGO_PKG_VERSION")),
            flags: FeatureFlags::default(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var(ENV_DATA_ROOT) {
            self.data_root = root;
        }
        if let Ok(resort) = std::env::var(ENV_RESORT) {
            self.resort = Some(resort);
        }
        if let Ok(tag) = std::env::var(ENV_BUILD_TAG) {
            self.build_tag = tag;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn data_root_url(&self) -> Result<Url> {
        parse_base_url(&self.data_root).context("Invalid data_root")
    }

    pub fn origin_url(&self) -> Result<Url> {
        parse_base_url(&self.origin).context("Invalid origin")
    }
}

/// Parse a URL and make sure relative joins land beneath it.
fn parse_base_url(s: &str) -> Result<Url> {
    let mut url = Url::parse(s)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Called with the new flags after every change.
pub type SettingsListener = Box<dyn Fn(&FeatureFlags) + Send + Sync>;

/// Owns the feature flags, persists them, and notifies subscribers on change.
pub struct SettingsStore {
    config: Config,
    path: Option<PathBuf>,
    listeners: Vec<SettingsListener>,
}

impl SettingsStore {
    /// `path` is where changes are written; `None` keeps them in memory.
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            config,
            path,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn flags(&self) -> FeatureFlags {
        self.config.flags
    }

    pub fn subscribe(&mut self, listener: SettingsListener) {
        self.listeners.push(listener);
    }

    /// Set one flag. Returns whether anything changed; listeners only hear about real changes.
    pub fn set(&mut self, flag: FeatureFlag, value: bool) -> Result<bool> {
        if self.config.flags.get(flag) == value {
            return Ok(false);
        }

        self.config.flags.set(flag, value);
        if let Some(ref path) = self.path {
            self.config.save_to(path)?;
        }
        info!(flag = %flag, value, "Feature flag changed");

        for listener in &self.listeners {
            listener(&self.config.flags);
        }
        Ok(true)
    }
}

/// Query parameters the page understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    /// `?debug=true` reveals the settings panel
    pub debug: bool,
    /// `?name=<slug>` selects a lift or trail detail page
    pub name: Option<String>,
}

impl PageParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "debug" => params.debug = value == "true",
                "name" if !value.is_empty() => params.name = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}
