use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::SystemTime,
};

use crate::process::normalize_process_name;

const CONFIG_ENV_VAR: &str = "FLOWWHEEL_CONFIG";
const CONFIG_FILE_NAME: &str = "config.json";

pub const MAX_TICK_RATE: u32 = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKey {
    #[default]
    MiddleMouse,
    XButton1,
    XButton2,
    Ctrl,
    Alt,
    Shift,
    /// Use `ScrollSettings::custom_hotkey`.
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    #[default]
    Toggle,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessProfile {
    pub process_name: String,
    /// Per-application overrides. Kept opaque and round-tripped; only the
    /// profile's presence affects classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<serde_json::Value>,
}

impl ProcessProfile {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            overrides: None,
        }
    }

    pub fn matches(&self, normalized_name: &str) -> bool {
        normalize_process_name(&self.process_name) == normalized_name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrollSettings {
    pub enabled: bool,
    /// Scroll speed per pixel of displacement beyond the deadzone.
    pub sensitivity: f32,
    /// Radius in pixels around the anchor with no scrolling.
    pub deadzone: u32,
    pub trigger_key: TriggerKey,
    pub trigger_mode: TriggerMode,
    /// `"Mod+Mod+Key"`; only read when `trigger_key` is `Custom`.
    pub custom_hotkey: String,
    pub reading_mode_enabled: bool,
    pub sync_scroll_enabled: bool,
    /// Physics updates per second.
    pub tick_rate: u32,
    /// Exponential decay constant for inertia, per second.
    pub friction: f64,
    /// Smallest wheel delta sent in one event.
    pub min_step: u32,
    /// When true `app_profiles` is an allow list, otherwise a block list.
    pub whitelist_mode: bool,
    pub app_profiles: Vec<ProcessProfile>,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: 0.5,
            deadzone: 20,
            trigger_key: TriggerKey::MiddleMouse,
            trigger_mode: TriggerMode::Toggle,
            custom_hotkey: String::new(),
            reading_mode_enabled: false,
            sync_scroll_enabled: false,
            tick_rate: 120,
            friction: 5.0,
            min_step: 1,
            whitelist_mode: false,
            app_profiles: [
                "flowwheel",
                "csgo",
                "valorant",
                "dota2",
                "league of legends",
                "overwatch",
                "r5apex",
            ]
            .into_iter()
            .map(ProcessProfile::new)
            .collect(),
        }
    }
}

impl ScrollSettings {
    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite() || self.sensitivity < 0.0 {
            bail!("sensitivity must be a non-negative number, got {}", self.sensitivity);
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            bail!("friction must be a non-negative number, got {}", self.friction);
        }
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            bail!("tick rate must be between 1 and {MAX_TICK_RATE}, got {}", self.tick_rate);
        }
        if self.min_step == 0 {
            bail!("minimum step must be at least 1");
        }
        Ok(())
    }

    /// Repairs out-of-range values read from disk instead of failing startup.
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.sensitivity.is_finite() || self.sensitivity < 0.0 {
            log::warn!(
                "Invalid sensitivity {} in settings; using {}",
                self.sensitivity,
                defaults.sensitivity
            );
            self.sensitivity = defaults.sensitivity;
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            log::warn!(
                "Invalid friction {} in settings; using {}",
                self.friction,
                defaults.friction
            );
            self.friction = defaults.friction;
        }
        self.tick_rate = self.tick_rate.clamp(1, MAX_TICK_RATE);
        self.min_step = self.min_step.max(1);
        self.custom_hotkey = self.custom_hotkey.trim().to_string();
    }

    pub fn find_profile(&self, process_name: &str) -> Option<&ProcessProfile> {
        let normalized = normalize_process_name(process_name);
        self.app_profiles
            .iter()
            .find(|profile| profile.matches(&normalized))
    }
}

/// Where settings live: `$FLOWWHEEL_CONFIG`, else `config.json` next to the executable.
pub fn default_settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let dir = exe
        .parent()
        .context("Executable path has no parent directory")?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Hot-swappable settings. Readers take an `Arc` snapshot and never hold the lock.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<Arc<ScrollSettings>>,
    last_modified: RwLock<Option<SystemTime>>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path).unwrap_or_else(|err| {
                log::warn!("{err:#}; starting with default settings");
                ScrollSettings::default()
            })
        } else {
            ScrollSettings::default()
        };

        Ok(Self {
            last_modified: RwLock::new(modified_time(&path)),
            path: Some(path),
            data: RwLock::new(Arc::new(data)),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(settings: ScrollSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(Arc::new(settings)),
            last_modified: RwLock::new(None),
        }
    }

    pub fn snapshot(&self) -> Arc<ScrollSettings> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` to a copy of the current settings, validates the result,
    /// then publishes and persists it.
    pub fn update(&self, f: impl FnOnce(&mut ScrollSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = ScrollSettings::clone(&guard);
        f(&mut next);
        next.custom_hotkey = next.custom_hotkey.trim().to_string();
        next.validate()?;
        self.persist(&next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    /// Adds a process to the profile list. Returns false if it was already there.
    pub fn add_process_profile(&self, process_name: &str) -> Result<bool> {
        let name = process_name.trim();
        if name.is_empty() {
            bail!("process name must not be empty");
        }
        if self.snapshot().find_profile(name).is_some() {
            return Ok(false);
        }

        self.update(|settings| settings.app_profiles.push(ProcessProfile::new(name)))?;
        log::info!("Added process profile '{}'", name);
        Ok(true)
    }

    /// Removes a process from the profile list. Returns false if it was absent.
    pub fn remove_process_profile(&self, process_name: &str) -> Result<bool> {
        let normalized = normalize_process_name(process_name);
        if self.snapshot().find_profile(process_name).is_none() {
            return Ok(false);
        }

        self.update(|settings| {
            settings
                .app_profiles
                .retain(|profile| !profile.matches(&normalized))
        })?;
        log::info!("Removed process profile '{}'", process_name.trim());
        Ok(true)
    }

    fn persist(&self, data: &ScrollSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        *self
            .last_modified
            .write()
            .unwrap_or_else(PoisonError::into_inner) = modified_time(path);
        Ok(())
    }
}

impl SettingsStore {
    /// Re-reads the file. A file that fails to parse leaves the current
    /// settings in place and is not retried until it changes again.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        *self
            .last_modified
            .write()
            .unwrap_or_else(PoisonError::into_inner) = modified_time(path);
        let data = read_settings(path)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(data);
        Ok(())
    }

    /// Reloads when the file's modification time moved since the last read
    /// or write. Returns whether a reload happened.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let current = modified_time(path);
        let known = *self
            .last_modified
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if current.is_none() || current == known {
            return Ok(false);
        }

        self.reload()?;
        Ok(true)
    }
}

fn read_settings(path: &Path) -> Result<ScrollSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let mut data: ScrollSettings = serde_json::from_str(&contents)
        .with_context(|| format!("Settings at {} are not valid", path.display()))?;
    data.sanitize();
    Ok(data)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
