use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Auto-save period used when no config sets one.
pub const DEFAULT_AUTO_SAVE_INTERVAL_MS: u64 = 30_000;
/// Shortest accepted auto-save period; smaller values are clamped up.
pub const MIN_AUTO_SAVE_INTERVAL_MS: u64 = 1_000;

const DEFAULT_INITIAL_VALUE: &str = "# Start writing your note here....";

#[derive(
    clap::ValueEnum, Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the operating system preference.
    #[default]
    System,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

/// Settings handed to the editor widget in the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub preview_style: String,
    pub initial_edit_type: String,
    pub initial_value: String,
    pub hide_mode_switch: bool,
    /// Toolbar layout as groups of item names.
    pub toolbar_items: Vec<Vec<String>>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        let group = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            preview_style: "vertical".to_string(),
            initial_edit_type: "wysiwyg".to_string(),
            initial_value: DEFAULT_INITIAL_VALUE.to_string(),
            hide_mode_switch: true,
            toolbar_items: vec![
                group(&["heading", "bold", "italic", "strike"]),
                group(&["hr", "quote"]),
                group(&["ul", "ol", "task", "indent", "outdent"]),
                group(&["table", "link", "image"]),
                group(&["code", "codeblock"]),
                group(&["scrollSync"]),
            ],
        }
    }
}

/// Effective settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub theme: ThemeMode,
    pub auto_save: bool,
    /// Milliseconds between auto-save passes.
    pub auto_save_interval: u64,
    pub editor: EditorSettings,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLayer::default().resolve()
    }
}

impl Config {
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval)
    }

    /// Render the effective settings in the config file format.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("config must be a mapping of settings")]
    NotAMapping,
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// One source of settings. Unset keys defer to lower layers.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorSettings>,
}

impl ConfigLayer {
    /// Overlay `other` on top of `self`; keys set in `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            theme: other.theme.or(self.theme),
            auto_save: other.auto_save.or(self.auto_save),
            auto_save_interval: other.auto_save_interval.or(self.auto_save_interval),
            editor: other.editor.clone().or_else(|| self.editor.clone()),
        }
    }

    /// Parse a YAML settings document.
    ///
    /// Unknown keys are ignored. A known key holding a value of the wrong
    /// shape is dropped with a warning so the default applies.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(content).map_err(ConfigError::Parse)?;
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            _ => return Err(ConfigError::NotAMapping),
        };
        Ok(Self {
            theme: field(&mapping, "theme"),
            auto_save: field(&mapping, "autoSave"),
            auto_save_interval: field(&mapping, "autoSaveInterval"),
            editor: field(&mapping, "editor"),
        })
    }

    /// Fill unset keys with defaults.
    pub fn resolve(&self) -> Config {
        let mut interval = self
            .auto_save_interval
            .unwrap_or(DEFAULT_AUTO_SAVE_INTERVAL_MS);
        if interval < MIN_AUTO_SAVE_INTERVAL_MS {
            tracing::warn!(
                interval,
                min = MIN_AUTO_SAVE_INTERVAL_MS,
                "autoSaveInterval too small, clamping"
            );
            interval = MIN_AUTO_SAVE_INTERVAL_MS;
        }
        Config {
            theme: self.theme.unwrap_or_default(),
            auto_save: self.auto_save.unwrap_or(true),
            auto_save_interval: interval,
            editor: self.editor.clone().unwrap_or_default(),
        }
    }
}

fn field<T: DeserializeOwned>(mapping: &Mapping, key: &str) -> Option<T> {
    let value = mapping.get(key)?;
    match serde_yaml::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(key, %err, "ignoring invalid config value");
            None
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("markflow").join("config.yaml");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("markflow")
                .join("config.yaml");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("markflow").join("config.yaml");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("markflow")
                .join("config.yaml");
        }
    }

    local_config_path()
}

pub fn local_config_path() -> PathBuf {
    PathBuf::from("markflow.yaml")
}

/// Load one config file. A missing file is an empty layer.
pub fn load_config_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ConfigLayer::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    ConfigLayer::from_yaml_str(&content)
}

/// Load one config file, falling back to an empty layer on any error.
pub fn load_config_layer_or_default(path: &Path) -> ConfigLayer {
    load_config_layer(path).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), %err, "using default settings");
        ConfigLayer::default()
    })
}

pub fn save_config_layer(path: &Path, layer: &ConfigLayer) -> Result<(), ConfigError> {
    let body = serde_yaml::to_string(layer).map_err(ConfigError::Serialize)?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, format!("# markflow defaults (saved with --save)\n{body}"))
        .map_err(write_err)
}

pub fn clear_config(path: &Path) -> Result<(), ConfigError> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(ConfigError::Write {
            path: path.to_path_buf(),
            source: err,
        }),
        _ => Ok(()),
    }
}
