use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::richtext::style::{Color, DEFAULT_FONT_SIZE, Style, clamp_font_size};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "Pagetext";
const APPLICATION: &str = "pagetext";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Font size of fresh documents and of markup that names no size
    pub default_font_size: u16,
    /// Highlight given to pasted `<mark>` elements
    pub mark_highlight: String,
    /// Paste input beyond this is truncated before sanitizing
    pub max_paste_bytes: usize,
    /// Plain-text paste takes the active style instead of the default style
    pub plain_paste_inherits_active_style: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            default_font_size: DEFAULT_FONT_SIZE,
            mark_highlight: "#ffff00".to_string(),
            max_paste_bytes: 1024 * 1024,
            plain_paste_inherits_active_style: true,
        }
    }
}

impl EditorConfig {
    /// The style of untouched text
    pub fn default_style(&self) -> Style {
        Style::plain().with_font_size(i64::from(self.font_size()))
    }

    pub fn font_size(&self) -> u16 {
        clamp_font_size(self.default_font_size as i64)
    }

    /// The `<mark>` highlight; an unusable value falls back to yellow
    pub fn mark_highlight_color(&self) -> Color {
        match self.mark_highlight.parse() {
            Ok(color) => color,
            Err(err) => {
                warn!(%err, "invalid mark_highlight in config");
                Color::rgb(0xff, 0xff, 0x00)
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> io::Result<String> {
        toml::to_string_pretty(self).map_err(|err| {
            io::Error::new(ErrorKind::Other, format!("toml serialization error: {err}"))
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Load from the platform config dir. A missing file means defaults;
    /// a broken one is reported and ignored.
    pub fn discover() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "ignoring config file");
                Self::default()
            }
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
