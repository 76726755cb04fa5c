//! Startup configuration.
//!
//! Natively read from the JSON file named by `OCR_CANVAS_CONFIG`, falling
//! back to `ocr-canvas.json` in the working directory. In the browser the
//! same JSON is read from `localStorage["ocr-canvas.settings"]`. Missing
//! fields take their defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{DEFAULT_QUALITY, ExportFormat};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::raster::Color;
use crate::tools::{MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, Tool, ToolSettings};

pub const CONFIG_ENV: &str = "OCR_CANVAS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ocr-canvas.json";
pub const STORAGE_KEY: &str = "ocr-canvas.settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("settings storage unavailable")]
    Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tool: Tool,
    pub color: Color,
    pub brush_size: u32,
    pub opacity: f32,
    pub history_capacity: usize,
    pub export_format: ExportFormat,
    pub export_quality: f32,
    pub export_dir: PathBuf,
    pub tesseract_program: String,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: Color::WHITE,
            brush_size: 8,
            opacity: 1.0,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            export_format: ExportFormat::Png,
            export_quality: DEFAULT_QUALITY,
            export_dir: PathBuf::from("."),
            tesseract_program: "tesseract".into(),
            language: "eng".into(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason: String| Err(SettingsError::Invalid { field, reason });
        if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&self.brush_size) {
            return invalid(
                "brush_size",
                format!("{} is outside {MIN_BRUSH_SIZE}..={MAX_BRUSH_SIZE}", self.brush_size),
            );
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return invalid("opacity", format!("{} is outside 0..=1", self.opacity));
        }
        if self.history_capacity == 0 {
            return invalid("history_capacity", "must be at least 1".into());
        }
        if !(self.export_quality > 0.0 && self.export_quality <= 1.0) {
            return invalid("export_quality", format!("{} is outside (0, 1]", self.export_quality));
        }
        if self.language.trim().is_empty() {
            return invalid("language", "must not be empty".into());
        }
        Ok(())
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings::new(self.tool, self.color, self.brush_size, self.opacity)
    }

    /// Load from the platform's settings source. `Ok(None)` when nothing is
    /// stored.
    pub fn load() -> Result<Option<Self>, SettingsError> {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let storage = web_sys::window()
                    .and_then(|w| w.local_storage().ok().flatten())
                    .ok_or(SettingsError::Storage)?;
                match storage.get_item(STORAGE_KEY).map_err(|_| SettingsError::Storage)? {
                    Some(json) => Self::from_json(&json).map(Some),
                    None => Ok(None),
                }
            } else {
                let path = std::env::var_os(CONFIG_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                Self::load_from(&path)
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Result<Option<Self>, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SettingsError::Io { path: path.to_path_buf(), source }),
        }
    }

    /// [`Settings::load`], logging and replacing failures with defaults.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(Some(settings)) => {
                log::info!("settings loaded");
                settings
            }
            Ok(None) => Self::default(),
            Err(e) => {
                log::error!("{e}; using default settings");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings = Settings::from_json(r##"{ "tool": "marker", "color": "#ff0000" }"##).unwrap();
        assert_eq!(settings.tool, Tool::Marker);
        assert_eq!(settings.color, Color::rgb(255, 0, 0));
        assert_eq!(settings.brush_size, 8);
        assert_eq!(settings.history_capacity, 50);
        assert_eq!(settings.tesseract_program, "tesseract");
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            Settings::from_json(r#"{ "brush_size": 80 }"#),
            Err(SettingsError::Invalid { field: "brush_size", .. })
        ));
        assert!(matches!(
            Settings::from_json(r#"{ "export_quality": 0 }"#),
            Err(SettingsError::Invalid { field: "export_quality", .. })
        ));
        assert!(matches!(
            Settings::from_json(r#"{ "history_capacity": 0 }"#),
            Err(SettingsError::Invalid { field: "history_capacity", .. })
        ));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(Settings::from_json("{ tool: "), Err(SettingsError::Parse(_))));
        assert!(matches!(
            Settings::from_json(r#"{ "color": "white" }"#),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn json_roundtrip_keeps_values() {
        let settings = Settings {
            tool: Tool::Pen,
            export_format: ExportFormat::Jpeg,
            ..Settings::default()
        };
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"jpeg\""));
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn missing_file_is_none() {
        let path = std::env::temp_dir().join(format!("ocr-canvas-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(Settings::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn reads_file() {
        let path = std::env::temp_dir().join(format!("ocr-canvas-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "language": "deu" }"#).unwrap();
        let settings = Settings::load_from(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(settings.language, "deu");
        assert_eq!(settings.tool_settings(), ToolSettings::default());
    }
}
