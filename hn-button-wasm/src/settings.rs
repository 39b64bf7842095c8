//! Widget settings.
//!
//! Every field has a built-in default, so a host page only has to set what
//! it wants to change. In the browser the settings come from an optional
//! `window.HNConfig` object.

use serde::{Deserialize, Serialize};

/// Host serving the button frames when a placeholder has no `data-host`.
pub const DEFAULT_HOST: &str = "hn-button.herokuapp.com";

/// Class marking placeholder elements (and the frames replacing them).
pub const MARKER_CLASS: &str = "hn-button";

/// Configuration for widget construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Host used when a placeholder does not carry `data-host`.
    pub default_host: String,
    /// Class name that marks placeholders during a page scan.
    pub marker_class: String,
    /// Prefix of every generated instance id.
    pub id_prefix: String,
    /// Accessible title set on each frame.
    pub frame_title: String,
    /// Width in pixels until the frame reports its real width on `load`.
    pub initial_width: u32,
    /// Frame height for the default (horizontal) count layout.
    pub horizontal_height: u32,
    /// Frame height when `data-count="vertical"`.
    pub vertical_height: u32,
    /// Maximum level routed to the browser console.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_host: DEFAULT_HOST.to_string(),
            marker_class: MARKER_CLASS.to_string(),
            id_prefix: MARKER_CLASS.to_string(),
            frame_title: "Hacker News Button".to_string(),
            initial_width: 100,
            horizontal_height: 20,
            vertical_height: 62,
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string, filling gaps with defaults.
    pub fn from_json(json: &str) -> Result<Self, crate::WidgetError> {
        serde_json::from_str(json).map_err(|e| crate::WidgetError::Serialization(e.to_string()))
    }

    /// Frame height for a placeholder's count mode.
    pub fn frame_height(&self, vertical: bool) -> u32 {
        if vertical {
            self.vertical_height
        } else {
            self.horizontal_height
        }
    }

    /// `log_level` as a filter, falling back to `Warn` for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Warn)
    }
}
