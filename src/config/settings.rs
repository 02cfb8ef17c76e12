//! User settings and preferences for Duoview
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options, with serde support for JSON persistence.

use crate::preview::{Pane, SyncScrollConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Theme Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Available color themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

impl Theme {
    /// Cycle Light -> Dark -> System -> Light.
    pub fn next(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::System,
            Theme::System => Theme::Light,
        }
    }

    /// Get a display label for the theme.
    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
            Theme::System => "System",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Window Size Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Window dimensions and position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Window width in pixels
    pub width: f32,
    /// Window height in pixels
    pub height: f32,
    /// Window X position (optional, for restoring position)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    /// Window Y position (optional, for restoring position)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    /// Whether the window was maximized
    #[serde(default)]
    pub maximized: bool,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1400.0,
            height: 900.0,
            x: None,
            y: None,
            maximized: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Documents that were open in each pane, for session restoration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneDocuments {
    /// Document in the left pane
    pub left: Option<PathBuf>,
    /// Document in the right pane
    pub right: Option<PathBuf>,
}

impl PaneDocuments {
    /// Document for a pane.
    pub fn get(&self, pane: Pane) -> Option<&PathBuf> {
        match pane {
            Pane::Left => self.left.as_ref(),
            Pane::Right => self.right.as_ref(),
        }
    }

    /// Set the document for a pane.
    pub fn set(&mut self, pane: Pane, path: Option<PathBuf>) {
        match pane {
            Pane::Left => self.left = path,
            Pane::Right => self.right = path,
        }
    }

    /// Exchange left and right.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// User preferences and application settings.
///
/// This struct is serialized to JSON and persisted to the user's config directory.
/// All fields have sensible defaults via the `Default` trait and `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Appearance
    // ─────────────────────────────────────────────────────────────────────────
    /// Color theme (light, dark, or system)
    pub theme: Theme,

    /// Font size for preview text (in points)
    pub font_size: f32,

    // ─────────────────────────────────────────────────────────────────────────
    // Session & History
    // ─────────────────────────────────────────────────────────────────────────
    /// Recently opened documents (most recent first)
    pub recent_documents: Vec<PathBuf>,

    /// Maximum number of recent documents to remember
    pub max_recent_documents: usize,

    /// Documents open in each pane when the app was last closed
    pub open_documents: PaneDocuments,

    /// Directory the open dialog starts in
    pub last_open_directory: Option<PathBuf>,

    /// Whether to reload previews when their files change on disk
    pub watch_documents: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Window State
    // ─────────────────────────────────────────────────────────────────────────
    /// Window size and position
    pub window_size: WindowSize,

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Scrolling
    // ─────────────────────────────────────────────────────────────────────────
    /// Synchronized scrolling between the two previews
    pub sync_scroll: SyncScrollConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Appearance
            theme: Theme::default(),
            font_size: 14.0,

            // Session & History
            recent_documents: Vec::new(),
            max_recent_documents: 10,
            open_documents: PaneDocuments::default(),
            last_open_directory: None,
            watch_documents: true,

            // Window State
            window_size: WindowSize::default(),

            // Sync Scrolling
            sync_scroll: SyncScrollConfig::default(),
        }
    }
}

impl Settings {
    /// Add a document to the recent documents list.
    ///
    /// If the document already exists in the list, it's moved to the front.
    /// The list is trimmed to `max_recent_documents`.
    pub fn add_recent_document(&mut self, path: PathBuf) {
        self.recent_documents.retain(|p| p != &path);
        self.recent_documents.insert(0, path);
        self.recent_documents.truncate(self.max_recent_documents);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum allowed font size.
    pub const MIN_FONT_SIZE: f32 = 8.0;
    /// Maximum allowed font size.
    pub const MAX_FONT_SIZE: f32 = 72.0;
    /// Minimum window dimension.
    pub const MIN_WINDOW_SIZE: f32 = 200.0;
    /// Maximum window dimension.
    pub const MAX_WINDOW_SIZE: f32 = 10000.0;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.font_size = self
            .font_size
            .clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);

        self.window_size.width = self
            .window_size
            .width
            .clamp(Self::MIN_WINDOW_SIZE, Self::MAX_WINDOW_SIZE);
        self.window_size.height = self
            .window_size
            .height
            .clamp(Self::MIN_WINDOW_SIZE, Self::MAX_WINDOW_SIZE);

        if self.max_recent_documents == 0 {
            self.max_recent_documents = 10;
        } else if self.max_recent_documents > 100 {
            self.max_recent_documents = 100;
        }
        self.recent_documents.truncate(self.max_recent_documents);

        self.sync_scroll.sanitize();
    }

    /// Load settings and sanitize them to ensure validity.
    ///
    /// This is a convenience method that deserializes and then sanitizes.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.font_size, 14.0);
        assert!(settings.recent_documents.is_empty());
        assert_eq!(settings.max_recent_documents, 10);
        assert!(settings.watch_documents);
        assert!(settings.sync_scroll.enabled);
        assert_eq!(settings.sync_scroll.max_retries, 10);
        assert_eq!(settings.open_documents, PaneDocuments::default());
    }

    #[test]
    fn test_add_recent_document() {
        let mut settings = Settings::default();
        settings.max_recent_documents = 3;

        settings.add_recent_document(PathBuf::from("/a.md"));
        settings.add_recent_document(PathBuf::from("/b.md"));
        settings.add_recent_document(PathBuf::from("/c.md"));
        assert_eq!(settings.recent_documents[0], PathBuf::from("/c.md"));

        // Existing document moves to front
        settings.add_recent_document(PathBuf::from("/a.md"));
        assert_eq!(settings.recent_documents[0], PathBuf::from("/a.md"));
        assert_eq!(settings.recent_documents.len(), 3);

        // New document trims the oldest
        settings.add_recent_document(PathBuf::from("/d.md"));
        assert_eq!(settings.recent_documents.len(), 3);
        assert!(!settings.recent_documents.contains(&PathBuf::from("/b.md")));
    }

    #[test]
    fn test_pane_documents_swap() {
        let mut docs = PaneDocuments::default();
        docs.set(Pane::Left, Some(PathBuf::from("/old.pdf.txt")));
        docs.set(Pane::Right, Some(PathBuf::from("/new.txt")));
        docs.swap();
        assert_eq!(docs.get(Pane::Left), Some(&PathBuf::from("/new.txt")));
        assert_eq!(docs.get(Pane::Right), Some(&PathBuf::from("/old.pdf.txt")));
    }

    #[test]
    fn test_theme_serialization() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        assert_eq!(
            serde_json::from_str::<Theme>("\"system\"").unwrap(),
            Theme::System
        );
    }

    #[test]
    fn test_theme_cycle() {
        assert_eq!(Theme::Light.next(), Theme::Dark);
        assert_eq!(Theme::Dark.next(), Theme::System);
        assert_eq!(Theme::System.next(), Theme::Light);
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let mut original = Settings::default();
        original.open_documents.left = Some(PathBuf::from("/docs/v1.md"));
        original.sync_scroll.guard_release_ms = 150;

        let json = serde_json::to_string_pretty(&original).unwrap();
        let deserialized: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_settings_deserialize_empty_json() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_deserialize_nested_partial() {
        let json = r#"{"sync_scroll": {"enabled": false}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert!(!settings.sync_scroll.enabled);
        assert_eq!(settings.sync_scroll.retry_interval_ms, 200);
    }

    #[test]
    fn test_sanitize_font_size() {
        let mut settings = Settings::default();
        settings.font_size = 4.0;
        settings.sanitize();
        assert_eq!(settings.font_size, Settings::MIN_FONT_SIZE);

        settings.font_size = 100.0;
        settings.sanitize();
        assert_eq!(settings.font_size, Settings::MAX_FONT_SIZE);
    }

    #[test]
    fn test_sanitize_recent_documents() {
        let mut settings = Settings::default();
        settings.max_recent_documents = 2;
        settings.recent_documents = vec![
            PathBuf::from("/1.md"),
            PathBuf::from("/2.md"),
            PathBuf::from("/3.md"),
        ];
        settings.sanitize();
        assert_eq!(settings.recent_documents.len(), 2);
    }

    #[test]
    fn test_from_json_sanitized_clamps_sync_config() {
        let json = r#"{"sync_scroll": {"max_retries": 0, "retry_interval_ms": 0}}"#;
        let settings = Settings::from_json_sanitized(json).unwrap();
        assert_eq!(settings.sync_scroll.max_retries, SyncScrollConfig::MIN_RETRIES);
        assert_eq!(
            settings.sync_scroll.retry_interval_ms,
            SyncScrollConfig::MIN_RETRY_INTERVAL_MS
        );
    }
}
