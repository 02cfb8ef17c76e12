//! Settings for Duoview
//!
//! User preferences (theme, window, session documents, sync scrolling
//! tuning) and their JSON persistence in the platform config directory.

mod persistence;
mod settings;

pub use persistence::{load_config, save_config_silent};
pub use settings::{PaneDocuments, Settings, Theme, WindowSize};
