//! Document preview module for Duoview
//!
//! This module renders documents into the view tree on background threads
//! and watches the previewed files for changes on disk.

#![allow(dead_code)]

mod renderer;
mod watcher;

pub use renderer::{mount_preview, MountedPreview, PreviewRenderer, RenderedDocument};
pub use watcher::{DocumentEvent, DocumentWatcher};
