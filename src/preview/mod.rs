//! Preview synchronization module for Duoview
//!
//! This module keeps the two side-by-side document previews scrolled to the
//! same relative position, locating each preview's scrollable element at
//! runtime.

#![allow(dead_code)]

mod discovery;
mod sync_scroll;

pub use sync_scroll::{DualViewSync, Pane, SyncScrollConfig, SyncStatus};
