//! View tree module for Duoview
//!
//! This module provides the retained element tree that preview panes are
//! mounted into, along with the host facilities (selectors, overflow styles,
//! scroll metrics, scroll listeners, mutation observers and timers) that the
//! scroll synchronizer relies on.

#![allow(dead_code)]

mod document;
mod host;
mod node;
mod selector;

pub use document::Document;
pub use host::{HostEvent, ScrollHost};
pub use node::{ListenerId, NodeId, ObserverId, Overflow, ScrollMetrics, TimerId};
pub use selector::Selector;
