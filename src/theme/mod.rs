//! Theme handling for Duoview
//!
//! Maps the `Theme` setting onto egui visuals and keeps them applied when the
//! user switches themes.

mod manager;

pub use manager::{ThemeManager, ACCENT};
