//! Theme manager
//!
//! Tracks the selected theme and applies the matching egui `Visuals` only
//! when the selection (or, for `System`, the platform preference) changes.

use crate::config::Theme;
use eframe::egui::{Color32, Context, Rounding, Stroke, Visuals};
use log::debug;

/// Accent used for selection and the active sync indicator.
pub const ACCENT: Color32 = Color32::from_rgb(0x3b, 0x82, 0xf6);

/// Applies the selected theme to egui.
#[derive(Debug)]
pub struct ThemeManager {
    /// Selected theme
    current_theme: Theme,
    /// Set when visuals must be re-applied on the next frame
    needs_apply: bool,
    /// Last seen platform dark mode (System theme only)
    last_system_dark_mode: Option<bool>,
}

impl ThemeManager {
    /// Create a manager for `theme`; visuals are applied on first use.
    pub fn new(theme: Theme) -> Self {
        Self {
            current_theme: theme,
            needs_apply: true,
            last_system_dark_mode: None,
        }
    }

    /// The selected theme.
    pub fn current_theme(&self) -> Theme {
        self.current_theme
    }

    /// Select a theme.
    pub fn set_theme(&mut self, theme: Theme) {
        if theme != self.current_theme {
            self.current_theme = theme;
            self.needs_apply = true;
        }
    }

    /// Advance to the next theme and return it.
    pub fn cycle(&mut self) -> Theme {
        self.set_theme(self.current_theme.next());
        self.current_theme
    }

    /// Whether the next `apply_if_needed` will touch the context.
    pub fn needs_apply(&self) -> bool {
        self.needs_apply
    }

    /// Apply the current theme unconditionally.
    pub fn apply(&mut self, ctx: &Context) {
        let dark = match self.current_theme {
            Theme::Light => false,
            Theme::Dark => true,
            Theme::System => {
                let system_dark = ctx.style().visuals.dark_mode;
                self.last_system_dark_mode = Some(system_dark);
                system_dark
            }
        };
        ctx.set_visuals(create_visuals(dark));
        self.needs_apply = false;
        debug!("Applied theme: {:?}", self.current_theme);
    }

    /// Apply the theme if the selection or the platform preference changed.
    ///
    /// Returns `true` if the theme was applied.
    pub fn apply_if_needed(&mut self, ctx: &Context) -> bool {
        if self.current_theme == Theme::System {
            let system_dark = ctx.style().visuals.dark_mode;
            if self.last_system_dark_mode != Some(system_dark) {
                self.needs_apply = true;
            }
        }

        if self.needs_apply {
            self.apply(ctx);
            true
        } else {
            false
        }
    }
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

/// egui visuals for the light or dark palette.
fn create_visuals(dark: bool) -> Visuals {
    let mut visuals = if dark {
        Visuals::dark()
    } else {
        Visuals::light()
    };

    visuals.selection.stroke = Stroke::new(1.0, ACCENT);
    visuals.hyperlink_color = ACCENT;
    visuals.window_rounding = Rounding::same(6.0);
    visuals.widgets.noninteractive.rounding = Rounding::same(4.0);
    visuals.widgets.inactive.rounding = Rounding::same(4.0);
    visuals.widgets.hovered.rounding = Rounding::same(4.0);
    visuals.widgets.active.rounding = Rounding::same(4.0);
    if dark {
        visuals.panel_fill = Color32::from_rgb(0x1e, 0x1e, 0x22);
        visuals.extreme_bg_color = Color32::from_rgb(0x16, 0x16, 0x19);
    } else {
        visuals.panel_fill = Color32::from_rgb(0xfa, 0xfa, 0xfa);
        visuals.extreme_bg_color = Color32::WHITE;
    }
    visuals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_needs_apply() {
        let manager = ThemeManager::new(Theme::Dark);
        assert_eq!(manager.current_theme(), Theme::Dark);
        assert!(manager.needs_apply());
    }

    #[test]
    fn test_cycle_visits_all_themes() {
        let mut manager = ThemeManager::new(Theme::Light);
        assert_eq!(manager.cycle(), Theme::Dark);
        assert_eq!(manager.cycle(), Theme::System);
        assert_eq!(manager.cycle(), Theme::Light);
    }

    #[test]
    fn test_apply_clears_flag() {
        let ctx = Context::default();
        let mut manager = ThemeManager::new(Theme::Dark);
        assert!(manager.apply_if_needed(&ctx));
        assert!(ctx.style().visuals.dark_mode);
        assert!(!manager.apply_if_needed(&ctx));
    }

    #[test]
    fn test_setting_same_theme_is_noop() {
        let ctx = Context::default();
        let mut manager = ThemeManager::new(Theme::Light);
        manager.apply(&ctx);
        manager.set_theme(Theme::Light);
        assert!(!manager.needs_apply());
        manager.set_theme(Theme::Dark);
        assert!(manager.needs_apply());
    }

    #[test]
    fn test_visuals_match_mode() {
        assert!(create_visuals(true).dark_mode);
        assert!(!create_visuals(false).dark_mode);
    }

    #[test]
    fn test_accent_is_shared_with_the_app() {
        assert_eq!(create_visuals(true).selection.stroke.color, crate::theme::ACCENT);
        assert_eq!(create_visuals(false).hyperlink_color, crate::theme::ACCENT);
    }
}
