//! Main application module for Duoview
//!
//! This module implements the eframe App trait: it drives the background
//! renderer and the view tree clock every frame, and draws both previews as
//! egui scroll areas whose offsets are kept in step with the view tree.

use crate::config::WindowSize;
use crate::files::open_document_dialog;
use crate::preview::{Pane, SyncStatus};
use crate::state::{AppState, PaneContent, PaneState};
use crate::theme::{ThemeManager, ACCENT};
use eframe::egui;
use log::{debug, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Application name shown in the title bar.
const APP_NAME: &str = "Duoview";

/// Offsets closer than this are treated as unchanged.
const SCROLL_EPSILON: f32 = 0.5;

/// Frame interval while timers or renders are pending.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Keyboard shortcut actions, detected inside the input closure and run
/// after it returns.
#[derive(Debug, Clone, Copy)]
enum KeyboardAction {
    Open(Pane),
    Swap,
    ToggleSync,
    CycleTheme,
}

/// Layout and scroll position a pane reported this frame.
#[derive(Debug, Clone, Copy)]
struct PaneFrame {
    offset: f32,
    viewport_height: f32,
    content_height: f32,
}

/// What a pane's drawing produced.
#[derive(Debug, Default)]
struct PaneOutput {
    frame: Option<PaneFrame>,
    open_requested: bool,
}

/// The main application.
pub struct DuoviewApp {
    state: AppState,
    theme_manager: ThemeManager,
    start_time: Instant,
    last_window_size: Option<egui::Vec2>,
    last_window_pos: Option<egui::Pos2>,
}

impl DuoviewApp {
    /// Create the application, restoring settings and the last session.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        info!("Initializing {}", APP_NAME);

        let state = AppState::new();
        let mut theme_manager = ThemeManager::new(state.settings.theme);
        theme_manager.apply(&cc.egui_ctx);
        info!("Applied initial theme: {:?}", state.settings.theme);

        Self {
            state,
            theme_manager,
            start_time: Instant::now(),
            last_window_size: None,
            last_window_pos: None,
        }
    }

    /// "left | right - Duoview", or just the app name with nothing open.
    fn window_title(&self) -> String {
        let names: Vec<String> = Pane::ALL
            .iter()
            .filter(|pane| self.state.pane(**pane).path().is_some())
            .map(|pane| self.state.pane(*pane).title())
            .collect();
        if names.is_empty() {
            APP_NAME.to_string()
        } else {
            format!("{} - {}", names.join(" | "), APP_NAME)
        }
    }

    /// Track window size and position for persistence.
    fn update_window_state(&mut self, ctx: &egui::Context) {
        let Some(rect) = ctx.input(|i| i.viewport().outer_rect) else {
            return;
        };
        let size = rect.size();
        let pos = rect.min;

        let size_changed = self
            .last_window_size
            .map(|s| (s - size).length() > 1.0)
            .unwrap_or(true);
        let pos_changed = self
            .last_window_pos
            .map(|p| (p - pos).length() > 1.0)
            .unwrap_or(true);
        if !size_changed && !pos_changed {
            return;
        }

        self.last_window_size = Some(size);
        self.last_window_pos = Some(pos);
        let maximized = ctx.input(|i| i.viewport().maximized.unwrap_or(false));
        self.state.settings.window_size = WindowSize {
            width: size.x,
            height: size.y,
            x: Some(pos.x),
            y: Some(pos.y),
            maximized,
        };
        debug!(
            "Window state updated: {}x{} at ({}, {})",
            size.x, size.y, pos.x, pos.y
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_open(&mut self, pane: Pane) {
        let initial_dir = self.state.settings.last_open_directory.clone();
        if let Some(path) = open_document_dialog(pane, initial_dir.as_deref()) {
            info!("Opening {} in {} pane", path.display(), pane.label());
            self.state.open_document(pane, path);
        }
    }

    fn handle_toggle_sync(&mut self) {
        let enabled = !self.state.settings.sync_scroll.enabled;
        info!("Synchronized scrolling {}", if enabled { "on" } else { "off" });
        self.state.set_sync_enabled(enabled);
    }

    fn handle_cycle_theme(&mut self, ctx: &egui::Context) {
        let theme = self.theme_manager.cycle();
        self.theme_manager.apply(ctx);
        self.state.settings.theme = theme;
        info!("Theme cycled to: {:?}", theme);
    }

    /// Open dropped files: two files fill both panes, a single file goes to
    /// the first empty pane (or the right one when both are taken).
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let files: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .filter(|p| p.is_file())
                .collect()
        });

        match files.as_slice() {
            [] => {}
            [single] => {
                let pane = Pane::ALL
                    .into_iter()
                    .find(|pane| self.state.pane(*pane).path().is_none())
                    .unwrap_or(Pane::Right);
                self.state.open_document(pane, single.clone());
            }
            [left, right, ..] => {
                self.state.open_document(Pane::Left, left.clone());
                self.state.open_document(Pane::Right, right.clone());
            }
        }
    }

    fn handle_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        let action = ctx.input(|i| {
            let command = i.modifiers.command;
            // Ctrl+Shift+O: open right (check first since it's more specific)
            if command && i.modifiers.shift && i.key_pressed(egui::Key::O) {
                return Some(KeyboardAction::Open(Pane::Right));
            }
            if command && !i.modifiers.shift && i.key_pressed(egui::Key::O) {
                return Some(KeyboardAction::Open(Pane::Left));
            }
            if command && i.modifiers.shift && i.key_pressed(egui::Key::W) {
                return Some(KeyboardAction::Swap);
            }
            if command && i.modifiers.shift && i.key_pressed(egui::Key::L) {
                return Some(KeyboardAction::ToggleSync);
            }
            if command && i.modifiers.shift && i.key_pressed(egui::Key::T) {
                return Some(KeyboardAction::CycleTheme);
            }
            None
        });

        if let Some(action) = action {
            debug!("Keyboard shortcut: {:?}", action);
            match action {
                KeyboardAction::Open(pane) => self.handle_open(pane),
                KeyboardAction::Swap => self.state.swap_documents(),
                KeyboardAction::ToggleSync => self.handle_toggle_sync(),
                KeyboardAction::CycleTheme => self.handle_cycle_theme(ctx),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    fn render_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button("Open Left…")
                    .on_hover_text("Ctrl+O")
                    .clicked()
                {
                    self.handle_open(Pane::Left);
                }
                if ui
                    .button("Open Right…")
                    .on_hover_text("Ctrl+Shift+O")
                    .clicked()
                {
                    self.handle_open(Pane::Right);
                }
                if ui.button("⇄ Swap").on_hover_text("Ctrl+Shift+W").clicked() {
                    self.state.swap_documents();
                }

                ui.separator();

                let mut enabled = self.state.settings.sync_scroll.enabled;
                if ui
                    .checkbox(&mut enabled, "Sync scrolling")
                    .on_hover_text("Ctrl+Shift+L")
                    .changed()
                {
                    self.handle_toggle_sync();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = format!("Theme: {}", self.theme_manager.current_theme().label());
                    if ui.button(label).on_hover_text("Ctrl+Shift+T").clicked() {
                        self.handle_cycle_theme(ctx);
                    }
                });
            });
        });
    }

    fn render_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let status = self.state.sync_status();
                let text = if self.state.settings.sync_scroll.enabled {
                    status.label().to_string()
                } else {
                    "Off".to_string()
                };
                let color = match status {
                    SyncStatus::Active => ACCENT,
                    SyncStatus::Exhausted => ui.visuals().warn_fg_color,
                    _ => ui.visuals().weak_text_color(),
                };
                ui.label("Sync:");
                ui.colored_label(color, text);
                if status == SyncStatus::Discovering {
                    ui.weak(format!(
                        "(attempt {}/{})",
                        self.state.sync_attempts(),
                        self.state.settings.sync_scroll.max_retries
                    ));
                }

                for pane in Pane::ALL {
                    if let PaneContent::Failed { message, .. } = &self.state.pane(pane).content {
                        ui.separator();
                        ui.colored_label(ui.visuals().error_fg_color, message);
                    }
                }
            });
        });
    }

    /// Draw both panes and return what each reported.
    fn render_panes(&self, ctx: &egui::Context) -> [PaneOutput; 2] {
        let mut outputs = [PaneOutput::default(), PaneOutput::default()];
        let font_size = self.state.settings.font_size;
        let state = &self.state;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                for pane in Pane::ALL {
                    let i = pane.index();
                    outputs[i] = render_pane(
                        &mut columns[i],
                        pane,
                        state.pane(pane),
                        state.scroll_offset(pane),
                        font_size,
                    );
                }
            });
        });
        outputs
    }

    /// Feed egui's layout and any user scrolling back into the view tree.
    ///
    /// Returns `true` if a pane was scrolled.
    fn apply_pane_outputs(&mut self, outputs: [PaneOutput; 2]) -> bool {
        let mut scrolled = false;
        for (pane, output) in Pane::ALL.into_iter().zip(outputs) {
            if output.open_requested {
                self.handle_open(pane);
                continue;
            }
            let Some(frame) = output.frame else {
                continue;
            };
            let previous = self.state.scroll_offset(pane);
            self.state
                .update_layout(pane, frame.viewport_height, frame.content_height);
            if (frame.offset - previous).abs() > SCROLL_EPSILON {
                self.state.user_scrolled(pane, frame.offset);
                scrolled = true;
            }
        }
        scrolled
    }
}

/// Draw one pane: header plus preview body.
fn render_pane(
    ui: &mut egui::Ui,
    pane: Pane,
    state: &PaneState,
    offset: f32,
    font_size: f32,
) -> PaneOutput {
    let mut output = PaneOutput::default();

    ui.horizontal(|ui| {
        ui.strong(state.title());
        if let Some(path) = state.path() {
            ui.weak(path.parent().map(|p| p.display().to_string()).unwrap_or_default());
        }
    });
    ui.separator();

    match &state.content {
        PaneContent::Empty => {
            ui.centered_and_justified(|ui| {
                output.open_requested = ui
                    .button(format!("Open a document in the {} pane", pane.label().to_lowercase()))
                    .clicked();
            });
        }
        PaneContent::Loading(_) => {
            ui.centered_and_justified(|ui| {
                ui.spinner();
            });
        }
        PaneContent::Failed { message, .. } => {
            ui.colored_label(ui.visuals().error_fg_color, message);
        }
        PaneContent::Ready { rendered, .. } => {
            let scroll = egui::ScrollArea::vertical()
                .id_source(("preview", pane.label()))
                .auto_shrink([false, false])
                .vertical_scroll_offset(offset)
                .show(ui, |ui| {
                    if rendered.is_empty() {
                        ui.weak("(empty document)");
                    }
                    for block in &rendered.blocks {
                        ui.label(egui::RichText::new(block).size(font_size));
                        ui.add_space(font_size * 0.6);
                    }
                });

            output.frame = Some(PaneFrame {
                offset: scroll.state.offset.y,
                viewport_height: scroll.inner_rect.height(),
                content_height: scroll.content_size.y,
            });
        }
    }
    output
}

impl eframe::App for DuoviewApp {
    /// Called each time the UI needs repainting.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme_manager.apply_if_needed(ctx);
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.window_title()));
        self.update_window_state(ctx);

        self.handle_dropped_files(ctx);
        self.handle_keyboard_shortcuts(ctx);

        // Mount finished renders, then let the synchronizer see them
        self.state.poll_background();
        self.state.tick(self.start_time.elapsed());

        self.render_toolbar(ctx);
        self.render_status_bar(ctx);
        let outputs = self.render_panes(ctx);

        if self.apply_pane_outputs(outputs) {
            // Deliver the scroll now so the mirror moves on the next frame
            self.state.tick(self.start_time.elapsed());
            ctx.request_repaint();
        } else if self.state.needs_tick() {
            ctx.request_repaint_after(TICK_INTERVAL);
        }
    }

    /// Called when the application is about to close.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Application exiting");
        self.state.shutdown();
    }
}
