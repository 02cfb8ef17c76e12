//! Application state management for Duoview
//!
//! This module owns everything the window shows: the view tree both previews
//! are mounted into, the per-pane document state, the background renderer,
//! the file watcher and the scroll synchronizer. It is independent of egui so
//! the whole load -> mount -> discover -> sync pipeline can be tested.

use crate::config::{load_config, save_config_silent, Settings};
use crate::dom::{Document, NodeId};
use crate::preview::{DualViewSync, Pane, SyncStatus};
use crate::viewer::{
    mount_preview, DocumentEvent, DocumentWatcher, MountedPreview, PreviewRenderer,
    RenderedDocument,
};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Class of the element holding both panes.
const LAYOUT_CLASS: &str = "compare-layout";
/// Class of each pane container.
const PANE_CLASS: &str = "preview-pane";

// ─────────────────────────────────────────────────────────────────────────────
// Pane State
// ─────────────────────────────────────────────────────────────────────────────

/// What a pane currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PaneContent {
    /// No document opened
    Empty,
    /// Document requested, renderer still working
    Loading(PathBuf),
    /// Document rendered and mounted
    Ready {
        rendered: RenderedDocument,
        mounted: MountedPreview,
    },
    /// Loading failed
    Failed { path: PathBuf, message: String },
}

/// One preview pane.
#[derive(Debug, Clone)]
pub struct PaneState {
    /// Container element, present from startup
    pub container: NodeId,
    /// Current content
    pub content: PaneContent,
}

impl PaneState {
    fn new(container: NodeId) -> Self {
        Self {
            container,
            content: PaneContent::Empty,
        }
    }

    /// Path of the document shown or being loaded.
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.content {
            PaneContent::Empty => None,
            PaneContent::Loading(path) | PaneContent::Failed { path, .. } => Some(path),
            PaneContent::Ready { rendered, .. } => Some(&rendered.path),
        }
    }

    /// Header text for the pane.
    pub fn title(&self) -> String {
        match &self.content {
            PaneContent::Empty => "No document".to_string(),
            PaneContent::Ready { rendered, .. } => rendered.title.clone(),
            PaneContent::Loading(path) | PaneContent::Failed { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// The scrollable element of the mounted preview.
    pub fn scroller(&self) -> Option<NodeId> {
        match &self.content {
            PaneContent::Ready { mounted, .. } => Some(mounted.scroller),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

/// Central application state.
pub struct AppState {
    /// User settings
    pub settings: Settings,
    /// The view tree both previews live in
    document: Document,
    panes: [PaneState; 2],
    renderer: PreviewRenderer,
    watcher: Option<DocumentWatcher>,
    sync: Option<DualViewSync>,
}

impl AppState {
    /// Create state from the persisted configuration.
    pub fn new() -> Self {
        Self::with_settings(load_config())
    }

    /// Create state with the given settings, restoring the last documents.
    pub fn with_settings(settings: Settings) -> Self {
        let mut document = Document::new();
        let layout = document.element("div", &[LAYOUT_CLASS]);
        let left = document.element("div", &[PANE_CLASS, "left"]);
        let right = document.element("div", &[PANE_CLASS, "right"]);

        // Freshly created elements under body cannot fail to attach
        for (parent, child) in [(document.body(), layout), (layout, left), (layout, right)] {
            if let Err(e) = document.append_child(parent, child) {
                warn!("Failed to build pane layout: {}", e);
            }
        }

        let watcher = if settings.watch_documents {
            match DocumentWatcher::new() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Document watching disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut state = Self {
            settings,
            document,
            panes: [PaneState::new(left), PaneState::new(right)],
            renderer: PreviewRenderer::new(),
            watcher,
            sync: None,
        };

        for pane in Pane::ALL {
            if let Some(path) = state.settings.open_documents.get(pane).cloned() {
                if path.exists() {
                    state.request_render(pane, path);
                } else {
                    debug!("Skipping missing session document {}", path.display());
                    state.settings.open_documents.set(pane, None);
                }
            }
        }
        state.documents_changed();
        state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// A pane's state.
    pub fn pane(&self, pane: Pane) -> &PaneState {
        &self.panes[pane.index()]
    }

    /// The view tree.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current synchronizer state, `TornDown` when none is running.
    pub fn sync_status(&self) -> SyncStatus {
        self.sync
            .as_ref()
            .map(DualViewSync::status)
            .unwrap_or(SyncStatus::TornDown)
    }

    /// Failed discovery attempts of the running synchronizer.
    pub fn sync_attempts(&self) -> u32 {
        self.sync.as_ref().map(DualViewSync::attempts).unwrap_or(0)
    }

    /// Whether any pane is still waiting for its renderer.
    pub fn is_loading(&self) -> bool {
        self.panes
            .iter()
            .any(|p| matches!(p.content, PaneContent::Loading(_)))
    }

    /// Whether timers or queued work need the frame loop to keep running.
    pub fn needs_tick(&self) -> bool {
        self.is_loading() || self.document.timer_count() > 0
    }

    /// Current scroll offset of a pane's preview.
    pub fn scroll_offset(&self, pane: Pane) -> f32 {
        self.pane(pane)
            .scroller()
            .and_then(|node| self.document.node(node))
            .map(|node| node.metrics().scroll_top)
            .unwrap_or(0.0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a document in a pane.
    pub fn open_document(&mut self, pane: Pane, path: PathBuf) {
        if let Some(dir) = path.parent() {
            self.settings.last_open_directory = Some(dir.to_path_buf());
        }
        self.settings.add_recent_document(path.clone());
        self.settings.open_documents.set(pane, Some(path.clone()));
        self.request_render(pane, path);
        self.documents_changed();
    }

    /// Exchange the documents of both panes.
    pub fn swap_documents(&mut self) {
        self.settings.open_documents.swap();
        for pane in Pane::ALL {
            match self.settings.open_documents.get(pane).cloned() {
                Some(path) => self.request_render(pane, path),
                None => self.clear_pane(pane),
            }
        }
        self.documents_changed();
    }

    /// Unmount the pane's current preview and start loading `path`.
    ///
    /// The synchronizer is bound to the old preview's elements, so it is
    /// stopped first; callers restart it once the pane state is settled.
    fn request_render(&mut self, pane: Pane, path: PathBuf) {
        self.unmount(pane);
        self.panes[pane.index()].content = PaneContent::Loading(path.clone());
        self.renderer.request(pane, path);
    }

    fn clear_pane(&mut self, pane: Pane) {
        self.unmount(pane);
        self.panes[pane.index()].content = PaneContent::Empty;
    }

    fn unmount(&mut self, pane: Pane) {
        self.stop_sync();
        let container = self.panes[pane.index()].container;
        if let Err(e) = self.document.clear_children(container) {
            warn!("Failed to clear {} pane: {}", pane.label(), e);
        }
    }

    /// Refresh the watcher and restart synchronization after a pane's
    /// document changed.
    fn documents_changed(&mut self) {
        if let Some(watcher) = &mut self.watcher {
            let paths: Vec<PathBuf> = self.panes.iter().filter_map(|p| p.path().cloned()).collect();
            watcher.set_documents(&paths);
        }
        self.restart_sync();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronization
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn synchronized scrolling on or off.
    pub fn set_sync_enabled(&mut self, enabled: bool) {
        self.settings.sync_scroll.enabled = enabled;
        self.restart_sync();
    }

    /// Tear down the current synchronizer and, when enabled and both panes
    /// have a document, start a new one over the pane containers.
    pub fn restart_sync(&mut self) {
        self.stop_sync();

        let both_open = self
            .panes
            .iter()
            .all(|p| !matches!(p.content, PaneContent::Empty | PaneContent::Failed { .. }));
        if !self.settings.sync_scroll.enabled || !both_open {
            return;
        }

        let left = self.panes[0].container;
        let right = self.panes[1].container;
        self.sync = Some(DualViewSync::new(
            &mut self.document,
            left,
            right,
            &self.settings.sync_scroll,
        ));
    }

    fn stop_sync(&mut self) {
        if let Some(mut sync) = self.sync.take() {
            sync.teardown(&mut self.document);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame Loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Mount finished renders and react to file changes.
    pub fn poll_background(&mut self) {
        for outcome in self.renderer.poll() {
            let pane = outcome.pane;
            let container = self.panes[pane.index()].container;
            match outcome.result {
                Ok(rendered) => match mount_preview(&mut self.document, container, &rendered) {
                    Ok(mounted) => {
                        info!(
                            "{} pane ready: {} ({} blocks)",
                            pane.label(),
                            rendered.title,
                            rendered.blocks.len()
                        );
                        self.panes[pane.index()].content = PaneContent::Ready { rendered, mounted };
                    }
                    Err(e) => {
                        warn!("Failed to mount {} pane: {}", pane.label(), e);
                        self.panes[pane.index()].content = PaneContent::Failed {
                            path: rendered.path,
                            message: e.to_string(),
                        };
                    }
                },
                Err(e) => {
                    warn!("{}", e);
                    let path = self.panes[pane.index()].path().cloned().unwrap_or_default();
                    self.panes[pane.index()].content = PaneContent::Failed {
                        path,
                        message: e.to_string(),
                    };
                    self.stop_sync();
                }
            }
        }

        let events = self
            .watcher
            .as_ref()
            .map(DocumentWatcher::poll_events)
            .unwrap_or_default();
        for event in events {
            self.handle_document_event(event);
        }
    }

    /// React to a change of a previewed file on disk.
    fn handle_document_event(&mut self, event: DocumentEvent) {
        match event {
            DocumentEvent::Modified(path) => {
                let mut reloaded = false;
                for pane in Pane::ALL {
                    if self.matches_document(pane, &path) {
                        info!("{} changed on disk, reloading", path.display());
                        self.request_render(pane, path.clone());
                        reloaded = true;
                    }
                }
                if reloaded {
                    self.restart_sync();
                }
            }
            DocumentEvent::Removed(path) => {
                debug!("{} was removed, keeping last render", path.display());
            }
            DocumentEvent::Error(message) => warn!("Document watcher error: {}", message),
        }
    }

    fn matches_document(&self, pane: Pane, path: &Path) -> bool {
        self.pane(pane).path().is_some_and(|p| {
            p == path || p.canonicalize().map(|c| &c == path).unwrap_or(false)
        })
    }

    /// Run the view tree's event loop up to `now`, feeding the synchronizer.
    pub fn tick(&mut self, now: Duration) {
        let sync = &mut self.sync;
        self.document.advance_to(now, |doc, event| {
            if let Some(sync) = sync.as_mut() {
                sync.handle_event(doc, &event);
            }
        });
    }

    /// Record the laid-out size of a pane's preview.
    pub fn update_layout(&mut self, pane: Pane, client_height: f32, content_height: f32) {
        let Some(scroller) = self.pane(pane).scroller() else {
            return;
        };
        if let Err(e) = self
            .document
            .set_size(scroller, client_height, content_height)
        {
            debug!("Layout update for {} pane failed: {}", pane.label(), e);
        }
    }

    /// Record a scroll performed by the user in a pane.
    pub fn user_scrolled(&mut self, pane: Pane, offset: f32) {
        let Some(scroller) = self.pane(pane).scroller() else {
            return;
        };
        if let Err(e) = self.document.scroll_to(scroller, offset) {
            debug!("Scroll in {} pane failed: {}", pane.label(), e);
        }
    }

    /// Tear down synchronization and persist settings.
    pub fn shutdown(&mut self) {
        self.stop_sync();
        save_config_silent(&self.settings);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn test_settings() -> Settings {
        Settings {
            watch_documents: false,
            ..Settings::default()
        }
    }

    fn write_doc(dir: &TempDir, name: &str, blocks: usize) -> PathBuf {
        let path = dir.path().join(name);
        let text: Vec<String> = (0..blocks).map(|i| format!("Block {}", i)).collect();
        fs::write(&path, text.join("\n\n")).unwrap();
        path
    }

    fn wait_until_loaded(state: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while state.is_loading() && Instant::now() < deadline {
            state.poll_background();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!state.is_loading(), "render did not finish in time");
    }

    #[test]
    fn test_initial_state_is_empty() {
        let state = AppState::with_settings(test_settings());
        for pane in Pane::ALL {
            assert_eq!(state.pane(pane).content, PaneContent::Empty);
            assert_eq!(state.pane(pane).title(), "No document");
        }
        assert_eq!(state.sync_status(), SyncStatus::TornDown);
        assert!(!state.needs_tick());
    }

    #[test]
    fn test_sync_waits_for_both_documents() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::with_settings(test_settings());

        state.open_document(Pane::Left, write_doc(&dir, "left.md", 40));
        assert_eq!(state.sync_status(), SyncStatus::TornDown);

        state.open_document(Pane::Right, write_doc(&dir, "right.md", 80));
        assert_eq!(state.sync_status(), SyncStatus::Discovering);
        assert_eq!(state.settings.recent_documents.len(), 2);
    }

    #[test]
    fn test_load_layout_and_sync_end_to_end() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::with_settings(test_settings());
        state.open_document(Pane::Left, write_doc(&dir, "left.md", 40));
        state.open_document(Pane::Right, write_doc(&dir, "right.md", 80));

        wait_until_loaded(&mut state);
        state.tick(Duration::from_millis(10));
        // Mounted but not laid out yet
        assert_eq!(state.sync_status(), SyncStatus::Discovering);

        state.update_layout(Pane::Left, 400.0, 1400.0);
        state.update_layout(Pane::Right, 400.0, 2400.0);
        state.tick(Duration::from_millis(250));
        assert_eq!(state.sync_status(), SyncStatus::Active);

        state.user_scrolled(Pane::Left, 500.0);
        state.tick(Duration::from_millis(260));
        assert!((state.scroll_offset(Pane::Right) - 1000.0).abs() < 0.5);
        assert_eq!(state.scroll_offset(Pane::Left), 500.0);
    }

    /// Open two documents, lay them out and wait until scrolling is mirrored.
    /// Leaves the view tree clock at 250 ms.
    fn synced_state(dir: &TempDir) -> (AppState, PathBuf) {
        let left = write_doc(dir, "left.md", 40);
        let mut state = AppState::with_settings(test_settings());
        state.open_document(Pane::Left, left.clone());
        state.open_document(Pane::Right, write_doc(dir, "right.md", 80));
        wait_until_loaded(&mut state);
        state.update_layout(Pane::Left, 400.0, 1400.0);
        state.update_layout(Pane::Right, 400.0, 2400.0);
        state.tick(Duration::from_millis(250));
        assert_eq!(state.sync_status(), SyncStatus::Active);
        (state, left)
    }

    /// Finish loading the left pane again and check that sync reattaches to
    /// the newly mounted preview.
    fn assert_left_pane_resyncs(state: &mut AppState) {
        assert_eq!(state.sync_status(), SyncStatus::Discovering);
        assert_eq!(state.document().total_listeners(), 0);

        wait_until_loaded(state);
        state.tick(Duration::from_millis(300));
        state.update_layout(Pane::Left, 400.0, 1400.0);
        state.tick(Duration::from_millis(500));
        assert_eq!(state.sync_status(), SyncStatus::Active);
        assert_eq!(state.document().total_listeners(), 2);

        state.user_scrolled(Pane::Left, 500.0);
        state.tick(Duration::from_millis(510));
        assert!((state.scroll_offset(Pane::Right) - 1000.0).abs() < 0.5);
    }

    #[test]
    fn test_reopening_a_pane_rebinds_sync_to_new_preview() {
        let dir = TempDir::new().unwrap();
        let (mut state, _) = synced_state(&dir);

        state.open_document(Pane::Left, write_doc(&dir, "other.md", 40));
        assert!(matches!(state.pane(Pane::Left).content, PaneContent::Loading(_)));
        assert_left_pane_resyncs(&mut state);
    }

    #[test]
    fn test_reload_on_change_rebinds_sync_to_new_preview() {
        let dir = TempDir::new().unwrap();
        let (mut state, left) = synced_state(&dir);

        // Changes to files that are not shown leave sync alone
        state.handle_document_event(DocumentEvent::Modified(dir.path().join("unrelated.md")));
        assert_eq!(state.sync_status(), SyncStatus::Active);

        state.handle_document_event(DocumentEvent::Modified(left));
        assert!(matches!(state.pane(Pane::Left).content, PaneContent::Loading(_)));
        assert_left_pane_resyncs(&mut state);
    }

    #[test]
    fn test_disable_sync_tears_down() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::with_settings(test_settings());
        state.open_document(Pane::Left, write_doc(&dir, "a.md", 5));
        state.open_document(Pane::Right, write_doc(&dir, "b.md", 5));
        assert_eq!(state.sync_status(), SyncStatus::Discovering);

        state.set_sync_enabled(false);
        assert_eq!(state.sync_status(), SyncStatus::TornDown);
        assert_eq!(state.document().observer_count(), 0);
        assert_eq!(state.document().timer_count(), 0);

        state.set_sync_enabled(true);
        assert_eq!(state.sync_status(), SyncStatus::Discovering);
    }

    #[test]
    fn test_missing_file_marks_pane_failed() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::with_settings(test_settings());
        state.open_document(Pane::Left, write_doc(&dir, "a.md", 5));
        state.open_document(Pane::Right, dir.path().join("missing.md"));

        wait_until_loaded(&mut state);
        assert!(matches!(
            state.pane(Pane::Right).content,
            PaneContent::Failed { .. }
        ));
        assert_eq!(state.pane(Pane::Right).title(), "missing.md");
        assert_eq!(state.sync_status(), SyncStatus::TornDown);
    }

    #[test]
    fn test_swap_documents() {
        let dir = TempDir::new().unwrap();
        let left = write_doc(&dir, "left.md", 3);
        let right = write_doc(&dir, "right.md", 6);
        let mut state = AppState::with_settings(test_settings());
        state.open_document(Pane::Left, left.clone());
        state.open_document(Pane::Right, right.clone());

        state.swap_documents();
        wait_until_loaded(&mut state);
        assert_eq!(state.pane(Pane::Left).path(), Some(&right));
        assert_eq!(state.pane(Pane::Right).path(), Some(&left));
    }

    #[test]
    fn test_session_restore_skips_missing_documents() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings();
        settings.open_documents.left = Some(write_doc(&dir, "kept.md", 2));
        settings.open_documents.right = Some(dir.path().join("gone.md"));

        let state = AppState::with_settings(settings);
        assert!(matches!(state.pane(Pane::Left).content, PaneContent::Loading(_)));
        assert_eq!(state.pane(Pane::Right).content, PaneContent::Empty);
        assert!(state.settings.open_documents.right.is_none());
    }
}
