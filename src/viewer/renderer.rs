//! Asynchronous document preview rendering.
//!
//! Documents are read and split into display blocks on a background thread.
//! The UI thread polls for finished jobs and mounts them into the pane's
//! container, so a pane's scrollable region appears some time after the pane
//! itself exists.

use crate::dom::{Document, NodeId, Overflow};
use crate::error::{Error, Result};
use crate::preview::Pane;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// Class of the outer preview wrapper.
pub const PREVIEW_CLASS: &str = "document-preview";
/// Class of the viewer component wrapper.
pub const VIEWER_CLASS: &str = "preview-viewer";
/// Class of the embed element whose first child scrolls.
pub const EMBED_CLASS: &str = "preview-embed";
/// Class of a rendered block.
pub const BLOCK_CLASS: &str = "preview-block";

// ─────────────────────────────────────────────────────────────────────────────
// Rendered Document
// ─────────────────────────────────────────────────────────────────────────────

/// A document split into display blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    /// Source file
    pub path: PathBuf,
    /// File name for the pane header
    pub title: String,
    /// Paragraph-sized blocks in document order
    pub blocks: Vec<String>,
}

impl RenderedDocument {
    /// Split text into blocks separated by blank lines.
    pub fn from_text(path: &Path, text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line.trim_end());
            }
        }
        if !current.is_empty() {
            blocks.push(current.join("\n"));
        }

        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            path: path.to_path_buf(),
            title,
            blocks,
        }
    }

    /// Whether the document has no visible content.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Read and render a document from disk.
pub fn load_document(path: &Path) -> Result<RenderedDocument> {
    let bytes = fs::read(path).map_err(|e| Error::DocumentLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(RenderedDocument::from_text(path, &text))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mounting
// ─────────────────────────────────────────────────────────────────────────────

/// Element handles of a preview mounted into a pane container.
#[derive(Debug, Clone, PartialEq)]
pub struct MountedPreview {
    /// The element that owns the scrollbar
    pub scroller: NodeId,
    /// One element per rendered block
    pub blocks: Vec<NodeId>,
}

/// Replace the contents of `container` with the rendered document.
///
/// Produces `.document-preview > .preview-viewer > .preview-embed > div`,
/// with one `.preview-block` per block inside the innermost `div`. Sizes are
/// left at zero until the pane has been laid out.
pub fn mount_preview(
    doc: &mut Document,
    container: NodeId,
    rendered: &RenderedDocument,
) -> Result<MountedPreview> {
    doc.clear_children(container)?;

    let preview = doc.element("div", &[PREVIEW_CLASS]);
    let viewer = doc.element("div", &[VIEWER_CLASS]);
    let embed = doc.element("div", &[EMBED_CLASS]);
    let scroller = doc.create_element("div");
    doc.set_overflow_y(scroller, Some(Overflow::Auto))?;

    let mut blocks = Vec::with_capacity(rendered.blocks.len());
    for _ in &rendered.blocks {
        let block = doc.element("div", &[BLOCK_CLASS]);
        doc.append_child(scroller, block)?;
        blocks.push(block);
    }

    doc.append_child(embed, scroller)?;
    doc.append_child(viewer, embed)?;
    doc.append_child(preview, viewer)?;
    // Attach last so observers see one structural change
    doc.append_child(container, preview)?;

    debug!(
        "Mounted '{}' ({} blocks) into {}",
        rendered.title,
        blocks.len(),
        container
    );
    Ok(MountedPreview { scroller, blocks })
}

// ─────────────────────────────────────────────────────────────────────────────
// Background Renderer
// ─────────────────────────────────────────────────────────────────────────────

/// A finished render job.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Pane the document was requested for
    pub pane: Pane,
    /// The rendered document or the load error
    pub result: Result<RenderedDocument>,
}

struct RenderJob {
    pane: Pane,
    generation: u64,
    result: Result<RenderedDocument>,
}

/// Renders documents off the UI thread.
///
/// Only the newest request per pane is delivered; results of superseded
/// requests are dropped.
pub struct PreviewRenderer {
    sender: Sender<RenderJob>,
    receiver: Receiver<RenderJob>,
    generations: [u64; 2],
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewRenderer {
    /// Create a renderer with no jobs in flight.
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            generations: [0; 2],
        }
    }

    /// Start rendering `path` for `pane`.
    pub fn request(&mut self, pane: Pane, path: PathBuf) {
        let slot = &mut self.generations[pane.index()];
        *slot += 1;
        let generation = *slot;
        let sender = self.sender.clone();

        info!("Rendering {} pane: {}", pane.label(), path.display());
        let spawned = thread::Builder::new()
            .name(format!("render-{}", pane.label().to_lowercase()))
            .spawn(move || {
                let result = load_document(&path);
                let _ = sender.send(RenderJob {
                    pane,
                    generation,
                    result,
                });
            });

        if let Err(e) = spawned {
            warn!("Failed to start render thread: {}", e);
        }
    }

    /// Latest request generation for `pane`.
    pub fn generation(&self, pane: Pane) -> u64 {
        self.generations[pane.index()]
    }

    /// Collect finished jobs. Non-blocking.
    pub fn poll(&self) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(job) = self.receiver.try_recv() {
            if job.generation != self.generations[job.pane.index()] {
                debug!("Dropping superseded render for {} pane", job.pane.label());
                continue;
            }
            outcomes.push(RenderOutcome {
                pane: job.pane,
                result: job.result,
            });
        }
        outcomes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
