//! File system watcher for the previewed documents.
//!
//! Watches the parent directory of each open document (editors often save by
//! writing a temporary file and renaming it over the original, which a watch
//! on the file itself would lose) and reports changes to the documents only.

use crate::error::{Error, Result};
use log::{debug, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

/// File system events for a previewed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The document was written (or re-created)
    Modified(PathBuf),
    /// The document was deleted
    Removed(PathBuf),
    /// The watcher encountered an error
    Error(String),
}

/// Watches the documents shown in the preview panes.
pub struct DocumentWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<DocumentEvent>,
    /// Documents being reported on
    documents: Vec<PathBuf>,
    /// Directories currently registered with the watcher
    directories: Vec<PathBuf>,
}

impl DocumentWatcher {
    /// Create a watcher with nothing registered.
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();

        let watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                Self::handle_event(result, &tx);
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )
        .map_err(|e| Error::Application(format!("Failed to create file watcher: {}", e)))?;

        Ok(Self {
            watcher,
            receiver: rx,
            documents: Vec::new(),
            directories: Vec::new(),
        })
    }

    /// Replace the set of watched documents.
    pub fn set_documents(&mut self, documents: &[PathBuf]) {
        for dir in self.directories.drain(..) {
            if let Err(e) = self.watcher.unwatch(&dir) {
                debug!("Failed to unwatch {}: {}", dir.display(), e);
            }
        }

        self.documents = documents.iter().map(|p| normalize(p)).collect();

        let mut directories: Vec<PathBuf> = self
            .documents
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        directories.sort();
        directories.dedup();

        for dir in directories {
            match self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => self.directories.push(dir),
                Err(e) => warn!("Failed to watch {}: {}", dir.display(), e),
            }
        }
    }

    /// Handle a raw notify event and convert to DocumentEvent.
    fn handle_event(result: std::result::Result<Event, notify::Error>, tx: &Sender<DocumentEvent>) {
        match result {
            Ok(event) => {
                for path in event.paths {
                    let document_event = match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) => {
                            Some(DocumentEvent::Modified(path))
                        }
                        EventKind::Remove(_) => Some(DocumentEvent::Removed(path)),
                        _ => None,
                    };

                    if let Some(evt) = document_event {
                        let _ = tx.send(evt);
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(DocumentEvent::Error(e.to_string()));
            }
        }
    }

    /// Poll for pending document events.
    ///
    /// Returns the coalesced events for watched documents since the last poll.
    /// This is non-blocking.
    pub fn poll_events(&self) -> Vec<DocumentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        coalesce_events(events, &self.documents)
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Keep only events for `documents`, at most one per document.
///
/// A save usually produces a burst of create/modify events; the last event
/// for a document wins. Errors always pass through.
pub fn coalesce_events(events: Vec<DocumentEvent>, documents: &[PathBuf]) -> Vec<DocumentEvent> {
    let mut out: Vec<DocumentEvent> = Vec::new();

    for event in events {
        let path = match &event {
            DocumentEvent::Modified(p) | DocumentEvent::Removed(p) => p,
            DocumentEvent::Error(_) => {
                out.push(event);
                continue;
            }
        };

        if !documents.iter().any(|d| d == path) {
            continue;
        }

        let path = path.clone();
        out.retain(|existing| match existing {
            DocumentEvent::Modified(p) | DocumentEvent::Removed(p) => *p != path,
            DocumentEvent::Error(_) => true,
        });
        out.push(event);
    }

    out
}
