//! Native file dialog integration using the rfd crate

use crate::preview::Pane;
use rfd::FileDialog;
use std::path::{Path, PathBuf};

/// Extensions of documents that render as text previews.
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "text", "rst", "adoc"];

/// Title shown on the picker for a pane.
fn dialog_title(pane: Pane) -> String {
    format!("Open Document ({} Pane)", pane.label())
}

/// Opens a native file picker for the document shown in `pane`.
///
/// Returns `Some(PathBuf)` if a file was selected, `None` if cancelled.
pub fn open_document_dialog(pane: Pane, initial_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dialog = FileDialog::new()
        .set_title(dialog_title(pane))
        .add_filter("Documents", DOCUMENT_EXTENSIONS)
        .add_filter("All Files", &["*"]);

    if let Some(dir) = initial_dir {
        dialog = dialog.set_directory(dir);
    }

    dialog.pick_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_title_names_pane() {
        assert_eq!(dialog_title(Pane::Left), "Open Document (Left Pane)");
        assert_eq!(dialog_title(Pane::Right), "Open Document (Right Pane)");
    }
}
