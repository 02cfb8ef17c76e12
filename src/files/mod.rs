//! Native file pickers for choosing which documents to compare.

mod dialogs;

pub use dialogs::open_document_dialog;
