//! Scrollable element discovery inside preview containers.
//!
//! Preview renderers put their scrollbar at different depths, and some only
//! produce a scrollable region once content has loaded. Discovery walks an
//! ordered list of candidate selectors (most specific first) and finally the
//! container itself, returning the first element that actually scrolls.

use crate::dom::{NodeId, ScrollHost, Selector};
use log::{debug, warn};

/// Candidate selectors tried in order before falling back to the container.
pub const DEFAULT_CANDIDATE_SELECTORS: &[&str] = &[
    ".preview-embed > div",
    ".preview-viewer",
    ".preview-embed",
    ".document-preview",
];

/// The default candidate list as owned strings (for settings).
pub fn default_candidate_selectors() -> Vec<String> {
    DEFAULT_CANDIDATE_SELECTORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Parse candidate selectors, skipping (and logging) invalid entries.
pub fn compile_selectors(sources: &[String]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Ignoring scroll container candidate: {}", e);
                None
            }
        })
        .collect()
}

/// Whether `node` has overflowing content and an overflow policy that scrolls.
pub fn is_scrollable<H: ScrollHost + ?Sized>(host: &H, node: NodeId) -> bool {
    let (Some(metrics), Some(style)) = (host.scroll_metrics(node), host.computed_overflow(node))
    else {
        return false;
    };
    metrics.has_overflow() && style.permits_vertical_scroll()
}

/// Find the element that owns the scrollbar inside `container`.
///
/// Only the first match of each selector is considered. Returns `None` when
/// nothing scrolls yet; callers retry later.
pub fn find_scrollable<H: ScrollHost + ?Sized>(
    host: &H,
    container: NodeId,
    candidates: &[Selector],
) -> Option<NodeId> {
    for selector in candidates {
        let Some(element) = host.query_selector(container, selector) else {
            continue;
        };
        if is_scrollable(host, element) {
            debug!("Using scroll container '{}' ({})", selector, element);
            return Some(element);
        }
        debug!(
            "Candidate '{}' ({}) matched but does not scroll: {:?}",
            selector,
            element,
            host.scroll_metrics(element)
        );
    }

    if is_scrollable(host, container) {
        debug!("Using container {} itself as scroll container", container);
        return Some(container);
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Overflow};

    fn defaults() -> Vec<Selector> {
        compile_selectors(&default_candidate_selectors())
    }

    /// container > .document-preview > .preview-viewer > .preview-embed > div
    fn mount(doc: &mut Document) -> (NodeId, [NodeId; 4]) {
        let container = doc.element("div", &["pane"]);
        let preview = doc.element("div", &["document-preview"]);
        let viewer = doc.element("div", &["preview-viewer"]);
        let embed = doc.element("div", &["preview-embed"]);
        let scroller = doc.create_element("div");
        doc.append_child(doc.body(), container).unwrap();
        doc.append_child(container, preview).unwrap();
        doc.append_child(preview, viewer).unwrap();
        doc.append_child(viewer, embed).unwrap();
        doc.append_child(embed, scroller).unwrap();
        (container, [preview, viewer, embed, scroller])
    }

    #[test]
    fn test_default_selectors_all_compile() {
        assert_eq!(defaults().len(), DEFAULT_CANDIDATE_SELECTORS.len());
    }

    #[test]
    fn test_compile_skips_invalid() {
        let sources = vec![".ok".to_string(), ".bad >".to_string(), "div".to_string()];
        let compiled = compile_selectors(&sources);
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[1].as_str(), "div");
    }

    #[test]
    fn test_is_scrollable_needs_overflow_and_policy() {
        let mut doc = Document::new();
        let node = doc.create_element("div");

        doc.set_size(node, 100.0, 500.0).unwrap();
        assert!(!is_scrollable(&doc, node), "visible overflow does not scroll");

        doc.set_overflow_y(node, Some(Overflow::Auto)).unwrap();
        assert!(is_scrollable(&doc, node));

        doc.set_size(node, 500.0, 100.0).unwrap();
        assert!(!is_scrollable(&doc, node), "no overflowing content");

        doc.set_size(node, 100.0, 500.0).unwrap();
        doc.set_overflow_y(node, Some(Overflow::Hidden)).unwrap();
        doc.set_overflow(node, Overflow::Scroll).unwrap();
        assert!(is_scrollable(&doc, node), "shorthand alone is enough");
    }

    #[test]
    fn test_prefers_most_specific_candidate() {
        let mut doc = Document::new();
        let (container, [preview, _, _, scroller]) = mount(&mut doc);
        for node in [preview, scroller] {
            doc.set_size(node, 100.0, 800.0).unwrap();
            doc.set_overflow_y(node, Some(Overflow::Auto)).unwrap();
        }

        assert_eq!(find_scrollable(&doc, container, &defaults()), Some(scroller));
    }

    #[test]
    fn test_skips_candidates_that_do_not_scroll() {
        let mut doc = Document::new();
        let (container, [_, viewer, embed, scroller]) = mount(&mut doc);
        // The inner wrapper has content but clips it
        doc.set_size(scroller, 100.0, 800.0).unwrap();
        doc.set_overflow(scroller, Overflow::Hidden).unwrap();
        doc.set_size(embed, 100.0, 800.0).unwrap();
        doc.set_overflow(embed, Overflow::Auto).unwrap();
        doc.set_size(viewer, 100.0, 100.0).unwrap();
        doc.set_overflow(viewer, Overflow::Auto).unwrap();

        assert_eq!(find_scrollable(&doc, container, &defaults()), Some(embed));
    }

    #[test]
    fn test_falls_back_to_container() {
        let mut doc = Document::new();
        let (container, _) = mount(&mut doc);
        doc.set_size(container, 100.0, 800.0).unwrap();
        doc.set_overflow_y(container, Some(Overflow::Scroll)).unwrap();

        assert_eq!(find_scrollable(&doc, container, &defaults()), Some(container));
    }

    #[test]
    fn test_nothing_scrollable_yet() {
        let mut doc = Document::new();
        let container = doc.element("div", &["pane"]);
        doc.append_child(doc.body(), container).unwrap();
        assert_eq!(find_scrollable(&doc, container, &defaults()), None);

        let (container, _) = mount(&mut doc);
        assert_eq!(find_scrollable(&doc, container, &defaults()), None);
    }

    #[test]
    fn test_only_first_match_per_selector() {
        let mut doc = Document::new();
        let container = doc.element("div", &["pane"]);
        let first = doc.element("div", &["preview-viewer"]);
        let second = doc.element("div", &["preview-viewer"]);
        doc.append_child(doc.body(), container).unwrap();
        doc.append_child(container, first).unwrap();
        doc.append_child(container, second).unwrap();
        doc.set_size(second, 100.0, 800.0).unwrap();
        doc.set_overflow(second, Overflow::Auto).unwrap();

        assert_eq!(find_scrollable(&doc, container, &defaults()), None);
    }
}
