//! Element handles, styles and scroll metrics of the view tree.

use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle_type!(
    /// Handle to an element in a [`Document`](super::Document).
    NodeId,
    "node"
);
handle_type!(
    /// Handle to a registered scroll listener.
    ListenerId,
    "listener"
);
handle_type!(
    /// Handle to a subtree mutation observer.
    ObserverId,
    "observer"
);
handle_type!(
    /// Handle to a one-shot or repeating timer.
    TimerId,
    "timer"
);

// ─────────────────────────────────────────────────────────────────────────────
// Overflow Style
// ─────────────────────────────────────────────────────────────────────────────

/// Overflow policy of an element, as in CSS `overflow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Auto,
    Scroll,
}

impl Overflow {
    /// Whether this policy lets the user scroll overflowing content.
    pub fn allows_scroll(self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}

/// Computed overflow style: the shorthand plus the resolved vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverflowStyle {
    /// The `overflow` shorthand
    pub overflow: Overflow,
    /// The vertical axis (`overflow-y`), falls back to the shorthand when unset
    pub overflow_y: Overflow,
}

impl OverflowStyle {
    /// Style with the same policy on both the shorthand and the vertical axis.
    pub fn uniform(overflow: Overflow) -> Self {
        Self {
            overflow,
            overflow_y: overflow,
        }
    }

    /// Whether either the vertical axis or the shorthand permits scrolling.
    pub fn permits_vertical_scroll(&self) -> bool {
        self.overflow_y.allows_scroll() || self.overflow.allows_scroll()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scroll Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Vertical scroll geometry of an element, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Current scroll offset from the top
    pub scroll_top: f32,
    /// Total content height (never less than `client_height`)
    pub scroll_height: f32,
    /// Visible height
    pub client_height: f32,
}

impl ScrollMetrics {
    /// Whether the content is taller than the viewport.
    pub fn has_overflow(&self) -> bool {
        self.scroll_height > self.client_height
    }

    /// Largest reachable scroll offset.
    pub fn max_scroll_top(&self) -> f32 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    /// Relative scroll position in `0.0..=1.0`, or `None` without overflow.
    pub fn scroll_fraction(&self) -> Option<f32> {
        if !self.has_overflow() {
            return None;
        }
        Some((self.scroll_top / self.max_scroll_top()).clamp(0.0, 1.0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

/// A single element in the view tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Lower-case tag name (`div`, `section`, ...)
    pub tag: String,
    /// Class list in insertion order
    pub classes: Vec<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) overflow: Overflow,
    pub(crate) overflow_y: Option<Overflow>,
    pub(crate) client_height: f32,
    pub(crate) content_height: f32,
    pub(crate) scroll_top: f32,
}

impl Node {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            parent: None,
            children: Vec::new(),
            overflow: Overflow::Visible,
            overflow_y: None,
            client_height: 0.0,
            content_height: 0.0,
            scroll_top: 0.0,
        }
    }

    /// Whether the element carries the given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Parent element, `None` for the root or a detached element.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Computed overflow style.
    pub fn computed_overflow(&self) -> OverflowStyle {
        OverflowStyle {
            overflow: self.overflow,
            overflow_y: self.overflow_y.unwrap_or(self.overflow),
        }
    }

    /// Current scroll geometry.
    pub fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.content_height.max(self.client_height),
            client_height: self.client_height,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_allows_scroll() {
        assert!(Overflow::Auto.allows_scroll());
        assert!(Overflow::Scroll.allows_scroll());
        assert!(!Overflow::Visible.allows_scroll());
        assert!(!Overflow::Hidden.allows_scroll());
        assert!(!Overflow::Clip.allows_scroll());
    }

    #[test]
    fn test_computed_overflow_falls_back_to_shorthand() {
        let mut node = Node::new("DIV");
        assert_eq!(node.tag, "div");

        node.overflow = Overflow::Auto;
        assert_eq!(node.computed_overflow(), OverflowStyle::uniform(Overflow::Auto));

        node.overflow_y = Some(Overflow::Hidden);
        let style = node.computed_overflow();
        assert_eq!(style.overflow_y, Overflow::Hidden);
        // The shorthand alone still counts
        assert!(style.permits_vertical_scroll());
    }

    #[test]
    fn test_metrics_scroll_height_never_below_client() {
        let mut node = Node::new("div");
        node.client_height = 300.0;
        node.content_height = 100.0;
        let metrics = node.metrics();
        assert_eq!(metrics.scroll_height, 300.0);
        assert!(!metrics.has_overflow());
        assert_eq!(metrics.max_scroll_top(), 0.0);
        assert!(metrics.scroll_fraction().is_none());
    }

    #[test]
    fn test_scroll_fraction() {
        let metrics = ScrollMetrics {
            scroll_top: 250.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        };
        assert_eq!(metrics.max_scroll_top(), 1000.0);
        assert_eq!(metrics.scroll_fraction(), Some(0.25));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(NodeId(3).to_string(), "node#3");
        assert_eq!(TimerId(9).to_string(), "timer#9");
    }
}
