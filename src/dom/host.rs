//! The host facilities a scroll synchronizer consumes.
//!
//! A host owns the element tree and the event loop. Instead of calling back
//! into closures, it hands [`HostEvent`]s to whoever registered for them; the
//! receiver then reacts with `&mut` access to the host.

use super::node::{ListenerId, NodeId, ObserverId, OverflowStyle, ScrollMetrics, TimerId};
use super::selector::Selector;
use crate::error::Result;
use std::time::Duration;

/// An event delivered by the host's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The scroll offset of `target` changed
    Scroll {
        listener: ListenerId,
        target: NodeId,
    },
    /// The tree changed structurally since the last record for this observer
    Mutation { observer: ObserverId },
    /// A timer became due
    Timer { timer: TimerId },
}

/// Element-tree, listener, observer and timer facilities.
pub trait ScrollHost {
    /// First descendant of `root` (document order, `root` excluded) matching `selector`.
    fn query_selector(&self, root: NodeId, selector: &Selector) -> Option<NodeId>;

    /// Computed overflow style, `None` if the node does not exist.
    fn computed_overflow(&self, node: NodeId) -> Option<OverflowStyle>;

    /// Scroll geometry, `None` if the node does not exist.
    fn scroll_metrics(&self, node: NodeId) -> Option<ScrollMetrics>;

    /// Jump (without animation) to the given scroll offset.
    fn set_scroll_top(&mut self, node: NodeId, top: f32) -> Result<()>;

    /// Register a passive scroll listener on `node`.
    fn add_scroll_listener(&mut self, node: NodeId) -> Result<ListenerId>;

    /// Remove a previously registered scroll listener.
    fn remove_scroll_listener(&mut self, listener: ListenerId) -> Result<()>;

    /// Observe structural changes anywhere in the document.
    fn observe_mutations(&mut self) -> ObserverId;

    /// Stop an observer. Unknown observers are ignored.
    fn disconnect_observer(&mut self, observer: ObserverId);

    /// Fire [`HostEvent::Timer`] every `period` until cleared.
    fn set_interval(&mut self, period: Duration) -> TimerId;

    /// Fire [`HostEvent::Timer`] once after `delay`.
    fn set_timeout(&mut self, delay: Duration) -> TimerId;

    /// Cancel a timer. Unknown or expired timers are ignored.
    fn clear_timer(&mut self, timer: TimerId);
}
