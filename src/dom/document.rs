//! In-memory retained view tree with a virtual clock.
//!
//! `Document` is the single-threaded host the preview panes are mounted into.
//! Everything that would be asynchronous in a browser (scroll events, mutation
//! records, timers) is queued and handed out in order by [`Document::poll_event`],
//! so the application drives it from its frame loop and tests drive it with
//! exact timings.

use super::host::{HostEvent, ScrollHost};
use super::node::{
    ListenerId, Node, NodeId, ObserverId, Overflow, OverflowStyle, ScrollMetrics, TimerId,
};
use super::selector::{Combinator, Compound, Selector};
use crate::error::{Error, Result};
use log::debug;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

/// Smallest allowed interval period, so a zero period cannot spin forever.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Scroll offsets closer than this are treated as unchanged.
const SCROLL_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    due: Duration,
    period: Option<Duration>,
}

/// The view tree, its listeners, observers and timers.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_handle: u64,
    now: Duration,
    listeners: BTreeMap<ListenerId, NodeId>,
    /// Observer -> whether a mutation record is pending
    observers: BTreeMap<ObserverId, bool>,
    timers: BTreeMap<TimerId, TimerEntry>,
    queue: VecDeque<HostEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the `body` element.
    pub fn new() -> Self {
        let body = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(body, Node::new("body"));
        Self {
            nodes,
            body,
            next_handle: 1,
            now: Duration::ZERO,
            listeners: BTreeMap::new(),
            observers: BTreeMap::new(),
            timers: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&node).ok_or(Error::NodeNotFound(node))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree Access
    // ─────────────────────────────────────────────────────────────────────────

    /// The root element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Look up an element.
    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(&node)
    }

    /// Whether the element exists (attached or detached).
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Whether the element is reachable from `body`.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.body {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// All descendants of `root` in document order, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&root) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Whether `node` matches `selector`, considering its full ancestor chain.
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        let Some(n) = self.nodes.get(&node) else {
            return false;
        };
        selector.subject().matches(&n.tag, &n.classes) && self.match_steps(n.parent, selector.steps())
    }

    fn match_steps(&self, start: Option<NodeId>, steps: &[(Combinator, Compound)]) -> bool {
        let Some(((combinator, compound), rest)) = steps.split_first() else {
            return true;
        };

        match combinator {
            Combinator::Child => start
                .and_then(|id| self.nodes.get(&id))
                .is_some_and(|n| compound.matches(&n.tag, &n.classes) && self.match_steps(n.parent, rest)),
            Combinator::Descendant => {
                let mut current = start;
                while let Some(id) = current {
                    let Some(n) = self.nodes.get(&id) else {
                        return false;
                    };
                    if compound.matches(&n.tag, &n.classes) && self.match_steps(n.parent, rest) {
                        return true;
                    }
                    current = n.parent;
                }
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_handle());
        self.nodes.insert(id, Node::new(tag));
        id
    }

    /// Create a detached element with the given classes.
    pub fn element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        let id = self.create_element(tag);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.classes = classes.iter().map(|c| c.to_string()).collect();
        }
        id
    }

    /// Add a class to an element. Class changes are not structural.
    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<()> {
        let n = self.node_mut(node)?;
        if !n.has_class(class) {
            n.classes.push(class.to_string());
        }
        Ok(())
    }

    /// Set the `overflow` shorthand.
    pub fn set_overflow(&mut self, node: NodeId, overflow: Overflow) -> Result<()> {
        self.node_mut(node)?.overflow = overflow;
        Ok(())
    }

    /// Set (or unset) `overflow-y`.
    pub fn set_overflow_y(&mut self, node: NodeId, overflow_y: Option<Overflow>) -> Result<()> {
        self.node_mut(node)?.overflow_y = overflow_y;
        Ok(())
    }

    /// Update the visible and content heights of an element.
    ///
    /// A shrinking scroll range clamps the offset, which fires a scroll event
    /// just like a browser does.
    pub fn set_size(&mut self, node: NodeId, client_height: f32, content_height: f32) -> Result<()> {
        let n = self.node_mut(node)?;
        n.client_height = client_height.max(0.0);
        n.content_height = content_height.max(0.0);
        let top = n.scroll_top;
        self.write_scroll_top(node, top)
    }

    /// Append `child` to `parent`, moving it if it already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.contains(parent) {
            return Err(Error::NodeNotFound(parent));
        }
        if !self.contains(child) {
            return Err(Error::NodeNotFound(child));
        }
        if child == self.body || self.is_inclusive_ancestor(child, parent) {
            return Err(Error::Application(format!(
                "Cannot append {} to its own descendant {}",
                child, parent
            )));
        }

        let was_connected = self.is_connected(child);
        self.detach(child);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }

        if was_connected || self.is_connected(parent) {
            self.record_mutation();
        }
        Ok(())
    }

    /// Remove an element and its subtree from the document.
    ///
    /// Listeners registered on removed elements are dropped with them.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if node == self.body {
            return Err(Error::Application("Cannot remove the body element".to_string()));
        }
        if !self.contains(node) {
            return Err(Error::NodeNotFound(node));
        }

        let was_connected = self.is_connected(node);
        self.detach(node);

        let mut doomed = self.descendants(node);
        doomed.push(node);
        for id in &doomed {
            self.nodes.remove(id);
        }
        self.listeners.retain(|_, target| !doomed.contains(target));

        if was_connected {
            self.record_mutation();
        }
        Ok(())
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) -> Result<()> {
        let children = self
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .ok_or(Error::NodeNotFound(node))?;
        for child in children {
            self.remove(child)?;
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn record_mutation(&mut self) {
        for pending in self.observers.values_mut() {
            *pending = true;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scrolling
    // ─────────────────────────────────────────────────────────────────────────

    /// Scroll an element, as a user would. Fires scroll events on change.
    pub fn scroll_to(&mut self, node: NodeId, top: f32) -> Result<()> {
        self.write_scroll_top(node, top)
    }

    fn write_scroll_top(&mut self, node: NodeId, top: f32) -> Result<()> {
        let n = self.node_mut(node)?;
        let max = n.metrics().max_scroll_top();
        let top = if top.is_finite() { top.clamp(0.0, max) } else { 0.0 };

        if (n.scroll_top - top).abs() <= SCROLL_EPSILON {
            return Ok(());
        }
        n.scroll_top = top;

        let targets: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, target)| **target == node)
            .map(|(id, _)| *id)
            .collect();
        for listener in targets {
            self.queue.push_back(HostEvent::Scroll {
                listener,
                target: node,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of scroll listeners on `node`.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.values().filter(|t| **t == node).count()
    }

    /// Number of scroll listeners in the whole document.
    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Number of connected mutation observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Number of pending timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Next event due no later than `until`.
    ///
    /// Queued scroll events come first, then pending mutation records, then
    /// timers in due order. When nothing is left the clock moves to `until`
    /// and `None` is returned.
    pub fn poll_event(&mut self, until: Duration) -> Option<HostEvent> {
        while let Some(event) = self.queue.pop_front() {
            if let HostEvent::Scroll { listener, .. } = event {
                if !self.listeners.contains_key(&listener) {
                    continue;
                }
            }
            return Some(event);
        }

        if let Some((observer, pending)) = self.observers.iter_mut().find(|(_, p)| **p) {
            *pending = false;
            return Some(HostEvent::Mutation {
                observer: *observer,
            });
        }

        let next = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, t)| (*id, *t));

        if let Some((timer, entry)) = next {
            self.now = self.now.max(entry.due);
            match entry.period {
                Some(period) => {
                    if let Some(t) = self.timers.get_mut(&timer) {
                        t.due = entry.due + period;
                    }
                }
                None => {
                    self.timers.remove(&timer);
                }
            }
            return Some(HostEvent::Timer { timer });
        }

        self.now = self.now.max(until);
        None
    }

    /// Run the event loop until `until`, handing every event to `handler`.
    pub fn advance_to<F>(&mut self, until: Duration, mut handler: F)
    where
        F: FnMut(&mut Document, HostEvent),
    {
        while let Some(event) = self.poll_event(until) {
            handler(self, event);
        }
    }

    /// Run the event loop for `dt` of virtual time.
    pub fn advance<F>(&mut self, dt: Duration, handler: F)
    where
        F: FnMut(&mut Document, HostEvent),
    {
        let until = self.now + dt;
        self.advance_to(until, handler);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScrollHost
// ─────────────────────────────────────────────────────────────────────────────

impl ScrollHost for Document {
    fn query_selector(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    fn computed_overflow(&self, node: NodeId) -> Option<OverflowStyle> {
        self.nodes.get(&node).map(Node::computed_overflow)
    }

    fn scroll_metrics(&self, node: NodeId) -> Option<ScrollMetrics> {
        self.nodes.get(&node).map(Node::metrics)
    }

    fn set_scroll_top(&mut self, node: NodeId, top: f32) -> Result<()> {
        self.write_scroll_top(node, top)
    }

    fn add_scroll_listener(&mut self, node: NodeId) -> Result<ListenerId> {
        if !self.contains(node) {
            return Err(Error::NodeNotFound(node));
        }
        let id = ListenerId(self.next_handle());
        self.listeners.insert(id, node);
        debug!("Added scroll listener {} on {}", id, node);
        Ok(id)
    }

    fn remove_scroll_listener(&mut self, listener: ListenerId) -> Result<()> {
        self.listeners
            .remove(&listener)
            .map(|_| ())
            .ok_or(Error::ListenerNotFound(listener))
    }

    fn observe_mutations(&mut self) -> ObserverId {
        let id = ObserverId(self.next_handle());
        self.observers.insert(id, false);
        id
    }

    fn disconnect_observer(&mut self, observer: ObserverId) {
        self.observers.remove(&observer);
    }

    fn set_interval(&mut self, period: Duration) -> TimerId {
        let period = period.max(MIN_INTERVAL);
        let id = TimerId(self.next_handle());
        self.timers.insert(
            id,
            TimerEntry {
                due: self.now + period,
                period: Some(period),
            },
        );
        id
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_handle());
        self.timers.insert(
            id,
            TimerEntry {
                due: self.now + delay,
                period: None,
            },
        );
        id
    }

    fn clear_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn collect(doc: &mut Document, dt: Duration) -> Vec<HostEvent> {
        let mut events = Vec::new();
        doc.advance(dt, |_, event| events.push(event));
        events
    }

    /// body > div.outer > div.inner > [div.page, div.page]
    fn sample_tree(doc: &mut Document) -> (NodeId, NodeId, NodeId, NodeId) {
        let outer = doc.element("div", &["outer"]);
        let inner = doc.element("div", &["inner"]);
        let page1 = doc.element("div", &["page"]);
        let page2 = doc.element("div", &["page", "last"]);
        doc.append_child(doc.body(), outer).unwrap();
        doc.append_child(outer, inner).unwrap();
        doc.append_child(inner, page1).unwrap();
        doc.append_child(inner, page2).unwrap();
        (outer, inner, page1, page2)
    }

    #[test]
    fn test_descendants_in_document_order() {
        let mut doc = Document::new();
        let (outer, inner, page1, page2) = sample_tree(&mut doc);
        assert_eq!(doc.descendants(doc.body()), vec![outer, inner, page1, page2]);
        assert_eq!(doc.descendants(inner), vec![page1, page2]);
    }

    #[test]
    fn test_query_selector_excludes_root() {
        let mut doc = Document::new();
        let (outer, inner, page1, page2) = sample_tree(&mut doc);

        let sel = Selector::parse(".outer").unwrap();
        assert_eq!(doc.query_selector(outer, &sel), None);
        assert_eq!(doc.query_selector(doc.body(), &sel), Some(outer));

        let sel = Selector::parse(".inner > div").unwrap();
        assert_eq!(doc.query_selector(outer, &sel), Some(page1));

        let sel = Selector::parse(".outer div.last").unwrap();
        assert_eq!(doc.query_selector(outer, &sel), Some(page2));

        let sel = Selector::parse(".outer > .page").unwrap();
        assert_eq!(doc.query_selector(outer, &sel), None);

        // Ancestors above the query root still count
        let sel = Selector::parse(".outer .inner > .page").unwrap();
        assert_eq!(doc.query_selector(inner, &sel), Some(page1));
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let (outer, inner, _, _) = sample_tree(&mut doc);
        assert!(doc.append_child(inner, outer).is_err());
        assert!(doc.append_child(outer, outer).is_err());
        assert!(doc.append_child(outer, doc.body()).is_err());
    }

    #[test]
    fn test_remove_drops_subtree_and_listeners() {
        let mut doc = Document::new();
        let (outer, inner, page1, _) = sample_tree(&mut doc);
        let listener = doc.add_scroll_listener(page1).unwrap();
        assert_eq!(doc.total_listeners(), 1);

        doc.remove(inner).unwrap();
        assert!(!doc.contains(inner));
        assert!(!doc.contains(page1));
        assert!(doc.node(outer).unwrap().children().is_empty());
        assert_eq!(doc.total_listeners(), 0);
        assert!(matches!(
            doc.remove_scroll_listener(listener),
            Err(Error::ListenerNotFound(_))
        ));
    }

    #[test]
    fn test_mutations_batched_per_observer() {
        let mut doc = Document::new();
        let observer = doc.observe_mutations();
        sample_tree(&mut doc);

        let events = collect(&mut doc, Duration::ZERO);
        assert_eq!(events, vec![HostEvent::Mutation { observer }]);

        // Metric and class changes are not structural
        let body = doc.body();
        let first = doc.descendants(body)[0];
        doc.set_size(first, 100.0, 400.0).unwrap();
        doc.add_class(first, "ready").unwrap();
        assert!(collect(&mut doc, Duration::ZERO).is_empty());
    }

    #[test]
    fn test_detached_changes_are_not_observed() {
        let mut doc = Document::new();
        doc.observe_mutations();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b).unwrap();
        assert!(collect(&mut doc, Duration::ZERO).is_empty());

        doc.append_child(doc.body(), a).unwrap();
        assert_eq!(collect(&mut doc, Duration::ZERO).len(), 1);
    }

    #[test]
    fn test_disconnected_observer_gets_nothing() {
        let mut doc = Document::new();
        let observer = doc.observe_mutations();
        doc.disconnect_observer(observer);
        sample_tree(&mut doc);
        assert!(collect(&mut doc, ms(10)).is_empty());
        assert_eq!(doc.observer_count(), 0);
    }

    #[test]
    fn test_scroll_clamps_and_fires_on_change_only() {
        let mut doc = Document::new();
        let (outer, ..) = sample_tree(&mut doc);
        doc.set_size(outer, 100.0, 500.0).unwrap();
        let listener = doc.add_scroll_listener(outer).unwrap();

        doc.scroll_to(outer, 1000.0).unwrap();
        assert_eq!(doc.scroll_metrics(outer).unwrap().scroll_top, 400.0);
        let events = collect(&mut doc, Duration::ZERO);
        assert_eq!(
            events,
            vec![HostEvent::Scroll {
                listener,
                target: outer
            }]
        );

        // Same offset again: no event
        doc.scroll_to(outer, 400.0).unwrap();
        assert!(collect(&mut doc, Duration::ZERO).is_empty());

        // Shrinking content clamps the offset and fires
        doc.set_size(outer, 100.0, 300.0).unwrap();
        assert_eq!(doc.scroll_metrics(outer).unwrap().scroll_top, 200.0);
        assert_eq!(collect(&mut doc, Duration::ZERO).len(), 1);
    }

    #[test]
    fn test_scroll_event_dropped_after_listener_removed() {
        let mut doc = Document::new();
        let (outer, ..) = sample_tree(&mut doc);
        doc.set_size(outer, 100.0, 500.0).unwrap();
        let listener = doc.add_scroll_listener(outer).unwrap();

        doc.scroll_to(outer, 50.0).unwrap();
        doc.remove_scroll_listener(listener).unwrap();
        assert!(collect(&mut doc, Duration::ZERO).is_empty());
    }

    #[test]
    fn test_timeout_fires_once_at_due_time() {
        let mut doc = Document::new();
        let timer = doc.set_timeout(ms(100));

        assert!(collect(&mut doc, ms(99)).is_empty());
        assert_eq!(doc.now(), ms(99));

        assert_eq!(collect(&mut doc, ms(1)), vec![HostEvent::Timer { timer }]);
        assert_eq!(doc.timer_count(), 0);
        assert!(collect(&mut doc, ms(500)).is_empty());
    }

    #[test]
    fn test_interval_repeats_until_cleared() {
        let mut doc = Document::new();
        let timer = doc.set_interval(ms(200));

        let mut fired_at = Vec::new();
        doc.advance(ms(650), |doc, event| {
            assert_eq!(event, HostEvent::Timer { timer });
            fired_at.push(doc.now());
        });
        assert_eq!(fired_at, vec![ms(200), ms(400), ms(600)]);

        doc.clear_timer(timer);
        assert!(collect(&mut doc, ms(1000)).is_empty());
    }

    #[test]
    fn test_timers_ordered_by_due_then_creation() {
        let mut doc = Document::new();
        let late = doc.set_timeout(ms(50));
        let early = doc.set_timeout(ms(20));
        let tie = doc.set_timeout(ms(50));

        let events = collect(&mut doc, ms(100));
        assert_eq!(
            events,
            vec![
                HostEvent::Timer { timer: early },
                HostEvent::Timer { timer: late },
                HostEvent::Timer { timer: tie },
            ]
        );
    }

    #[test]
    fn test_handler_can_schedule_more_work() {
        let mut doc = Document::new();
        doc.set_timeout(ms(10));

        let mut count = 0;
        doc.advance(ms(100), |doc, _| {
            count += 1;
            if count < 3 {
                doc.set_timeout(ms(10));
            }
        });
        assert_eq!(count, 3);
        assert_eq!(doc.now(), ms(100));
    }
}
