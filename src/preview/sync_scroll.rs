//! Synchronized Scrolling for Side-by-Side Previews
//!
//! This module keeps two independently rendered document previews aligned by
//! scroll percentage. It provides:
//!
//! - Lazy discovery of the element that owns each pane's scrollbar
//! - Bounded retry driven by both mutation records and a fallback interval
//! - Proportional scroll propagation between documents of different lengths
//! - Feedback loop prevention
//!
//! # Architecture
//!
//! The synchronizer never calls into the preview renderers. It registers for
//! host events (scroll, mutation, timer) and reacts when the host hands them
//! back through [`DualViewSync::handle_event`]. A single in-flight flag guards
//! propagation in both directions: the mirrored pane's own scroll event
//! arrives while the flag is set and is dropped. The flag is released by a
//! one-shot timer rather than immediately.
//!
//! # Usage
//!
//! ```ignore
//! let mut sync = DualViewSync::new(&mut doc, left, right, &config);
//!
//! // Every frame
//! doc.advance_to(now, |doc, event| {
//!     sync.handle_event(doc, &event);
//! });
//!
//! // When the view goes away
//! sync.teardown(&mut doc);
//! ```

use crate::dom::{
    HostEvent, ListenerId, NodeId, ObserverId, ScrollHost, ScrollMetrics, Selector, TimerId,
};
use crate::preview::discovery::{compile_selectors, default_candidate_selectors, find_scrollable};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for synchronized scrolling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncScrollConfig {
    /// Whether synchronized scrolling is enabled at all
    pub enabled: bool,
    /// Failed discovery re-runs tolerated; one more and discovery gives up
    pub max_retries: u32,
    /// Period of the fallback discovery timer, in milliseconds
    pub retry_interval_ms: u64,
    /// How long the in-flight guard stays set after a propagation, in milliseconds
    pub guard_release_ms: u64,
    /// Selectors tried (in order) to locate each pane's scrollable element
    pub candidate_selectors: Vec<String>,
}

impl Default for SyncScrollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 10,
            retry_interval_ms: 200,
            guard_release_ms: 100,
            candidate_selectors: default_candidate_selectors(),
        }
    }
}

impl SyncScrollConfig {
    /// Minimum allowed retry count.
    pub const MIN_RETRIES: u32 = 1;
    /// Maximum allowed retry count.
    pub const MAX_RETRIES: u32 = 100;
    /// Minimum retry interval (about one frame).
    pub const MIN_RETRY_INTERVAL_MS: u64 = 16;
    /// Maximum retry interval.
    pub const MAX_RETRY_INTERVAL_MS: u64 = 5000;
    /// Minimum guard release delay.
    pub const MIN_GUARD_RELEASE_MS: u64 = 10;
    /// Maximum guard release delay.
    pub const MAX_GUARD_RELEASE_MS: u64 = 1000;

    /// Clamp values to valid ranges.
    pub fn sanitize(&mut self) {
        self.max_retries = self.max_retries.clamp(Self::MIN_RETRIES, Self::MAX_RETRIES);
        self.retry_interval_ms = self
            .retry_interval_ms
            .clamp(Self::MIN_RETRY_INTERVAL_MS, Self::MAX_RETRY_INTERVAL_MS);
        self.guard_release_ms = self
            .guard_release_ms
            .clamp(Self::MIN_GUARD_RELEASE_MS, Self::MAX_GUARD_RELEASE_MS);

        self.candidate_selectors.retain(|s| !s.trim().is_empty());
        if self.candidate_selectors.is_empty() {
            self.candidate_selectors = default_candidate_selectors();
        }
    }

    /// Fallback discovery timer period.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// In-flight guard release delay.
    pub fn guard_release(&self) -> Duration {
        Duration::from_millis(self.guard_release_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Panes and Status
// ─────────────────────────────────────────────────────────────────────────────

/// One of the two synchronized panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Left,
    Right,
}

impl Pane {
    /// Both panes, left first.
    pub const ALL: [Pane; 2] = [Pane::Left, Pane::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Pane::Left => 0,
            Pane::Right => 1,
        }
    }

    /// The opposite pane.
    pub fn other(self) -> Pane {
        match self {
            Pane::Left => Pane::Right,
            Pane::Right => Pane::Left,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Pane::Left => "Left",
            Pane::Right => "Right",
        }
    }
}

/// Lifecycle of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Waiting for both panes to render something scrollable
    Discovering,
    /// Listeners attached, scrolling is mirrored
    Active,
    /// Retries ran out; panes scroll independently
    Exhausted,
    /// Torn down by the owner
    TornDown,
}

impl SyncStatus {
    /// Short description for the status bar.
    pub fn label(self) -> &'static str {
        match self {
            SyncStatus::Discovering => "waiting for content",
            SyncStatus::Active => "active",
            SyncStatus::Exhausted => "unavailable",
            SyncStatus::TornDown => "off",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ViewerBinding {
    root: NodeId,
    scrollable: Option<NodeId>,
    listener: Option<ListenerId>,
}

impl ViewerBinding {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            scrollable: None,
            listener: None,
        }
    }
}

#[derive(Debug, Default)]
struct DiscoveryAttempt {
    attempts: u32,
    max_attempts: u32,
    observer: Option<ObserverId>,
    retry_timer: Option<TimerId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Proportional Mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Scroll offset for `mirror` that matches the relative position of `source`.
///
/// Returns `None` when either side has nothing to scroll.
pub fn mirrored_offset(source: &ScrollMetrics, mirror: &ScrollMetrics) -> Option<f32> {
    if !mirror.has_overflow() {
        return None;
    }
    let fraction = source.scroll_fraction()?;
    Some(fraction * mirror.max_scroll_top())
}

// ─────────────────────────────────────────────────────────────────────────────
// Synchronizer
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps two preview panes scrolled to the same relative position.
#[derive(Debug)]
pub struct DualViewSync {
    panes: [ViewerBinding; 2],
    candidates: Vec<Selector>,
    retry_interval: Duration,
    guard_release: Duration,
    /// Set while a propagation is in flight
    in_flight: bool,
    guard_timer: Option<TimerId>,
    discovery: DiscoveryAttempt,
    status: SyncStatus,
}

impl DualViewSync {
    /// Start synchronizing the panes rooted at `left` and `right`.
    ///
    /// The containers may still be empty. If either scrollable element cannot
    /// be found yet, discovery is retried on tree mutations and on a fixed
    /// interval until it succeeds or more than `config.max_retries` re-runs fail.
    pub fn new<H: ScrollHost + ?Sized>(
        host: &mut H,
        left: NodeId,
        right: NodeId,
        config: &SyncScrollConfig,
    ) -> Self {
        let mut sync = Self {
            panes: [ViewerBinding::new(left), ViewerBinding::new(right)],
            candidates: compile_selectors(&config.candidate_selectors),
            retry_interval: config.retry_interval(),
            guard_release: config.guard_release(),
            in_flight: false,
            guard_timer: None,
            discovery: DiscoveryAttempt {
                max_attempts: config.max_retries,
                ..DiscoveryAttempt::default()
            },
            status: SyncStatus::Discovering,
        };

        if sync.try_attach(host) {
            return sync;
        }

        debug!(
            "Scroll containers in {} / {} not ready, waiting for content",
            left, right
        );
        sync.discovery.observer = Some(host.observe_mutations());
        sync.discovery.retry_timer = Some(host.set_interval(sync.retry_interval));
        sync
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Whether scrolling is currently mirrored.
    pub fn is_active(&self) -> bool {
        self.status == SyncStatus::Active
    }

    /// Failed discovery re-runs so far.
    pub fn attempts(&self) -> u32 {
        self.discovery.attempts
    }

    /// The container the pane was constructed with.
    pub fn root(&self, pane: Pane) -> NodeId {
        self.panes[pane.index()].root
    }

    /// The resolved scrollable element of a pane, once discovered.
    pub fn scrollable(&self, pane: Pane) -> Option<NodeId> {
        self.panes[pane.index()].scrollable
    }

    /// Whether a propagation guard is currently held.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Handling
    // ─────────────────────────────────────────────────────────────────────────

    /// React to a host event. Returns `false` if the event is not ours.
    pub fn handle_event<H: ScrollHost + ?Sized>(&mut self, host: &mut H, event: &HostEvent) -> bool {
        match *event {
            HostEvent::Scroll { listener, .. } => {
                let Some(pane) = self.pane_for_listener(listener) else {
                    return false;
                };
                self.on_scroll(host, pane);
                true
            }
            HostEvent::Mutation { observer } if self.discovery.observer == Some(observer) => {
                self.retry_discovery(host);
                true
            }
            HostEvent::Timer { timer } if self.discovery.retry_timer == Some(timer) => {
                self.retry_discovery(host);
                true
            }
            HostEvent::Timer { timer } if self.guard_timer == Some(timer) => {
                self.guard_timer = None;
                self.in_flight = false;
                true
            }
            _ => false,
        }
    }

    fn pane_for_listener(&self, listener: ListenerId) -> Option<Pane> {
        Pane::ALL
            .into_iter()
            .find(|pane| self.panes[pane.index()].listener == Some(listener))
    }

    fn on_scroll<H: ScrollHost + ?Sized>(&mut self, host: &mut H, source: Pane) {
        // The mirrored pane reports our own write back to us
        if self.in_flight {
            return;
        }
        self.in_flight = true;
        self.propagate(host, source);
        self.guard_timer = Some(host.set_timeout(self.guard_release));
    }

    fn propagate<H: ScrollHost + ?Sized>(&self, host: &mut H, source: Pane) {
        let (Some(from), Some(to)) = (self.scrollable(source), self.scrollable(source.other()))
        else {
            return;
        };
        let (Some(from_metrics), Some(to_metrics)) = (host.scroll_metrics(from), host.scroll_metrics(to))
        else {
            return;
        };

        let Some(target) = mirrored_offset(&from_metrics, &to_metrics) else {
            debug!("{} pane scrolled but a pane has no overflow, skipping", source.label());
            return;
        };

        if let Err(e) = host.set_scroll_top(to, target) {
            warn!("Failed to mirror scroll to {} pane: {}", source.other().label(), e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Discovery
    // ─────────────────────────────────────────────────────────────────────────

    fn retry_discovery<H: ScrollHost + ?Sized>(&mut self, host: &mut H) {
        if self.status != SyncStatus::Discovering {
            return;
        }
        if self.try_attach(host) {
            return;
        }

        self.discovery.attempts += 1;
        if self.discovery.attempts > self.discovery.max_attempts {
            self.give_up(host);
        }
    }

    /// Resolve both scrollable elements and attach listeners.
    ///
    /// Returns `true` once both panes are bound. Either both listeners are
    /// attached or neither is.
    fn try_attach<H: ScrollHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let left = find_scrollable(&*host, self.panes[0].root, &self.candidates);
        let right = find_scrollable(&*host, self.panes[1].root, &self.candidates);
        let (Some(left), Some(right)) = (left, right) else {
            return false;
        };

        let left_listener = match host.add_scroll_listener(left) {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Failed to listen for scrolling on left pane: {}", e);
                return false;
            }
        };
        let right_listener = match host.add_scroll_listener(right) {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Failed to listen for scrolling on right pane: {}", e);
                if let Err(e) = host.remove_scroll_listener(left_listener) {
                    warn!("Failed to roll back left pane listener: {}", e);
                }
                return false;
            }
        };

        self.panes[0].scrollable = Some(left);
        self.panes[0].listener = Some(left_listener);
        self.panes[1].scrollable = Some(right);
        self.panes[1].listener = Some(right_listener);
        self.stop_discovery(host);
        self.status = SyncStatus::Active;

        info!(
            "Synchronized scrolling established between {} and {}",
            left, right
        );
        true
    }

    fn give_up<H: ScrollHost + ?Sized>(&mut self, host: &mut H) {
        self.stop_discovery(host);
        self.status = SyncStatus::Exhausted;
        warn!(
            "Synchronized scrolling unavailable: no scrollable content after {} retries",
            self.discovery.attempts
        );
    }

    fn stop_discovery<H: ScrollHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(observer) = self.discovery.observer.take() {
            host.disconnect_observer(observer);
        }
        if let Some(timer) = self.discovery.retry_timer.take() {
            host.clear_timer(timer);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────────

    /// Detach listeners and cancel every pending observer and timer.
    ///
    /// Safe to call repeatedly and before discovery has finished. Failures to
    /// remove a listener are logged; the rest of the teardown still runs.
    pub fn teardown<H: ScrollHost + ?Sized>(&mut self, host: &mut H) {
        if self.status == SyncStatus::TornDown {
            return;
        }

        for binding in &mut self.panes {
            if let Some(listener) = binding.listener.take() {
                if let Err(e) = host.remove_scroll_listener(listener) {
                    warn!("Error while removing scroll listener during teardown: {}", e);
                }
            }
        }
        self.stop_discovery(host);
        if let Some(timer) = self.guard_timer.take() {
            host.clear_timer(timer);
        }
        self.in_flight = false;
        self.status = SyncStatus::TornDown;

        info!("Synchronized scrolling torn down");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
