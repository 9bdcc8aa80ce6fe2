//! Virtualized render window.
//!
//! Only a prefix of the filtered assets is materialized. The prefix grows by
//! a fixed batch when the viewport nears the bottom of the document (checked
//! at most once per throttle window) or on an explicit "load more". The last
//! position seen inside a throttle window is checked once the window closes,
//! so stopping at the bottom mid-window still grows the list.

use tokio::time::Instant;
use tracing::debug;

use crate::models::Asset;
use crate::timing::{Throttle, SCROLL_THROTTLE};

/// Items materialized before any scrolling
pub const INITIAL_VISIBLE: usize = 50;

/// Items added per growth step
pub const BATCH_SIZE: usize = 25;

/// Distance from the document bottom, in pixels, that triggers growth
pub const SCROLL_THRESHOLD_PX: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        self.document_height - (self.scroll_top + self.viewport_height)
    }

    pub fn near_bottom(&self) -> bool {
        self.distance_to_bottom() <= SCROLL_THRESHOLD_PX
    }
}

#[derive(Debug)]
pub struct RenderWindow {
    visible_count: usize,
    throttle: Throttle,
    trailing: Option<ScrollMetrics>,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderWindow {
    pub fn new() -> Self {
        Self {
            visible_count: INITIAL_VISIBLE,
            throttle: Throttle::new(SCROLL_THROTTLE),
            trailing: None,
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    /// The materialized prefix; never longer than `filtered`.
    pub fn displayed<'a>(&self, filtered: &'a [Asset]) -> &'a [Asset] {
        &filtered[..self.visible_count.min(filtered.len())]
    }

    pub fn has_more(&self, filtered_len: usize) -> bool {
        self.visible_count < filtered_len
    }

    /// Handle a scroll event. Returns true if the window grew.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, filtered_len: usize, now: Instant) -> bool {
        if !self.throttle.try_acquire(now) {
            self.trailing = Some(metrics);
            return false;
        }
        self.trailing = None;
        self.check_boundary(metrics, filtered_len)
    }

    /// Evaluate the latest throttled-away position once its window has
    /// closed. Meant to be called from the owner's loop; returns true if the
    /// window grew.
    pub fn poll_trailing(&mut self, filtered_len: usize, now: Instant) -> bool {
        let Some(metrics) = self.trailing else {
            return false;
        };
        if !self.throttle.try_acquire(now) {
            return false;
        }
        self.trailing = None;
        self.check_boundary(metrics, filtered_len)
    }

    fn check_boundary(&mut self, metrics: ScrollMetrics, filtered_len: usize) -> bool {
        metrics.near_bottom() && self.grow(filtered_len)
    }

    /// Explicit "load more". Returns true if the window grew.
    pub fn load_more(&mut self, filtered_len: usize) -> bool {
        self.grow(filtered_len)
    }

    fn grow(&mut self, filtered_len: usize) -> bool {
        if !self.has_more(filtered_len) {
            return false;
        }
        let before = self.visible_count;
        self.visible_count = (self.visible_count + BATCH_SIZE).min(filtered_len);
        debug!(from = before, to = self.visible_count, total = filtered_len, "Render window grew");
        true
    }

    /// Re-fit the window after the filtered sequence changed length.
    /// Shrinks to the new length, and never leaves fewer than the initial
    /// page visible when that many items exist.
    pub fn reclamp(&mut self, filtered_len: usize) {
        self.visible_count = self
            .visible_count
            .min(filtered_len)
            .max(INITIAL_VISIBLE.min(filtered_len));
    }

    /// Back to the initial page, e.g. after the search or sort changed
    pub fn reset(&mut self) {
        self.visible_count = INITIAL_VISIBLE;
        self.throttle.reset();
        self.trailing = None;
    }
}
