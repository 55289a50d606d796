//! ============================================================================
//! Infinite Scroll Controller
//! ============================================================================
//! Turns viewport observations into "load more" signals. A signal fires once
//! when the viewport reaches the bottom of the content while the listing is
//! idle and has more pages; it then stays latched until the viewport leaves
//! the bottom, the in-flight page finishes, or the latch is released.
//! ============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Distance from the bottom (in content units) that already counts as bottom
pub const DEFAULT_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, viewport_height: f64, content_height: f64) -> Self {
        Self {
            scroll_top,
            viewport_height,
            content_height,
        }
    }

    pub fn at_bottom(&self, threshold: f64) -> bool {
        self.scroll_top + self.viewport_height + threshold >= self.content_height
    }
}

/// Listing status as seen at the time of the observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollStatus {
    pub loading: bool,
    pub has_more: bool,
    pub cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMore {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Armed,
    /// Signalled, waiting for the load to start or the viewport to move
    Fired,
    /// The signalled load is running
    InFlight,
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    page_size: usize,
    threshold: f64,
    latch: Latch,
}

impl ScrollController {
    pub fn new(page_size: usize) -> Self {
        Self::with_threshold(page_size, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(page_size: usize, threshold: f64) -> Self {
        Self {
            page_size,
            threshold: threshold.max(0.0),
            latch: Latch::Armed,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_latched(&self) -> bool {
        self.latch != Latch::Armed
    }

    /// Feed one observation; returns the page to load, if any
    pub fn observe(&mut self, viewport: Viewport, status: ScrollStatus) -> Option<LoadMore> {
        let at_bottom = viewport.at_bottom(self.threshold);

        self.latch = match self.latch {
            _ if !at_bottom => Latch::Armed,
            Latch::Fired if status.loading => Latch::InFlight,
            Latch::InFlight if !status.loading => Latch::Armed,
            latch => latch,
        };

        if self.latch != Latch::Armed || status.loading || !status.has_more || !at_bottom {
            return None;
        }

        self.latch = Latch::Fired;
        debug!("Scrolled to bottom, requesting offset {}", status.cursor);
        Some(LoadMore {
            offset: status.cursor,
            limit: self.page_size,
        })
    }

    /// Re-arm, e.g. after the listing was reset
    pub fn release(&mut self) {
        self.latch = Latch::Armed;
    }
}
