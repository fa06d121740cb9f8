//! Overlays drawn on top of the rendered spectrum.
//!
//! Layout is pure: the labelers turn the current [`CoordinateMapping`] and
//! their inputs into positioned items, and the egui view paints those. Both
//! labelers stack overlapping items with an
//! [`IntervalStacker`](crate::data::stacker::IntervalStacker) and keep their
//! per-item data in a [`VisibleItemCache`](crate::data::item_cache::VisibleItemCache).
//!
//! [`CoordinateMapping`]: crate::data::coords::CoordinateMapping

pub mod axis;
pub mod marks;

use crate::config::clamp_split;
use crate::reactive::Cell;

pub use axis::{AxisLayout, FrequencyAxisLabeler, LabelKey, PlacedLabel, RecordKind};
pub use marks::{PlacedMark, ReceiverMark, ReceiverMarkOverlay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Channel,
    Group,
    Band,
}

/// A labelled frequency or frequency range from a channel database.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEntry {
    /// Stable identity of the record.
    pub id: u64,
    pub kind: LabelKind,
    /// Equal to `high` for single-frequency channels.
    pub low: f64,
    pub high: f64,
    pub label: String,
    /// Modulation mode, e.g. `"NFM"`; may be empty.
    pub mode: String,
}

/// Where axis labels come from.
pub trait LabelSource {
    /// Records overlapping `[low, high]`.
    fn query(&self, low: f64, high: f64) -> Vec<LabelEntry>;

    /// Bumped whenever results of [`query`](LabelSource::query) may have
    /// changed.
    fn revision(&self) -> Cell<u64>;
}

/// In-memory label source.
pub struct StaticLabels {
    entries: Vec<LabelEntry>,
    revision: Cell<u64>,
}

impl Default for StaticLabels {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            revision: Cell::new(0),
        }
    }
}

impl StaticLabels {
    pub fn new(entries: Vec<LabelEntry>) -> Self {
        Self {
            entries,
            revision: Cell::new(0),
        }
    }

    pub fn set_entries(&mut self, entries: Vec<LabelEntry>) {
        self.entries = entries;
        self.revision.update(|r| r + 1);
    }
}

impl LabelSource for StaticLabels {
    fn query(&self, low: f64, high: f64) -> Vec<LabelEntry> {
        self.entries
            .iter()
            .filter(|e| e.high >= low && e.low <= high)
            .cloned()
            .collect()
    }

    fn revision(&self) -> Cell<u64> {
        self.revision.clone()
    }
}

/// Y coordinate of the graph/waterfall boundary on a surface `height` tall.
pub fn split_handle_y(split_fraction: f32, height: f32) -> f32 {
    (1.0 - clamp_split(split_fraction)) * height
}

/// Split fraction after dragging the boundary by `dy` (positive is down).
pub fn split_after_drag(split_fraction: f32, dy: f32, height: f32) -> f32 {
    if height <= 0.0 {
        return clamp_split(split_fraction);
    }
    clamp_split(split_fraction - dy / height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dragging_down_shrinks_the_waterfall() {
        assert!((split_after_drag(0.5, 10.0, 100.0) - 0.4).abs() < 1e-6);
        assert_eq!(split_after_drag(0.5, -1000.0, 100.0), 1.0);
        assert_eq!(split_handle_y(0.25, 200.0), 150.0);
    }

    #[test]
    fn static_labels_filter_by_range() {
        let mut labels = StaticLabels::new(vec![LabelEntry {
            id: 1,
            kind: LabelKind::Channel,
            low: 10.0,
            high: 10.0,
            label: "A".into(),
            mode: String::new(),
        }]);
        assert_eq!(labels.query(0.0, 20.0).len(), 1);
        assert!(labels.query(11.0, 20.0).is_empty());
        let rev = labels.revision();
        labels.set_entries(Vec::new());
        assert_eq!(rev.get(), 1);
    }
}
