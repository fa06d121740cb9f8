//! Receiver marks: tuned frequency, passband and a stacked name tag.

use std::collections::HashSet;

use super::axis::DEFAULT_CHAR_WIDTH;
use crate::data::coords::CoordinateMapping;
use crate::data::item_cache::VisibleItemCache;
use crate::data::stacker::IntervalStacker;

/// A receiver tuned somewhere in the band.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverMark {
    pub id: u64,
    pub freq: f64,
    /// Passband edges as offsets from `freq`, e.g. `(-6e3, 6e3)`.
    pub passband: (f64, f64),
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMark {
    pub id: u64,
    pub x_center: f32,
    pub x_low: f32,
    pub x_high: f32,
    pub label: String,
    pub level: usize,
}

#[derive(Debug)]
struct MarkRecord {
    label: String,
}

pub struct ReceiverMarkOverlay {
    stacker: IntervalStacker,
    cache: VisibleItemCache<u64, MarkRecord>,
    char_width: f32,
}

impl Default for ReceiverMarkOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverMarkOverlay {
    pub fn new() -> Self {
        Self {
            stacker: IntervalStacker::new(),
            cache: VisibleItemCache::new(),
            char_width: DEFAULT_CHAR_WIDTH,
        }
    }

    pub fn cached_marks(&self) -> usize {
        self.cache.len()
    }

    pub fn layout(
        &mut self,
        mapping: &CoordinateMapping,
        receivers: &[ReceiverMark],
    ) -> Vec<PlacedMark> {
        self.stacker.clear();
        let view = *mapping.view();
        let hz_per_pixel = mapping.hz_per_pixel().max(0.0);
        let mut seen = HashSet::new();
        let mut placed = Vec::new();

        for rx in receivers {
            if ![rx.freq, rx.passband.0, rx.passband.1].iter().all(|f| f.is_finite()) {
                tracing::warn!(id = rx.id, "receiver with non-finite frequency skipped");
                continue;
            }
            let low = rx.freq + rx.passband.0.min(rx.passband.1);
            let high = rx.freq + rx.passband.0.max(rx.passband.1);
            if high < view.left_visible_freq || low > view.right_visible_freq {
                continue;
            }
            if !seen.insert(rx.id) {
                tracing::warn!(id = rx.id, "duplicate receiver id");
                continue;
            }
            let Some(record) = self.cache.add(rx.id, |_| {
                Some(MarkRecord {
                    label: rx.label.clone(),
                })
            }) else {
                continue;
            };
            if record.label != rx.label {
                record.label.clone_from(&rx.label);
            }
            let label = record.label.clone();

            let text_hz = label.chars().count() as f64 * self.char_width as f64 * hz_per_pixel;
            let level = match self.stacker.claim(low, high.max(rx.freq + text_hz)) {
                Ok(level) => level,
                Err(err) => {
                    tracing::error!(%err, id = rx.id, "receiver mark dropped");
                    continue;
                }
            };
            placed.push(PlacedMark {
                id: rx.id,
                x_center: mapping.freq_to_pixel_x(rx.freq) as f32,
                x_low: mapping.freq_to_pixel_x(low) as f32,
                x_high: mapping.freq_to_pixel_x(high) as f32,
                label,
                level,
            });
        }

        self.cache.flush();
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::coords::ViewState;

    fn rx(id: u64, freq: f64, label: &str) -> ReceiverMark {
        ReceiverMark {
            id,
            freq,
            passband: (-5e3, 5e3),
            label: label.into(),
        }
    }

    #[test]
    fn marks_follow_the_mapping() {
        let view = ViewState::for_band(100e6, 1e6, false, 1000.0);
        let mut overlay = ReceiverMarkOverlay::new();
        let marks = overlay.layout(&view.mapping(), &[rx(1, 100e6, "a")]);
        assert_eq!(marks.len(), 1);
        assert!((marks[0].x_center - 500.0).abs() < 1e-3);
        assert!((marks[0].x_low - 495.0).abs() < 1e-3);
        assert!((marks[0].x_high - 505.0).abs() < 1e-3);
    }

    #[test]
    fn close_receivers_stack_and_stale_ones_are_dropped() {
        let view = ViewState::for_band(100e6, 1e6, false, 1000.0);
        let mut overlay = ReceiverMarkOverlay::new();
        let marks = overlay.layout(
            &view.mapping(),
            &[rx(1, 100e6, "one"), rx(2, 100.002e6, "two"), rx(3, 120e6, "far")],
        );
        assert_eq!(marks.len(), 2);
        assert_eq!((marks[0].level, marks[1].level), (0, 1));
        assert_eq!(overlay.cached_marks(), 2);

        let marks = overlay.layout(&view.mapping(), &[rx(2, 100.002e6, "renamed")]);
        assert_eq!(marks[0].label, "renamed");
        assert_eq!(marks[0].level, 0);
        assert_eq!(overlay.cached_marks(), 1);
    }

    #[test]
    fn receivers_off_the_number_line_are_skipped() {
        let view = ViewState::for_band(100e6, 1e6, false, 1000.0);
        let mut overlay = ReceiverMarkOverlay::new();
        let mut bad_passband = rx(3, 100.1e6, "c");
        bad_passband.passband.1 = f64::INFINITY;
        let marks = overlay.layout(
            &view.mapping(),
            &[rx(1, f64::NAN, "a"), rx(2, 100e6, "b"), bad_passband],
        );
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].id, 2);
        assert_eq!(marks[0].level, 0);
        assert_eq!(overlay.cached_marks(), 1);
    }
}
