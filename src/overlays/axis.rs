//! Frequency axis: numeric ticks plus channel, group and band labels.

use super::{LabelKind, LabelSource};
use crate::data::coords::CoordinateMapping;
use crate::data::item_cache::VisibleItemCache;
use crate::data::stacker::IntervalStacker;

/// Approximate label glyph width, in pixels, used to reserve space.
pub const DEFAULT_CHAR_WIDTH: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKey {
    /// Tick at a frequency (Hz) with a given step (Hz); the step decides the
    /// number of decimals shown.
    Tick { freq: i64, step: i64 },
    Record(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Tick,
    Channel,
    Group,
    Band,
}

impl From<LabelKind> for RecordKind {
    fn from(kind: LabelKind) -> Self {
        match kind {
            LabelKind::Channel => RecordKind::Channel,
            LabelKind::Group => RecordKind::Group,
            LabelKind::Band => RecordKind::Band,
        }
    }
}

/// Cached per-label data.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub kind: RecordKind,
    pub text: String,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub key: LabelKey,
    pub kind: RecordKind,
    pub text: String,
    /// Pixel position of the labelled frequency (or of the range start).
    pub x: f32,
    /// Pixel end of a labelled range; equals `x` for points.
    pub x_end: f32,
    /// Stacking row, 0 nearest the axis.
    pub level: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisLayout {
    pub tick_step: f64,
    pub labels: Vec<PlacedLabel>,
}

pub struct FrequencyAxisLabeler {
    stacker: IntervalStacker,
    cache: VisibleItemCache<LabelKey, LabelRecord>,
    min_tick_spacing: f32,
    char_width: f32,
}

impl FrequencyAxisLabeler {
    pub fn new(min_tick_spacing: f32) -> Self {
        Self {
            stacker: IntervalStacker::new(),
            cache: VisibleItemCache::new(),
            min_tick_spacing: min_tick_spacing.max(1.0),
            char_width: DEFAULT_CHAR_WIDTH,
        }
    }

    pub fn with_char_width(mut self, char_width: f32) -> Self {
        self.char_width = char_width.max(0.0);
        self
    }

    /// Labels currently cached.
    pub fn cached_labels(&self) -> usize {
        self.cache.len()
    }

    /// Lay out one frame of axis labels.
    pub fn layout(
        &mut self,
        mapping: &CoordinateMapping,
        source: Option<&dyn LabelSource>,
    ) -> AxisLayout {
        self.stacker.clear();
        let hz_per_pixel = mapping.hz_per_pixel();
        let view = *mapping.view();
        let visible = view.left_visible_freq.is_finite() && view.right_visible_freq.is_finite();
        if !(visible && hz_per_pixel.is_finite() && hz_per_pixel > 0.0) {
            self.cache.flush();
            return AxisLayout::default();
        }
        let step = nice_tick_step(hz_per_pixel * self.min_tick_spacing as f64);
        let mut labels = Vec::new();

        let first = (view.left_visible_freq / step).ceil() as i64;
        let last = (view.right_visible_freq / step).floor() as i64;
        for i in first..=last {
            let freq = i as f64 * step;
            let key = LabelKey::Tick {
                freq: freq.round() as i64,
                step: step.round() as i64,
            };
            let record = self.cache.add(key, |_| {
                Some(LabelRecord {
                    kind: RecordKind::Tick,
                    text: format_mhz(freq, step),
                    low: freq,
                    high: freq,
                })
            });
            if let Some(record) = record.cloned() {
                let half = self.text_width_hz(&record.text, hz_per_pixel) / 2.0;
                let extent = (freq - half, freq + half);
                labels.extend(self.place(key, record, extent, mapping));
            }
        }

        if let Some(source) = source {
            for entry in source.query(view.left_visible_freq, view.right_visible_freq) {
                if !(entry.low.is_finite() && entry.high.is_finite()) {
                    tracing::warn!(id = entry.id, "label with non-finite frequency skipped");
                    continue;
                }
                let key = LabelKey::Record(entry.id);
                let record = self.cache.add(key, |_| {
                    if entry.label.is_empty() {
                        return None;
                    }
                    let text = if entry.mode.is_empty() {
                        entry.label.clone()
                    } else {
                        format!("{} ({})", entry.label, entry.mode)
                    };
                    Some(LabelRecord {
                        kind: entry.kind.into(),
                        text,
                        low: entry.low.min(entry.high),
                        high: entry.low.max(entry.high),
                    })
                });
                if let Some(record) = record.cloned() {
                    let width = self.text_width_hz(&record.text, hz_per_pixel);
                    let extent = (record.low, record.high.max(record.low + width));
                    labels.extend(self.place(key, record, extent, mapping));
                }
            }
        }

        self.cache.flush();
        AxisLayout {
            tick_step: step,
            labels,
        }
    }

    /// Frequency span covered by `text`, one fixed-width cell per glyph.
    fn text_width_hz(&self, text: &str, hz_per_pixel: f64) -> f64 {
        text.chars().count() as f64 * self.char_width as f64 * hz_per_pixel
    }

    fn place(
        &mut self,
        key: LabelKey,
        record: LabelRecord,
        extent: (f64, f64),
        mapping: &CoordinateMapping,
    ) -> Option<PlacedLabel> {
        match self.stacker.claim(extent.0, extent.1) {
            Ok(level) => Some(PlacedLabel {
                key,
                kind: record.kind,
                x: mapping.freq_to_pixel_x(record.low) as f32,
                x_end: mapping.freq_to_pixel_x(record.high) as f32,
                text: record.text,
                level,
            }),
            Err(err) => {
                tracing::error!(%err, text = %record.text, "axis label dropped");
                None
            }
        }
    }
}

/// Smallest step of the form 1, 2 or 5 × 10ⁿ Hz that is at least `min_step`.
///
/// ```
/// # use livespectrum::overlays::axis::nice_tick_step;
/// assert_eq!(nice_tick_step(130.0), 200.0);
/// assert_eq!(nice_tick_step(4_100.0), 5_000.0);
/// assert_eq!(nice_tick_step(6_000.0), 10_000.0);
/// ```
pub fn nice_tick_step(min_step: f64) -> f64 {
    if !(min_step.is_finite() && min_step > 1.0) {
        return 1.0;
    }
    let magnitude = 10f64.powf(min_step.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&step| step >= min_step)
        .unwrap_or(10.0 * magnitude)
}

/// Frequency in MHz with just enough decimals to tell ticks `step` apart.
pub fn format_mhz(freq: f64, step: f64) -> String {
    let decimals = if step > 0.0 {
        (-(step / 1e6).log10() - 1e-9).ceil().clamp(0.0, 6.0) as usize
    } else {
        6
    };
    format!("{:.*}", decimals, freq / 1e6)
}
