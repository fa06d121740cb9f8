//! Observable view parameters shared by the renderer, the overlays and the UI.

use crate::config::{clamp_split, SpectrumConfig};
use crate::data::coords::{band_edges, ViewState};
use crate::reactive::Cell;

/// Smallest visible span, as a fraction of the band, that zooming allows.
const MIN_ZOOM_FRACTION: f64 = 1.0 / 4096.0;

/// The view parameters the display reads, one observable cell each.
///
/// Cloning shares the cells.
#[derive(Clone)]
pub struct SpectrumSettings {
    /// `(left, right)` visible frequencies in Hz.
    pub visible_range: Cell<(f64, f64)>,
    /// `(left, right)` frequencies of the whole band in Hz.
    pub band: Cell<(f64, f64)>,
    pub is_real_spectrum: Cell<bool>,
    /// Waterfall share of the surface height.
    pub split_fraction: Cell<f32>,
    pub averaging: Cell<f32>,
    pub min_level: Cell<f32>,
    pub max_level: Cell<f32>,
    pub use_gpu: Cell<bool>,
    pub float_textures: Cell<bool>,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self::from_config(&SpectrumConfig::default())
    }
}

impl SpectrumSettings {
    pub fn from_config(cfg: &SpectrumConfig) -> Self {
        Self {
            visible_range: Cell::new((-0.5, 0.5)),
            band: Cell::new((-0.5, 0.5)),
            is_real_spectrum: Cell::new(false),
            split_fraction: Cell::new(clamp_split(cfg.split_fraction)),
            averaging: Cell::new(cfg.averaging),
            min_level: Cell::new(cfg.min_level),
            max_level: Cell::new(cfg.max_level),
            use_gpu: Cell::new(cfg.use_gpu),
            float_textures: Cell::new(cfg.float_textures),
        }
    }

    /// Snapshot of the current values for a surface `pixel_width` wide.
    pub fn view_state(&self, pixel_width: f32) -> ViewState {
        let (left_visible_freq, right_visible_freq) = self.visible_range.get();
        let (left_band_freq, right_band_freq) = self.band.get();
        ViewState {
            left_visible_freq,
            right_visible_freq,
            left_band_freq,
            right_band_freq,
            pixel_width,
            split_fraction: self.split_fraction.get(),
            is_real_spectrum: self.is_real_spectrum.get(),
        }
    }

    /// Follow the band of incoming frames.
    ///
    /// When the band moves, a view that showed the whole band keeps showing
    /// the whole band; a zoomed view is shifted along with the band.
    pub fn set_band(&self, center_freq: f64, sample_rate: f64, is_real: bool) {
        let new_band = band_edges(center_freq, sample_rate, is_real);
        let old_band = self.band.get();
        self.is_real_spectrum.set(is_real);
        if !self.band.set(new_band) {
            return;
        }
        let (left, right) = self.visible_range.get();
        let old_span = old_band.1 - old_band.0;
        let new_span = new_band.1 - new_band.0;
        if (left, right) == old_band || old_span <= 0.0 || (right - left) >= new_span {
            self.visible_range.set(new_band);
        } else {
            let shift = (new_band.0 + new_band.1 - old_band.0 - old_band.1) / 2.0;
            self.visible_range
                .set(clamp_into(left + shift, right + shift, new_band));
        }
    }

    /// Shift the visible range by `delta_hz`, staying inside the band.
    pub fn pan_by(&self, delta_hz: f64) {
        let band = self.band.get();
        self.visible_range
            .update(|&(l, r)| clamp_into(l + delta_hz, r + delta_hz, band));
    }

    /// Scale the visible span by `factor` (< 1 zooms in), keeping `anchor_freq`
    /// at the same screen position.
    pub fn zoom_around(&self, factor: f64, anchor_freq: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let band = self.band.get();
        let band_span = band.1 - band.0;
        self.visible_range.update(|&(l, r)| {
            let span = r - l;
            let new_span = (span * factor).clamp(band_span * MIN_ZOOM_FRACTION, band_span);
            if span <= 0.0 {
                return band;
            }
            let t = ((anchor_freq - l) / span).clamp(0.0, 1.0);
            let left = anchor_freq - t * new_span;
            clamp_into(left, left + new_span, band)
        });
    }

    pub fn reset_zoom(&self) {
        self.visible_range.set(self.band.get());
    }

    pub fn set_split_fraction(&self, value: f32) -> bool {
        self.split_fraction.set(clamp_split(value))
    }
}

/// Move `[left, right]` inside `band` without changing its width, unless it
/// is wider than the band.
fn clamp_into(left: f64, right: f64, band: (f64, f64)) -> (f64, f64) {
    let span = right - left;
    if span >= band.1 - band.0 {
        return band;
    }
    if left < band.0 {
        (band.0, band.0 + span)
    } else if right > band.1 {
        (band.1 - span, band.1)
    } else {
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_view_follows_retune() {
        let s = SpectrumSettings::default();
        s.set_band(100e6, 2e6, false);
        assert_eq!(s.visible_range.get(), (99e6, 101e6));
        s.set_band(200e6, 2e6, false);
        assert_eq!(s.visible_range.get(), (199e6, 201e6));
    }

    #[test]
    fn zoomed_view_shifts_with_band() {
        let s = SpectrumSettings::default();
        s.set_band(100e6, 2e6, false);
        s.zoom_around(0.5, 100e6);
        assert_eq!(s.visible_range.get(), (99.5e6, 100.5e6));
        s.set_band(100.25e6, 2e6, false);
        assert_eq!(s.visible_range.get(), (99.75e6, 100.75e6));
    }

    #[test]
    fn pan_stops_at_band_edge() {
        let s = SpectrumSettings::default();
        s.set_band(0.0, 100.0, false);
        s.zoom_around(0.5, 0.0);
        s.pan_by(1000.0);
        assert_eq!(s.visible_range.get(), (0.0, 50.0));
    }

    #[test]
    fn split_is_clamped() {
        let s = SpectrumSettings::default();
        s.set_split_fraction(-1.0);
        assert_eq!(s.split_fraction.get(), 0.0);
    }
}
