//! Frequency ↔ pixel coordinate mapping.
//!
//! Everything that draws frequency-aligned content (waterfall rows, the
//! graph, axis ticks, receiver marks) goes through [`CoordinateMapping`] so
//! the layers stay in registration while the user pans and zooms. The mapping
//! is cheap and derived from [`ViewState`] every frame; nothing caches it.

/// Externally driven view parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub left_visible_freq: f64,
    pub right_visible_freq: f64,
    pub left_band_freq: f64,
    pub right_band_freq: f64,
    /// Width of the drawing surface in pixels.
    pub pixel_width: f32,
    /// Fraction of the surface height given to the waterfall; the graph takes
    /// the rest, above it.
    pub split_fraction: f32,
    /// Real-valued spectra cover `[center, center + rate/2]` instead of
    /// `[center - rate/2, center + rate/2]`.
    pub is_real_spectrum: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::for_band(0.0, 1.0, false, 1.0)
    }
}

impl ViewState {
    /// Fully zoomed-out view of the band around `center_freq`.
    pub fn for_band(center_freq: f64, sample_rate: f64, is_real: bool, pixel_width: f32) -> Self {
        let (left, right) = band_edges(center_freq, sample_rate, is_real);
        Self {
            left_visible_freq: left,
            right_visible_freq: right,
            left_band_freq: left,
            right_band_freq: right,
            pixel_width,
            split_fraction: 0.5,
            is_real_spectrum: is_real,
        }
    }

    pub fn mapping(&self) -> CoordinateMapping {
        CoordinateMapping { view: *self }
    }

    pub fn visible_span(&self) -> f64 {
        self.right_visible_freq - self.left_visible_freq
    }

    pub fn band_span(&self) -> f64 {
        self.right_band_freq - self.left_band_freq
    }

    /// Whether two views draw the same frequency range onto the same width.
    /// Used by the raster backend to decide between scrolling and repainting.
    pub fn same_visible_range(&self, other: &ViewState) -> bool {
        self.left_visible_freq == other.left_visible_freq
            && self.right_visible_freq == other.right_visible_freq
            && self.pixel_width == other.pixel_width
            && self.is_real_spectrum == other.is_real_spectrum
    }
}

/// Lower and upper frequency covered by a spectrum.
pub fn band_edges(center_freq: f64, sample_rate: f64, is_real: bool) -> (f64, f64) {
    if is_real {
        (center_freq, center_freq + sample_rate / 2.0)
    } else {
        (center_freq - sample_rate / 2.0, center_freq + sample_rate / 2.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapping {
    view: ViewState,
}

impl CoordinateMapping {
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn freq_to_pixel_x(&self, freq: f64) -> f64 {
        let span = self.view.visible_span();
        if span == 0.0 {
            return 0.0;
        }
        (freq - self.view.left_visible_freq) / span * self.view.pixel_width as f64
    }

    pub fn pixel_x_to_freq(&self, x: f64) -> f64 {
        let width = self.view.pixel_width as f64;
        if width == 0.0 {
            return self.view.left_visible_freq;
        }
        self.view.left_visible_freq + x / width * self.view.visible_span()
    }

    /// Hz covered by one pixel.
    pub fn hz_per_pixel(&self) -> f64 {
        let width = self.view.pixel_width as f64;
        if width == 0.0 {
            return 0.0;
        }
        self.view.visible_span() / width
    }

    /// Position of `freq` as a fraction of the full band, for placing a
    /// surface that covers only the visible part inside a full-band container.
    pub fn freq_to_band_left(&self, freq: f64) -> f64 {
        let span = self.view.band_span();
        if span == 0.0 {
            return 0.0;
        }
        (freq - self.view.left_band_freq) / span
    }

    /// Length of `[low, high]` as a fraction of the full band.
    pub fn freq_to_band_length(&self, low: f64, high: f64) -> f64 {
        let span = self.view.band_span();
        if span == 0.0 {
            return 0.0;
        }
        (high - low) / span
    }

    /// `(left, length)` of the visible range within the band.
    pub fn visible_band_fraction(&self) -> (f64, f64) {
        (
            self.freq_to_band_left(self.view.left_visible_freq),
            self.freq_to_band_length(self.view.left_visible_freq, self.view.right_visible_freq),
        )
    }

    /// Bin layout of a row captured at `center_freq`.
    pub fn bin_layout(&self, center_freq: f64, sample_rate: f64, bin_count: usize) -> BinLayout {
        BinLayout::new(center_freq, sample_rate, bin_count, self.view.is_real_spectrum)
    }
}

/// Where the bins of one row sit on the frequency axis.
///
/// A bin sample is centred on its frequency rather than starting at it, so
/// the image of a row starts half a bin away from the band edge. The sign
/// depends on the spectrum kind: complex spectra are FFT-shifted with bin 0
/// centred on the lower band edge, real spectra are the mirrored negative
/// half of a transform twice as long, which puts every bin one half step
/// above the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    /// Frequency of the left edge of bin 0.
    pub first_edge: f64,
    /// Width of one bin in Hz.
    pub bin_width: f64,
    pub bin_count: usize,
}

impl BinLayout {
    pub fn new(center_freq: f64, sample_rate: f64, bin_count: usize, is_real: bool) -> Self {
        let (band_left, band_right) = band_edges(center_freq, sample_rate, is_real);
        let bin_width = if bin_count == 0 {
            0.0
        } else {
            (band_right - band_left) / bin_count as f64
        };
        Self {
            first_edge: band_left + bin_edge_correction(bin_count, band_right - band_left, is_real),
            bin_width,
            bin_count,
        }
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.first_edge + (bin as f64 + 0.5) * self.bin_width
    }

    /// Continuous bin coordinate of `freq`; integer values are bin centres.
    pub fn bin_coord(&self, freq: f64) -> f64 {
        if self.bin_width == 0.0 {
            return 0.0;
        }
        (freq - self.first_edge) / self.bin_width - 0.5
    }

    /// Nearest bin index, if `freq` falls inside the row.
    pub fn nearest_bin(&self, freq: f64) -> Option<usize> {
        let coord = self.bin_coord(freq).round();
        (coord >= 0.0 && coord < self.bin_count as f64).then_some(coord as usize)
    }
}

/// Half-bin correction applied to the left edge of a row's image.
pub fn bin_edge_correction(bin_count: usize, bandwidth: f64, is_real: bool) -> f64 {
    if bin_count == 0 {
        return 0.0;
    }
    let half_bin = 0.5 / bin_count as f64 * bandwidth;
    if is_real {
        half_bin
    } else {
        -half_bin
    }
}
