//! Color gradient used to paint power levels.
//!
//! The waterfall maps a normalized power value through a five-stop palette
//! (black, blue, cyan, yellow, red). Both backends go through the same
//! sampled [`GradientTable`]: the GPU backend uploads it as a texture and
//! interpolates in the shader, the raster backend calls
//! [`GradientTable::lookup_linear`], which performs the same arithmetic.

use egui::Color32;
use once_cell::sync::Lazy;

/// Control colors of the default palette, low power first.
pub const DEFAULT_STOPS: [Color32; 5] = [
    Color32::from_rgb(0, 0, 0),
    Color32::from_rgb(0, 0, 255),
    Color32::from_rgb(0, 255, 255),
    Color32::from_rgb(255, 255, 0),
    Color32::from_rgb(255, 0, 0),
];

/// Table entries generated per palette segment by default.
pub const DEFAULT_STRETCH: usize = 32;

static DEFAULT_GRADIENT: Lazy<ColorGradient> = Lazy::new(ColorGradient::default);

/// Shared default gradient.
pub fn default_gradient() -> &'static ColorGradient {
    &DEFAULT_GRADIENT
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    stops: Vec<Color32>,
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self {
            stops: DEFAULT_STOPS.to_vec(),
        }
    }
}

impl ColorGradient {
    /// Build a gradient from at least two control colors.
    pub fn new(stops: Vec<Color32>) -> Option<Self> {
        (stops.len() >= 2).then_some(Self { stops })
    }

    pub fn stops(&self) -> &[Color32] {
        &self.stops
    }

    pub fn segments(&self) -> usize {
        self.stops.len() - 1
    }

    /// Map `value` in `[0, 1]` to an opaque color.
    ///
    /// ```
    /// # use livespectrum::data::gradient::ColorGradient;
    /// # use egui::Color32;
    /// let g = ColorGradient::default();
    /// assert_eq!(g.interpolate_color(0.0), Color32::BLACK);
    /// assert_eq!(g.interpolate_color(1.0), Color32::from_rgb(255, 0, 0));
    /// ```
    pub fn interpolate_color(&self, value: f32) -> Color32 {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let segments = self.segments();
        let scaled = value * segments as f32;
        let index = (scaled.floor() as usize).min(segments - 1);
        let frac = scaled - index as f32;
        let a = self.stops[index];
        let b = self.stops[index + 1];
        Color32::from_rgb(
            lerp_u8(a.r(), b.r(), frac),
            lerp_u8(a.g(), b.g(), frac),
            lerp_u8(a.b(), b.b(), frac),
        )
    }

    /// Sample the gradient into `resolution` evenly spaced entries.
    pub fn build_sampled_table(&self, resolution: usize) -> GradientTable {
        let resolution = resolution.max(2);
        let colors = (0..resolution)
            .map(|i| self.interpolate_color(i as f32 / (resolution - 1) as f32))
            .collect();
        GradientTable {
            colors,
            inset: 0.5 / resolution as f32,
        }
    }

    /// Table with `stretch` entries per segment, so every control color lands
    /// exactly on an entry: `stretch * segments + 1` entries in total.
    pub fn build_stretched_table(&self, stretch: usize) -> GradientTable {
        self.build_sampled_table(stretch.max(1) * self.segments() + 1)
    }
}

/// Sampled gradient, usable as a lookup texture or a palette.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    colors: Vec<Color32>,
    inset: f32,
}

impl GradientTable {
    pub fn colors(&self) -> &[Color32] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Half a texel, in normalized texture coordinates.
    pub fn inset(&self) -> f32 {
        self.inset
    }

    /// Texture coordinate of `value`, inset so that the ends of the range hit
    /// the centers of the first and last texels instead of their outer edges.
    pub fn texture_coord(&self, value: f32) -> f32 {
        self.inset + value.clamp(0.0, 1.0) * (1.0 - 2.0 * self.inset)
    }

    /// Linearly filtered lookup, identical to the shader's fetch.
    pub fn lookup_linear(&self, value: f32) -> Color32 {
        let value = if value.is_nan() { 0.0 } else { value };
        let texel = self.texture_coord(value) * self.colors.len() as f32 - 0.5;
        let last = self.colors.len() - 1;
        let i0 = (texel.floor().max(0.0) as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = (texel - i0 as f32).clamp(0.0, 1.0);
        let a = self.colors[i0];
        let b = self.colors[i1];
        Color32::from_rgb(
            lerp_u8(a.r(), b.r(), frac),
            lerp_u8(a.g(), b.g(), frac),
            lerp_u8(a.b(), b.b(), frac),
        )
    }

    /// Entries as tightly packed RGBA bytes, ready for upload.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c.to_array()).collect()
    }
}

/// Normalize a power level to `[0, 1]` against the display range.
pub fn normalize_level(power: f32, min_level: f32, max_level: f32) -> f32 {
    let span = max_level - min_level;
    if !(span.abs() > f32::EPSILON) || power.is_nan() {
        return 0.0;
    }
    ((power - min_level) / span).clamp(0.0, 1.0)
}

/// 8-bit encoding of a power level, with the display range baked in.
pub fn quantize_level(power: f32, min_level: f32, max_level: f32) -> u8 {
    (normalize_level(power, min_level, max_level) * 255.0).round() as u8
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_land_on_segment_boundaries() {
        let g = ColorGradient::default();
        for (i, stop) in DEFAULT_STOPS.iter().enumerate() {
            assert_eq!(g.interpolate_color(i as f32 / 4.0), *stop);
        }
    }

    #[test]
    fn stretched_table_has_expected_size() {
        let t = ColorGradient::default().build_stretched_table(8);
        assert_eq!(t.len(), 8 * 4 + 1);
        assert!((t.inset() - 0.5 / 33.0).abs() < 1e-7);
        assert_eq!(t.colors()[8], DEFAULT_STOPS[1]);
    }

    #[test]
    fn linear_lookup_matches_direct_interpolation() {
        let g = ColorGradient::default();
        let t = g.build_stretched_table(16);
        for i in 0..=100 {
            let v = i as f32 / 100.0;
            let a = g.interpolate_color(v);
            let b = t.lookup_linear(v);
            for (x, y) in a.to_array().iter().zip(b.to_array().iter()) {
                assert!((*x as i32 - *y as i32).abs() <= 2, "v={v} {a:?} {b:?}");
            }
        }
    }

    #[test]
    fn quantization_clamps_and_rounds() {
        assert_eq!(quantize_level(-200.0, -100.0, 0.0), 0);
        assert_eq!(quantize_level(50.0, -100.0, 0.0), 255);
        assert_eq!(quantize_level(-50.0, -100.0, 0.0), 128);
        assert_eq!(quantize_level(f32::NAN, -100.0, 0.0), 0);
    }
}
