use std::cell::Cell;
use std::rc::Rc;

use egui::Color32;
use livespectrum::data::coords::{BinLayout, ViewState};
use livespectrum::data::gradient::{default_gradient, normalize_level, quantize_level};
use livespectrum::data::item_cache::VisibleItemCache;
use livespectrum::data::stacker::{IntervalStacker, MAX_LEVELS};

// ── Gradient ─────────────────────────────────────────────────────────────────

#[test]
fn gradient_endpoints_are_first_and_last_stop() {
    let table = default_gradient().build_stretched_table(32);
    assert_eq!(table.len(), 32 * 4 + 1);
    assert_eq!(table.lookup_linear(0.0), Color32::BLACK);
    assert_eq!(table.lookup_linear(1.0), Color32::from_rgb(255, 0, 0));
    // out of range values clamp
    assert_eq!(table.lookup_linear(-3.0), Color32::BLACK);
    assert_eq!(table.lookup_linear(7.0), Color32::from_rgb(255, 0, 0));
}

#[test]
fn gradient_passes_through_control_colors_in_order() {
    let table = default_gradient().build_stretched_table(32);
    let stops = default_gradient().stops();
    for (i, stop) in stops.iter().enumerate() {
        let v = i as f32 / (stops.len() - 1) as f32;
        assert_eq!(table.lookup_linear(v), *stop, "stop {i}");
    }
    assert!(table.colors().iter().all(|c| c.a() == 255));
}

#[test]
fn gradient_texture_coords_hit_texel_centres() {
    let table = default_gradient().build_sampled_table(8);
    assert!((table.texture_coord(0.0) - 0.5 / 8.0).abs() < 1e-6);
    assert!((table.texture_coord(1.0) - 7.5 / 8.0).abs() < 1e-6);
}

#[test]
fn levels_normalize_and_quantize() {
    assert_eq!(normalize_level(-100.0, -100.0, 0.0), 0.0);
    assert_eq!(normalize_level(-50.0, -100.0, 0.0), 0.5);
    assert_eq!(normalize_level(10.0, -100.0, 0.0), 1.0);
    assert_eq!(normalize_level(f32::NAN, -100.0, 0.0), 0.0);
    assert_eq!(normalize_level(-50.0, -60.0, -60.0), 0.0);
    assert_eq!(quantize_level(0.0, -100.0, 0.0), 255);
    assert_eq!(quantize_level(-50.0, -100.0, 0.0), 128);
}

// ── Interval stacker ─────────────────────────────────────────────────────────

#[test]
fn overlapping_intervals_get_distinct_levels() {
    let mut s = IntervalStacker::new();
    let intervals = [(0.0, 10.0), (5.0, 15.0), (8.0, 9.0), (20.0, 30.0), (12.0, 25.0)];
    let levels: Vec<usize> = intervals
        .iter()
        .map(|&(lo, hi)| s.claim(lo, hi).unwrap())
        .collect();
    for (i, a) in intervals.iter().enumerate() {
        for (j, b) in intervals.iter().enumerate().skip(i + 1) {
            let overlap = a.0 < b.1 && b.0 < a.1;
            if overlap {
                assert_ne!(levels[i], levels[j], "{a:?} vs {b:?}");
            }
        }
    }
    assert_eq!(levels, vec![0, 1, 2, 0, 2]);
}

#[test]
fn repeated_point_claims_stack() {
    let mut s = IntervalStacker::new();
    assert_eq!(s.claim(5.0, 5.0).unwrap(), 0);
    assert_eq!(s.claim(5.0, 5.0).unwrap(), 1);
    // an interval ending on the point conflicts with it
    assert_eq!(s.claim(0.0, 5.0).unwrap(), 2);
    s.clear();
    assert_eq!(s.claim(5.0, 5.0).unwrap(), 0);
}

#[test]
fn stacker_gives_up_past_the_limit() {
    let mut s = IntervalStacker::new();
    for level in 0..MAX_LEVELS {
        assert_eq!(s.claim(0.0, 1.0).unwrap(), level);
    }
    let err = s.claim(0.0, 1.0).unwrap_err();
    assert_eq!(err.limit, MAX_LEVELS);
}

// ── Visible item cache ───────────────────────────────────────────────────────

struct Tracked {
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[test]
fn cache_reuses_survivors_and_drops_the_rest() {
    let builds = Rc::new(Cell::new(0));
    let drops = Rc::new(Cell::new(0));
    let mut cache: VisibleItemCache<char, Tracked> = VisibleItemCache::new();
    let make = |_: &char| {
        builds.set(builds.get() + 1);
        Some(Tracked {
            drops: Rc::clone(&drops),
        })
    };

    cache.add('A', make);
    cache.add('B', make);
    assert_eq!(cache.flush(), 0);
    assert_eq!(builds.get(), 2);

    cache.add('B', make);
    cache.add('C', make);
    assert_eq!(cache.flush(), 1);
    assert_eq!(builds.get(), 3, "B must be reused, only C built");
    assert_eq!(drops.get(), 1, "A must be dropped");
    assert!(cache.contains(&'B') && cache.contains(&'C'));
    assert!(!cache.contains(&'A'));
}

// ── Coordinates ──────────────────────────────────────────────────────────────

#[test]
fn pixel_and_frequency_round_trip() {
    let mut view = ViewState::for_band(145e6, 2e6, false, 1280.0);
    view.left_visible_freq = 144.5e6;
    view.right_visible_freq = 145.3e6;
    let mapping = view.mapping();
    for x in [0.0, 1.0, 333.3, 640.0, 1279.5] {
        let f = mapping.pixel_x_to_freq(x);
        assert!((mapping.freq_to_pixel_x(f) - x).abs() < 1e-6);
    }
    assert!((mapping.hz_per_pixel() - 625.0).abs() < 1e-9);
    let (left, len) = mapping.visible_band_fraction();
    assert!((left - 0.25).abs() < 1e-12);
    assert!((len - 0.4).abs() < 1e-12);
}

#[test]
fn real_spectrum_covers_upper_half_band() {
    let view = ViewState::for_band(0.0, 48_000.0, true, 480.0);
    assert_eq!(view.left_band_freq, 0.0);
    assert_eq!(view.right_band_freq, 24_000.0);
    let layout = BinLayout::new(0.0, 48_000.0, 240, true);
    assert!((layout.bin_width - 100.0).abs() < 1e-9);
    assert!((layout.first_edge - 50.0).abs() < 1e-9);
}
