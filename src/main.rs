//! Demo: a synthetic receiver feeding the spectrum display.
//!
//! ```text
//! livespectrum [config.yaml]
//! RUST_LOG=livespectrum=debug livespectrum
//! ```
//!
//! With the `fft` feature the frames come from an actual FFT of generated IQ
//! samples; without it the power spectrum is synthesized directly.

use std::time::Duration;

use livespectrum::overlays::{LabelEntry, LabelKind, ReceiverMark, StaticLabels};
use livespectrum::{channel_spectrum, run_spectrum_with, SpectrumConfig, SpectrumSink};
use tracing_subscriber::EnvFilter;

const CENTER_FREQ: f64 = 100.0e6;
const SAMPLE_RATE: f64 = 2.4e6;
const BINS: usize = 2048;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Carriers as (offset from center in Hz, power in dB).
const CARRIERS: [(f64, f64); 3] = [(-600e3, -45.0), (150e3, -60.0), (820e3, -70.0)];

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => match SpectrumConfig::load(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::error!(%err, path = %path, "could not load config, using defaults");
                SpectrumConfig::default()
            }
        },
        None => SpectrumConfig::default(),
    };

    let (sink, rx) = channel_spectrum();
    std::thread::spawn(move || generate(sink));

    let labels = StaticLabels::new(vec![
        LabelEntry {
            id: 1,
            kind: LabelKind::Band,
            low: 99.2e6,
            high: 99.8e6,
            label: "Broadcast".into(),
            mode: String::new(),
        },
        LabelEntry {
            id: 2,
            kind: LabelKind::Channel,
            low: 99.4e6,
            high: 99.4e6,
            label: "Station A".into(),
            mode: "WFM".into(),
        },
        LabelEntry {
            id: 3,
            kind: LabelKind::Channel,
            low: 100.15e6,
            high: 100.15e6,
            label: "Beacon".into(),
            mode: "CW".into(),
        },
    ]);

    run_spectrum_with(rx, cfg, move |app| {
        let mut app = app.with_labels(Box::new(labels));
        app.set_receivers(vec![ReceiverMark {
            id: 0,
            freq: 99.4e6,
            passband: (-75e3, 75e3),
            label: "rx0".into(),
        }]);
        app
    })
}

/// Small xorshift generator; the demo only needs plausible noise.
struct Noise(u64);

impl Noise {
    fn next_unit(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Roughly Gaussian, from the sum of uniforms.
    fn next_gaussian(&mut self) -> f64 {
        (0..4).map(|_| self.next_unit()).sum::<f64>() - 2.0
    }
}

fn generate(sink: SpectrumSink) {
    let mut noise = Noise(0x2545_f491_4f6c_dd1d);
    let mut t = 0.0f64;
    loop {
        let drift = 300e3 * (t * 0.2).sin();
        let bins = spectrum(&mut noise, t, drift);
        if sink.send(CENTER_FREQ, SAMPLE_RATE, bins).is_err() {
            tracing::debug!("display closed, stopping generator");
            return;
        }
        t += FRAME_INTERVAL.as_secs_f64();
        std::thread::sleep(FRAME_INTERVAL);
    }
}

#[cfg(not(feature = "fft"))]
fn spectrum(noise: &mut Noise, _t: f64, drift: f64) -> Vec<f32> {
    let bin_width = SAMPLE_RATE / BINS as f64;
    (0..BINS)
        .map(|i| {
            let freq = (i as f64 + 0.5) * bin_width - SAMPLE_RATE / 2.0;
            let mut power = 10f64.powf(-11.0) * (1.0 + 0.3 * noise.next_gaussian()).abs();
            for (offset, level) in CARRIERS.iter().copied().chain([(drift, -55.0)]) {
                let d = (freq - offset) / (2.0 * bin_width);
                power += 10f64.powf(level / 10.0) * (-d * d).exp();
            }
            (10.0 * power.log10()) as f32
        })
        .collect()
}

#[cfg(feature = "fft")]
fn spectrum(noise: &mut Noise, t: f64, drift: f64) -> Vec<f32> {
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;
    use std::f64::consts::PI;

    let mut samples: Vec<Complex<f64>> = (0..BINS)
        .map(|n| {
            let time = t + n as f64 / SAMPLE_RATE;
            let mut s = Complex::new(noise.next_gaussian(), noise.next_gaussian()) * 1e-5;
            for (offset, level) in CARRIERS.iter().copied().chain([(drift, -55.0)]) {
                let amplitude = 10f64.powf(level / 20.0);
                s += Complex::from_polar(amplitude, 2.0 * PI * offset * time);
            }
            // Hann window
            let w = 0.5 - 0.5 * (2.0 * PI * n as f64 / BINS as f64).cos();
            s * w
        })
        .collect();

    FftPlanner::new().plan_fft_forward(BINS).process(&mut samples);

    let scale = 1.0 / (BINS as f64 * BINS as f64);
    let half = BINS / 2;
    // reorder so the lowest frequency comes first
    (0..BINS)
        .map(|i| {
            let c = samples[(i + half) % BINS];
            (10.0 * (c.norm_sqr() * scale).max(1e-20).log10()) as f32
        })
        .collect()
}
