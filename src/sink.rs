//! Spectrum frame type and the channel used to feed frames into the display.
//!
//! Producers (network clients, FFT threads, the demo generator) hold a
//! [`SpectrumSink`] and push frames at whatever rate they like. The UI thread
//! drains the matching receiver once per animation frame; there is no
//! backpressure, older frames simply end up in the history buffer together.

use std::sync::mpsc::{Receiver, SendError, Sender};

/// One FFT-derived power-vs-frequency snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Center frequency of the spectrum in Hz.
    pub center_freq: f64,
    /// Bandwidth covered by `bins`, in Hz.
    pub sample_rate: f64,
    /// Power per bin, in dB.
    pub bins: Vec<f32>,
}

impl SpectrumFrame {
    pub fn new(center_freq: f64, sample_rate: f64, bins: Vec<f32>) -> Self {
        Self {
            center_freq,
            sample_rate,
            bins,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }
}

/// Convenience sender for feeding frames into a spectrum display.
#[derive(Clone)]
pub struct SpectrumSink {
    tx: Sender<SpectrumFrame>,
}

impl SpectrumSink {
    /// Send one frame. Fails only when the display has been dropped.
    pub fn send_frame(&self, frame: SpectrumFrame) -> Result<(), SendError<SpectrumFrame>> {
        self.tx.send(frame)
    }

    /// Build and send a frame from its parts.
    #[inline]
    pub fn send(
        &self,
        center_freq: f64,
        sample_rate: f64,
        bins: Vec<f32>,
    ) -> Result<(), SendError<SpectrumFrame>> {
        self.send_frame(SpectrumFrame::new(center_freq, sample_rate, bins))
    }
}

/// Create a new channel pair: `(SpectrumSink, Receiver<SpectrumFrame>)`.
pub fn channel_spectrum() -> (SpectrumSink, Receiver<SpectrumFrame>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (SpectrumSink { tx }, rx)
}
