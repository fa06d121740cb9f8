//! LiveSpectrum crate root: re-exports and module wiring.
//!
//! A realtime spectrum display for software radios: a graph of the latest
//! power spectrum on top, a scrolling waterfall of past spectra below, a
//! frequency axis and receiver marks on top of both.
//!
//! Modules:
//! - `sink`: frame type and the channel used to feed frames
//! - `codec`: binary spectrum messages as sent by a radio server
//! - `config`: YAML configuration
//! - `data`: history ring, gradient, frequency mapping, label layout helpers
//! - `reactive`: observable cells and the redraw scheduler
//! - `settings`: the observable view parameters
//! - `render`: GPU (wgpu) and raster (tiny-skia) backends
//! - `renderer`: history + backend orchestration
//! - `overlays`: frequency axis and receiver marks
//! - `view`, `app`: egui widget and the eframe application
//! - `persistence`, `snapshot`: remembered view state and PNG export

pub mod app;
pub mod codec;
pub mod config;
pub mod data;
pub mod overlays;
pub mod persistence;
pub mod reactive;
pub mod render;
pub mod renderer;
pub mod settings;
pub mod sink;
pub mod snapshot;
pub mod view;

// Public re-exports for a compact external API
pub use app::{run_spectrum, run_spectrum_with, SpectrumApp};
pub use config::{ConfigError, SpectrumConfig};
pub use data::history::HistoryBuffer;
pub use render::{BackendKind, GpuContext, RenderBackend, RenderParams};
pub use renderer::SpectrumRenderer;
pub use settings::SpectrumSettings;
pub use sink::{channel_spectrum, SpectrumFrame, SpectrumSink};
