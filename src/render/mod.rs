//! Render backends: turn the history buffer and the current view into pixels.
//!
//! Two implementations share the [`RenderBackend`] trait:
//!
//! * [`gpu::GpuBackend`] mirrors the history into textures and draws the graph
//!   and the waterfall in a single fragment shader pass.
//! * [`canvas::CanvasBackend`] keeps pre-colored one-row strips and composes
//!   them with `tiny-skia`, scrolling the existing image when it can.
//!
//! Both read the same [`RenderParams`] and produce the same layout: the graph
//! on top, `1 - split_fraction` of the height, and the waterfall below it
//! with the newest row first.

pub mod canvas;
pub mod gpu;

use egui::Color32;
use thiserror::Error;

use crate::config::SpectrumConfig;
use crate::data::coords::ViewState;
use crate::data::history::HistoryBuffer;

pub use canvas::CanvasBackend;
pub use gpu::{GpuBackend, GpuContext, GpuError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gpu,
    Canvas,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("render surface of {width}x{height} could not be allocated")]
    Surface { width: u32, height: u32 },
}

/// Everything besides the history that a backend needs to draw a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pub view: ViewState,
    /// Power mapped to the bottom of the gradient.
    pub min_level: f32,
    /// Power mapped to the top of the gradient.
    pub max_level: f32,
    /// Weight of the newest frame in the graph average.
    pub averaging: f32,
    pub line_color: Color32,
    pub fill_color: Color32,
    pub background: Color32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self::from_config(&SpectrumConfig::default(), ViewState::default())
    }
}

impl RenderParams {
    pub fn from_config(cfg: &SpectrumConfig, view: ViewState) -> Self {
        let [r, g, b, a] = cfg.graph_line_color;
        let [fr, fg, fb, fa] = cfg.graph_fill_color;
        Self {
            view,
            min_level: cfg.min_level,
            max_level: cfg.max_level,
            averaging: cfg.averaging,
            line_color: Color32::from_rgba_unmultiplied(r, g, b, a),
            fill_color: Color32::from_rgba_unmultiplied(fr, fg, fb, fa),
            background: Color32::BLACK,
        }
    }

    /// Rows given to the graph on a surface `height` pixels tall.
    pub fn graph_height(&self, height: u32) -> u32 {
        let split = self.view.split_fraction.clamp(0.0, 1.0);
        (((1.0 - split) * height as f32).round() as u32).min(height)
    }
}

/// Tightly packed RGBA8 pixels, row-major, top row first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameImage {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// What a backend hands to the view for display.
pub enum SurfaceOutput<'a> {
    /// Nothing drawn yet.
    Empty,
    /// CPU pixels to upload as an egui texture.
    Raster(&'a tiny_skia::Pixmap),
    /// Native texture to register with the egui wgpu renderer. `generation`
    /// changes whenever the texture object itself is replaced.
    Gpu {
        view: &'a eframe::egui_wgpu::wgpu::TextureView,
        generation: u64,
    },
}

pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Take over a history that already holds rows, e.g. after a backend
    /// swap. Backends that can rebuild their state from it do so here.
    fn attach_history(&mut self, history: &HistoryBuffer, params: &RenderParams);

    /// Mirror the newest history row. Called once per ingested frame.
    fn ingest_frame(&mut self, history: &HistoryBuffer, params: &RenderParams);

    /// Draw the current history with `params`.
    fn render(&mut self, history: &HistoryBuffer, params: &RenderParams)
        -> Result<(), RenderError>;

    /// Forget cached pixels so the next render starts from scratch.
    fn invalidate(&mut self);

    fn resize(&mut self, width: u32, height: u32);

    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Bumped every time `render` produced new pixels.
    fn revision(&self) -> u64;

    fn output(&self) -> SurfaceOutput<'_>;

    /// Copy the last rendered frame to the CPU.
    fn read_pixels(&mut self) -> Result<FrameImage, RenderError>;
}

/// Pick a backend: the shader backend when asked for and available, the
/// raster backend otherwise.
pub fn select_backend(
    use_gpu: bool,
    float_textures: bool,
    gpu: Option<&GpuContext>,
    gradient_stretch: usize,
) -> Box<dyn RenderBackend> {
    if use_gpu {
        match gpu {
            Some(ctx) => match GpuBackend::new(ctx.clone(), float_textures, gradient_stretch) {
                Ok(backend) => {
                    tracing::debug!(
                        float = backend.uses_float_textures(),
                        "selected GPU render backend"
                    );
                    return Box::new(backend);
                }
                Err(err) => {
                    tracing::warn!(%err, "GPU backend unavailable, using canvas");
                }
            },
            None => tracing::debug!("no GPU context, using canvas backend"),
        }
    }
    Box::new(CanvasBackend::new(gradient_stretch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_height_follows_split() {
        let mut params = RenderParams::default();
        params.view.split_fraction = 0.75;
        assert_eq!(params.graph_height(200), 50);
        params.view.split_fraction = 1.0;
        assert_eq!(params.graph_height(200), 0);
        params.view.split_fraction = 0.0;
        assert_eq!(params.graph_height(200), 200);
    }

    #[test]
    fn canvas_is_selected_without_gpu() {
        let backend = select_backend(true, true, None, 8);
        assert_eq!(backend.kind(), BackendKind::Canvas);
    }
}
