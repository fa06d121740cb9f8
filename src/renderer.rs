//! The orchestrator: owns the history and the active backend and decides
//! when to draw.

use std::cell::Cell as StdCell;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

use crate::config::SpectrumConfig;
use crate::data::history::HistoryBuffer;
use crate::reactive::{Cell, ComponentId, Scheduler};
use crate::render::{
    select_backend, BackendKind, FrameImage, GpuContext, RenderBackend, RenderError, RenderParams,
    SurfaceOutput,
};
use crate::settings::SpectrumSettings;
use crate::sink::SpectrumFrame;

/// Owns a [`HistoryBuffer`] and one [`RenderBackend`].
///
/// Frames are ingested as they arrive; drawing is deferred to [`redraw`],
/// which the UI calls once per animation frame and which does nothing unless
/// something changed. Any number of frames or setting changes between two
/// animation frames cost one render.
///
/// [`redraw`]: SpectrumRenderer::redraw
pub struct SpectrumRenderer {
    history: HistoryBuffer,
    backend: Box<dyn RenderBackend>,
    gpu: Option<GpuContext>,
    settings: SpectrumSettings,
    scheduler: Rc<Scheduler>,
    dirty: Rc<StdCell<bool>>,
    attached: bool,
    min_depth: usize,
    gradient_stretch: usize,
    base_params: RenderParams,
    backend_choice: (bool, bool),
    redraws: Cell<u64>,
}

impl SpectrumRenderer {
    /// Build a renderer. `gpu` is the device to draw with when the settings
    /// ask for the shader backend; without it the raster backend is used.
    pub fn new(
        cfg: &SpectrumConfig,
        settings: SpectrumSettings,
        scheduler: Rc<Scheduler>,
        gpu: Option<GpuContext>,
    ) -> Self {
        let history = HistoryBuffer::new(cfg.history_depth);
        let choice = (settings.use_gpu.get(), settings.float_textures.get());
        let mut backend = select_backend(choice.0, choice.1, gpu.as_ref(), cfg.gradient_stretch);
        let base_params = RenderParams::from_config(cfg, settings.view_state(0.0));
        backend.attach_history(&history, &base_params);

        let dirty = Rc::new(StdCell::new(true));
        let mark_dirty = {
            let dirty = Rc::clone(&dirty);
            let trigger = scheduler.trigger(ComponentId::WATERFALL);
            move || {
                dirty.set(true);
                trigger();
            }
        };
        let mark_dirty: Rc<dyn Fn()> = Rc::new(mark_dirty);
        let s = &settings;
        subscribe_to(&s.visible_range, &mark_dirty);
        subscribe_to(&s.band, &mark_dirty);
        subscribe_to(&s.is_real_spectrum, &mark_dirty);
        subscribe_to(&s.split_fraction, &mark_dirty);
        subscribe_to(&s.averaging, &mark_dirty);
        subscribe_to(&s.min_level, &mark_dirty);
        subscribe_to(&s.max_level, &mark_dirty);
        subscribe_to(&s.use_gpu, &mark_dirty);
        subscribe_to(&s.float_textures, &mark_dirty);

        Self {
            history,
            backend,
            gpu,
            settings,
            scheduler,
            dirty,
            attached: true,
            min_depth: cfg.history_depth.max(1),
            gradient_stretch: cfg.gradient_stretch,
            base_params,
            backend_choice: choice,
            redraws: Cell::new(0),
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Counts completed renders. Overlays subscribe to repaint in step with
    /// the waterfall.
    pub fn redraw_counter(&self) -> &Cell<u64> {
        &self.redraws
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Stop (or resume) drawing, e.g. while the view is not on screen.
    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
        if attached {
            self.mark_dirty();
        }
    }

    /// Parameters of the next render, from the current settings.
    pub fn params(&self) -> RenderParams {
        let (width, _) = self.backend.size();
        RenderParams {
            view: self.settings.view_state(width as f32),
            min_level: self.settings.min_level.get(),
            max_level: self.settings.max_level.get(),
            averaging: self.settings.averaging.get(),
            ..self.base_params
        }
    }

    /// Store a frame and schedule a redraw. Returns `false` for frames the
    /// history ignored.
    pub fn ingest(&mut self, frame: SpectrumFrame) -> bool {
        let (center, rate) = (frame.center_freq, frame.sample_rate);
        if !self.history.ingest(frame) {
            return false;
        }
        let is_real = self.settings.is_real_spectrum.get();
        self.settings.set_band(center, rate, is_real);
        let params = self.params();
        self.backend.ingest_frame(&self.history, &params);
        self.mark_dirty();
        true
    }

    /// Ingest everything waiting on `rx`. Returns the number of frames taken.
    pub fn drain(&mut self, rx: &Receiver<SpectrumFrame>) -> usize {
        let mut count = 0;
        for frame in rx.try_iter() {
            self.ingest(frame);
            count += 1;
        }
        count
    }

    /// Surface size changed. Grows the history to at least one row per pixel.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.backend.size() == (width, height) {
            return;
        }
        let depth = self.min_depth.max(height as usize);
        if depth > self.history.capacity() {
            tracing::debug!(depth, "growing history to surface height");
            self.history.resize_capacity(depth);
        }
        self.backend.resize(width, height);
        self.backend.invalidate();
        self.mark_dirty();
    }

    /// Drop every retained frame.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.backend.invalidate();
        self.mark_dirty();
    }

    /// Switch between the shader and raster backends, keeping the history.
    pub fn set_use_gpu(&mut self, use_gpu: bool) {
        self.settings.use_gpu.set(use_gpu);
        self.sync_backend_choice();
    }

    /// Install `backend` in place of the current one. The history stays; the
    /// new backend derives whatever it caches from it.
    pub fn replace_backend(&mut self, mut backend: Box<dyn RenderBackend>) {
        let (width, height) = self.backend.size();
        backend.resize(width, height);
        backend.attach_history(&self.history, &self.params());
        tracing::debug!(from = ?self.backend.kind(), to = ?backend.kind(), "render backend swapped");
        self.backend = backend;
        self.mark_dirty();
    }

    fn sync_backend_choice(&mut self) {
        let choice = (
            self.settings.use_gpu.get(),
            self.settings.float_textures.get(),
        );
        if choice == self.backend_choice {
            return;
        }
        self.backend_choice = choice;
        let backend = select_backend(choice.0, choice.1, self.gpu.as_ref(), self.gradient_stretch);
        self.replace_backend(backend);
    }

    fn mark_dirty(&self) {
        self.dirty.set(true);
        self.scheduler.schedule(ComponentId::WATERFALL);
    }

    /// Render if anything changed since the last render and the view is
    /// attached. Returns whether a render happened.
    ///
    /// A failing shader backend is replaced by the raster backend and the
    /// frame is drawn again with it.
    pub fn redraw(&mut self) -> Result<bool, RenderError> {
        if !self.dirty.get() || !self.attached {
            return Ok(false);
        }
        self.sync_backend_choice();
        let params = self.params();
        if let Err(err) = self.backend.render(&self.history, &params) {
            if self.backend.kind() != BackendKind::Gpu {
                return Err(err);
            }
            tracing::warn!(%err, "GPU rendering failed, falling back to canvas");
            self.gpu = None;
            let canvas = select_backend(false, false, None, self.gradient_stretch);
            self.replace_backend(canvas);
            self.backend.render(&self.history, &params)?;
        }
        self.dirty.set(false);
        self.redraws.update(|n| n + 1);
        Ok(true)
    }

    pub fn output(&self) -> SurfaceOutput<'_> {
        self.backend.output()
    }

    pub fn read_pixels(&mut self) -> Result<FrameImage, RenderError> {
        self.backend.read_pixels()
    }
}

fn subscribe_to<T: Clone + PartialEq>(cell: &Cell<T>, callback: &Rc<dyn Fn()>) {
    let callback = Rc::clone(callback);
    cell.subscribe(move || callback());
}
