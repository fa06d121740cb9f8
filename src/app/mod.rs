//! Native application shell around the spectrum view.
//!
//! | Sub-module | Responsibility |
//! | ---------- | -------------- |
//! | [`run`]    | [`run_spectrum()`] entry points and icon loading |
//!
//! [`SpectrumApp`] is an ordinary [`eframe::App`], so it can also be embedded
//! in a host application that drives its own event loop.

mod run;

pub use run::{run_spectrum, run_spectrum_with};

use std::rc::Rc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use eframe::egui;
use eframe::egui_wgpu;

use crate::config::SpectrumConfig;
use crate::overlays::{LabelSource, ReceiverMark};
use crate::persistence::{load_split_fraction, JsonFileStore, KeyValueStore};
use crate::reactive::{ComponentId, Scheduler};
use crate::render::{BackendKind, GpuContext};
use crate::renderer::SpectrumRenderer;
use crate::settings::SpectrumSettings;
use crate::sink::SpectrumFrame;
use crate::snapshot;
use crate::view::{SpectrumView, ViewInputs};

pub struct SpectrumApp {
    rx: Receiver<SpectrumFrame>,
    renderer: SpectrumRenderer,
    view: SpectrumView,
    scheduler: Rc<Scheduler>,
    labels: Option<Box<dyn LabelSource>>,
    receivers: Vec<ReceiverMark>,
    store: Option<Box<dyn KeyValueStore>>,
    attached: bool,
    status: Option<String>,
}

impl SpectrumApp {
    /// Build the app. `wgpu_state` is eframe's renderer state when running
    /// on the wgpu backend; the shader backend draws on the same device.
    pub fn new(
        rx: Receiver<SpectrumFrame>,
        cfg: &SpectrumConfig,
        wgpu_state: Option<egui_wgpu::RenderState>,
    ) -> Self {
        let store: Option<Box<dyn KeyValueStore>> =
            cfg.state_file
                .as_ref()
                .and_then(|path| match JsonFileStore::open(path) {
                    Ok(store) => Some(Box::new(store) as Box<dyn KeyValueStore>),
                    Err(err) => {
                        tracing::warn!(%err, path = %path.display(), "state file unavailable");
                        None
                    }
                });

        let settings = SpectrumSettings::from_config(cfg);
        if let Some(split) = store.as_deref().and_then(|s| load_split_fraction(s)) {
            settings.set_split_fraction(split);
        }

        let scheduler = Scheduler::new();
        for id in [ComponentId::AXIS, ComponentId::MARKS] {
            let trigger = scheduler.trigger(id);
            settings.visible_range.subscribe(trigger);
        }

        let gpu = wgpu_state.as_ref().map(GpuContext::from_render_state);
        let renderer = SpectrumRenderer::new(cfg, settings, Rc::clone(&scheduler), gpu);
        Self {
            rx,
            renderer,
            view: SpectrumView::new(cfg.min_tick_spacing, wgpu_state),
            scheduler,
            labels: None,
            receivers: Vec::new(),
            store,
            attached: true,
            status: None,
        }
    }

    /// Ask egui for a frame whenever something schedules a redraw.
    pub fn set_repaint_context(&self, ctx: egui::Context) {
        self.scheduler.set_waker(move || ctx.request_repaint());
    }

    /// Show channel, group and band labels from `labels` on the axis.
    pub fn with_labels(mut self, labels: Box<dyn LabelSource>) -> Self {
        labels
            .revision()
            .subscribe(self.scheduler.trigger(ComponentId::AXIS));
        self.labels = Some(labels);
        self.scheduler.schedule(ComponentId::AXIS);
        self
    }

    pub fn set_receivers(&mut self, receivers: Vec<ReceiverMark>) {
        if receivers != self.receivers {
            self.receivers = receivers;
            self.scheduler.schedule(ComponentId::MARKS);
        }
    }

    pub fn renderer(&self) -> &SpectrumRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SpectrumRenderer {
        &mut self.renderer
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        use egui_phosphor::regular as icons;
        ui.horizontal(|ui| {
            let settings = self.renderer.settings().clone();

            let mut use_gpu = settings.use_gpu.get();
            if ui
                .toggle_value(&mut use_gpu, format!("{} GPU", icons::CPU))
                .on_hover_text("Render with the shader backend when a GPU is available")
                .changed()
            {
                self.renderer.set_use_gpu(use_gpu);
            }

            let mut float_textures = settings.float_textures.get();
            if ui
                .add_enabled(
                    self.renderer.backend_kind() == BackendKind::Gpu,
                    egui::Checkbox::new(&mut float_textures, "Float history"),
                )
                .on_hover_text("Keep full-precision levels on the GPU")
                .changed()
            {
                settings.float_textures.set(float_textures);
            }

            ui.separator();
            let mut min_level = settings.min_level.get();
            let mut max_level = settings.max_level.get();
            ui.label("Levels");
            if ui
                .add(egui::DragValue::new(&mut min_level).suffix(" dB").speed(0.5))
                .changed()
            {
                settings.min_level.set(min_level.min(max_level - 1.0));
            }
            if ui
                .add(egui::DragValue::new(&mut max_level).suffix(" dB").speed(0.5))
                .changed()
            {
                settings.max_level.set(max_level.max(min_level + 1.0));
            }

            let mut averaging = settings.averaging.get();
            if ui
                .add(egui::Slider::new(&mut averaging, 0.01..=1.0).text("Averaging"))
                .changed()
            {
                settings.averaging.set(averaging);
            }

            ui.separator();
            if ui
                .button(icons::MAGNIFYING_GLASS_MINUS)
                .on_hover_text("Show the whole band")
                .clicked()
            {
                settings.reset_zoom();
            }
            if ui
                .button(icons::BROOM)
                .on_hover_text("Clear the waterfall")
                .clicked()
            {
                self.renderer.clear_history();
            }
            if ui
                .button(icons::CAMERA)
                .on_hover_text("Save the current view as PNG")
                .clicked()
            {
                self.prompt_and_save_snapshot();
            }

            if let Some(status) = &self.status {
                ui.separator();
                ui.weak(status);
            }
        });
    }

    fn prompt_and_save_snapshot(&mut self) {
        let frame = match self.renderer.read_pixels() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(%err, "could not read back the spectrum");
                self.status = Some(format!("Snapshot failed: {err}"));
                return;
            }
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(snapshot::default_file_name())
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };
        self.status = Some(match snapshot::save_png(&frame, &path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(err) => {
                tracing::error!(%err, "could not save snapshot");
                format!("Snapshot failed: {err}")
            }
        });
    }
}

impl eframe::App for SpectrumApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        if minimized == self.attached {
            self.attached = !minimized;
            self.renderer.set_attached(self.attached);
        }

        self.renderer.drain(&self.rx);
        let pending = self.scheduler.drain();

        egui::TopBottomPanel::top("spectrum_toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let inputs = ViewInputs {
                    pending: &pending,
                    labels: self.labels.as_deref(),
                    receivers: &self.receivers,
                    store: self
                        .store
                        .as_mut()
                        .map(|s| s.as_mut() as &mut dyn KeyValueStore),
                };
                self.view.show(ui, &mut self.renderer, inputs);
            });

        // frames arrive from other threads, which cannot wake the scheduler
        ctx.request_repaint_after(Duration::from_millis(16));
    }
}
