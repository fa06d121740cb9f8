//! egui widget showing a [`SpectrumRenderer`] with its axis and marks.

use eframe::egui_wgpu::{self, wgpu};
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Ui};

use crate::data::coords::{CoordinateMapping, ViewState};
use crate::overlays::{
    split_after_drag, split_handle_y, AxisLayout, FrequencyAxisLabeler, LabelSource, PlacedMark,
    ReceiverMark, ReceiverMarkOverlay, RecordKind,
};
use crate::persistence::{save_split_fraction, KeyValueStore};
use crate::reactive::ComponentId;
use crate::render::SurfaceOutput;
use crate::renderer::SpectrumRenderer;

const AXIS_ROW_HEIGHT: f32 = 14.0;
const AXIS_ROWS: usize = 3;
const SPLIT_GRAB: f32 = 4.0;
/// Zoom factor per scrolled point.
const ZOOM_PER_POINT: f64 = 0.003;

/// Inputs that vary per frame.
pub struct ViewInputs<'a> {
    /// Components the scheduler drained this frame.
    pub pending: &'a [ComponentId],
    pub labels: Option<&'a dyn LabelSource>,
    pub receivers: &'a [ReceiverMark],
    /// Where the split position is persisted when the user moves it.
    pub store: Option<&'a mut dyn KeyValueStore>,
}

pub struct SpectrumView {
    axis: FrequencyAxisLabeler,
    marks: ReceiverMarkOverlay,
    axis_layout: AxisLayout,
    axis_view: Option<ViewState>,
    placed_marks: Vec<PlacedMark>,
    marks_view: Option<ViewState>,
    raster: Option<TextureHandle>,
    raster_revision: u64,
    native: Option<(egui::TextureId, u64)>,
    wgpu_state: Option<egui_wgpu::RenderState>,
}

impl SpectrumView {
    pub fn new(min_tick_spacing: f32, wgpu_state: Option<egui_wgpu::RenderState>) -> Self {
        Self {
            axis: FrequencyAxisLabeler::new(min_tick_spacing),
            marks: ReceiverMarkOverlay::new(),
            axis_layout: AxisLayout::default(),
            axis_view: None,
            placed_marks: Vec::new(),
            marks_view: None,
            raster: None,
            raster_revision: u64::MAX,
            native: None,
            wgpu_state,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut Ui,
        renderer: &mut SpectrumRenderer,
        inputs: ViewInputs<'_>,
    ) -> egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::drag());
        let axis_rect = Rect::from_min_size(
            rect.min,
            egui::vec2(rect.width(), AXIS_ROW_HEIGHT * AXIS_ROWS as f32),
        );
        let plot_rect = Rect::from_min_max(egui::pos2(rect.left(), axis_rect.bottom()), rect.max);

        let ppp = ui.ctx().pixels_per_point();
        let width_px = (plot_rect.width() * ppp).round().max(1.0) as u32;
        let height_px = (plot_rect.height() * ppp).round().max(1.0) as u32;
        renderer.resize(width_px, height_px);

        self.handle_split_drag(ui, plot_rect, renderer, inputs.store);
        let mapping = renderer.settings().view_state(width_px as f32).mapping();
        self.handle_pan_zoom(ui, &response, plot_rect, ppp, &mapping, renderer);

        if let Err(err) = renderer.redraw() {
            tracing::error!(%err, "spectrum redraw failed");
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::BLACK);
        if let Some(texture) = self.texture_for(ui.ctx(), renderer) {
            let uv = Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0));
            painter.image(texture, plot_rect, uv, Color32::WHITE);
        }

        let view = renderer.settings().view_state(width_px as f32);
        let mapping = view.mapping();
        let to_points = |x: f32| plot_rect.left() + x / ppp;

        if self.axis_view != Some(view) || inputs.pending.contains(&ComponentId::AXIS) {
            self.axis_layout = self.axis.layout(&mapping, inputs.labels);
            self.axis_view = Some(view);
        }
        self.paint_axis(&painter, axis_rect, &to_points);

        if self.marks_view != Some(view) || inputs.pending.contains(&ComponentId::MARKS) {
            self.placed_marks = self.marks.layout(&mapping, inputs.receivers);
            self.marks_view = Some(view);
        }
        self.paint_marks(&painter, plot_rect, &to_points);

        let split_y = plot_rect.top()
            + split_handle_y(renderer.settings().split_fraction.get(), plot_rect.height());
        painter.hline(
            plot_rect.x_range(),
            split_y,
            Stroke::new(1.0, Color32::from_gray(90)),
        );
        response
    }

    fn handle_split_drag(
        &mut self,
        ui: &Ui,
        plot_rect: Rect,
        renderer: &SpectrumRenderer,
        store: Option<&mut dyn KeyValueStore>,
    ) {
        let settings = renderer.settings();
        let y = plot_rect.top() + split_handle_y(settings.split_fraction.get(), plot_rect.height());
        let grab = Rect::from_x_y_ranges(plot_rect.x_range(), (y - SPLIT_GRAB)..=(y + SPLIT_GRAB));
        let handle = ui
            .interact(grab, ui.id().with("split_handle"), Sense::drag())
            .on_hover_cursor(egui::CursorIcon::ResizeVertical);
        if handle.dragged() {
            let dy = handle.drag_delta().y;
            let split = split_after_drag(settings.split_fraction.get(), dy, plot_rect.height());
            settings.set_split_fraction(split);
        }
        if handle.drag_stopped() {
            if let Some(store) = store {
                if let Err(err) = save_split_fraction(store, settings.split_fraction.get()) {
                    tracing::warn!(%err, "could not persist split position");
                }
            }
        }
    }

    fn handle_pan_zoom(
        &self,
        ui: &Ui,
        response: &egui::Response,
        plot_rect: Rect,
        ppp: f32,
        mapping: &CoordinateMapping,
        renderer: &SpectrumRenderer,
    ) {
        let settings = renderer.settings();
        if response.dragged() {
            let dx = (response.drag_delta().x * ppp) as f64;
            settings.pan_by(-dx * mapping.hz_per_pixel());
        }
        if response.double_clicked() {
            settings.reset_zoom();
        }
        let Some(pointer) = response.hover_pos().filter(|p| plot_rect.contains(*p)) else {
            return;
        };
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll != 0.0 {
            let anchor = mapping.pixel_x_to_freq(((pointer.x - plot_rect.left()) * ppp) as f64);
            settings.zoom_around((-(scroll as f64) * ZOOM_PER_POINT).exp(), anchor);
        }
    }

    fn texture_for(
        &mut self,
        ctx: &egui::Context,
        renderer: &SpectrumRenderer,
    ) -> Option<egui::TextureId> {
        let revision = renderer.backend().revision();
        match renderer.output() {
            SurfaceOutput::Empty => None,
            SurfaceOutput::Raster(pixmap) => {
                self.release_native();
                let size = [pixmap.width() as usize, pixmap.height() as usize];
                if revision != self.raster_revision || self.raster.is_none() {
                    let image = egui::ColorImage::from_rgba_premultiplied(size, pixmap.data());
                    match &mut self.raster {
                        Some(texture) => texture.set(image, TextureOptions::NEAREST),
                        None => {
                            self.raster =
                                Some(ctx.load_texture("spectrum", image, TextureOptions::NEAREST))
                        }
                    }
                    self.raster_revision = revision;
                }
                self.raster.as_ref().map(TextureHandle::id)
            }
            SurfaceOutput::Gpu { view, generation } => {
                self.raster = None;
                let state = self.wgpu_state.as_ref()?;
                let mut egui_renderer = state.renderer.write();
                match self.native {
                    Some((id, current)) if current == generation => Some(id),
                    Some((id, _)) => {
                        egui_renderer.update_egui_texture_from_wgpu_texture(
                            &state.device,
                            view,
                            wgpu::FilterMode::Nearest,
                            id,
                        );
                        self.native = Some((id, generation));
                        Some(id)
                    }
                    None => {
                        let id = egui_renderer.register_native_texture(
                            &state.device,
                            view,
                            wgpu::FilterMode::Nearest,
                        );
                        self.native = Some((id, generation));
                        Some(id)
                    }
                }
            }
        }
    }

    fn release_native(&mut self) {
        if let (Some((id, _)), Some(state)) = (self.native.take(), self.wgpu_state.as_ref()) {
            state.renderer.write().free_texture(&id);
        }
    }

    fn paint_axis(&self, painter: &egui::Painter, axis_rect: Rect, to_points: &impl Fn(f32) -> f32) {
        painter.rect_filled(axis_rect, 0.0, Color32::from_gray(20));
        let font = FontId::monospace(11.0);
        for label in &self.axis_layout.labels {
            if label.level >= AXIS_ROWS {
                continue;
            }
            let y = axis_rect.bottom() - AXIS_ROW_HEIGHT * (label.level as f32 + 0.5);
            let x = to_points(label.x);
            match label.kind {
                RecordKind::Tick => {
                    painter.vline(
                        x,
                        (axis_rect.bottom() - 3.0)..=axis_rect.bottom(),
                        Stroke::new(1.0, Color32::GRAY),
                    );
                    painter.text(
                        egui::pos2(x, y),
                        Align2::CENTER_CENTER,
                        &label.text,
                        font.clone(),
                        Color32::LIGHT_GRAY,
                    );
                }
                RecordKind::Channel => {
                    painter.text(
                        egui::pos2(x, y),
                        Align2::LEFT_CENTER,
                        &label.text,
                        font.clone(),
                        Color32::from_rgb(120, 200, 255),
                    );
                }
                RecordKind::Group | RecordKind::Band => {
                    let x_end = to_points(label.x_end).max(x + 1.0);
                    let band = Rect::from_x_y_ranges(
                        x..=x_end,
                        (y - AXIS_ROW_HEIGHT * 0.5)..=(y + AXIS_ROW_HEIGHT * 0.5),
                    );
                    painter.rect_stroke(
                        band,
                        2.0,
                        Stroke::new(1.0, Color32::from_rgb(200, 170, 90)),
                        egui::StrokeKind::Inside,
                    );
                    painter.text(
                        egui::pos2(x + 2.0, y),
                        Align2::LEFT_CENTER,
                        &label.text,
                        font.clone(),
                        Color32::from_rgb(230, 200, 120),
                    );
                }
            }
        }
    }

    fn paint_marks(&self, painter: &egui::Painter, plot_rect: Rect, to_points: &impl Fn(f32) -> f32) {
        let font = FontId::proportional(12.0);
        for mark in &self.placed_marks {
            let low = to_points(mark.x_low);
            let high = to_points(mark.x_high).max(low + 1.0);
            painter.rect_filled(
                Rect::from_x_y_ranges(low..=high, plot_rect.y_range()),
                0.0,
                Color32::from_rgba_unmultiplied(255, 255, 255, 24),
            );
            let center = to_points(mark.x_center);
            painter.vline(
                center,
                plot_rect.y_range(),
                Stroke::new(1.0, Color32::from_rgb(255, 90, 90)),
            );
            painter.text(
                egui::pos2(center + 3.0, plot_rect.top() + 2.0 + mark.level as f32 * 14.0),
                Align2::LEFT_TOP,
                &mark.label,
                font.clone(),
                Color32::WHITE,
            );
        }
    }
}
