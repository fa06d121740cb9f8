//! Raster render backend built on `tiny-skia`.
//!
//! Every ingested frame is turned into a one-pixel-tall color strip right
//! away, using the level range in effect at that moment. Rendering then only
//! has to place strips: while the view stays put the waterfall image is
//! scrolled down by the number of new rows and only those rows are painted;
//! any change of the visible range, the split or the surface size repaints
//! every cached strip, oldest first.
//!
//! Strips are stretched onto the frequency axis with a scale transform and
//! nearest-neighbour sampling, which reproduces the shader's bin lookup.

use tiny_skia::{
    BlendMode, FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

use super::{BackendKind, FrameImage, RenderBackend, RenderError, RenderParams, SurfaceOutput};
use crate::data::coords::{BinLayout, CoordinateMapping, ViewState};
use crate::data::gradient::{default_gradient, normalize_level, GradientTable};
use crate::data::history::HistoryBuffer;
use egui::Color32;

struct Strip {
    pixels: Pixmap,
    center_freq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mirror {
    generation: u64,
    capacity: usize,
    bin_count: usize,
}

/// Inputs that, when changed, invalidate every painted waterfall row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PaintedLayout {
    view: ViewState,
    graph_height: u32,
    sample_rate: f64,
    bin_count: usize,
    background: Color32,
}

pub struct CanvasBackend {
    table: GradientTable,
    strips: Vec<Option<Strip>>,
    mirror: Option<Mirror>,
    width: u32,
    height: u32,
    surface: Option<Pixmap>,
    graph_mask: Option<(u32, Mask)>,
    average: Vec<f32>,
    average_center: f64,
    pending_rows: usize,
    painted: Option<PaintedLayout>,
    invalidated: bool,
    revision: u64,
    full_repaints: u64,
}

impl CanvasBackend {
    pub fn new(gradient_stretch: usize) -> Self {
        Self {
            table: default_gradient().build_stretched_table(gradient_stretch),
            strips: Vec::new(),
            mirror: None,
            width: 0,
            height: 0,
            surface: None,
            graph_mask: None,
            average: Vec::new(),
            average_center: f64::NAN,
            pending_rows: 0,
            painted: None,
            invalidated: true,
            revision: 0,
            full_repaints: 0,
        }
    }

    /// Number of renders that repainted the whole waterfall.
    pub fn full_repaints(&self) -> u64 {
        self.full_repaints
    }

    /// Strips currently cached.
    pub fn cached_rows(&self) -> usize {
        self.strips.iter().filter(|s| s.is_some()).count()
    }

    /// Exponentially averaged graph values, in dB.
    pub fn graph_average(&self) -> &[f32] {
        &self.average
    }

    fn mirror_of(history: &HistoryBuffer) -> Mirror {
        Mirror {
            generation: history.generation(),
            capacity: history.capacity(),
            bin_count: history.bin_count(),
        }
    }

    /// Follow a reallocation of the history. An instance that was already
    /// mirroring rebuilds its strips from what the history kept.
    fn sync_mirror(&mut self, history: &HistoryBuffer, params: &RenderParams) {
        let current = Self::mirror_of(history);
        if self.mirror == Some(current) {
            return;
        }
        let rebuild = self.mirror.is_some();
        self.mirror = Some(current);
        self.strips = (0..current.capacity).map(|_| None).collect();
        self.invalidated = true;
        if rebuild {
            for row in history.iter_oldest_first() {
                self.strips[row.slot] =
                    make_strip(&self.table, row.amplitudes, row.center_freq, params);
            }
        }
    }

    fn update_average(&mut self, bins: &[f32], center_freq: f64, alpha: f32) {
        // a retune or a new FFT size would smear unrelated spectra together
        if self.average.len() != bins.len() || self.average_center != center_freq {
            self.average.clear();
            self.average.extend_from_slice(bins);
            self.average_center = center_freq;
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        for (avg, &new) in self.average.iter_mut().zip(bins) {
            *avg = *avg * (1.0 - alpha) + new * alpha;
        }
    }

    fn ensure_surface(&mut self) -> Result<(), RenderError> {
        let fits = self
            .surface
            .as_ref()
            .is_some_and(|s| s.width() == self.width && s.height() == self.height);
        if !fits {
            let surface = Pixmap::new(self.width, self.height).ok_or(RenderError::Surface {
                width: self.width,
                height: self.height,
            })?;
            self.surface = Some(surface);
            self.graph_mask = None;
            self.invalidated = true;
        }
        Ok(())
    }

    fn ensure_graph_mask(&mut self, graph_height: u32) {
        if self.graph_mask.as_ref().map(|(h, _)| *h) == Some(graph_height) {
            return;
        }
        self.graph_mask = Rect::from_xywh(0.0, 0.0, self.width as f32, graph_height as f32)
            .zip(Mask::new(self.width, self.height))
            .map(|(rect, mut mask)| {
                mask.fill_path(
                    &PathBuilder::from_rect(rect),
                    FillRule::Winding,
                    false,
                    Transform::identity(),
                );
                (graph_height, mask)
            });
    }

    fn paint_waterfall(&mut self, history: &HistoryBuffer, params: &RenderParams, full: bool) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let width = self.width;
        let graph_height = params.graph_height(self.height);
        let rows = (self.height - graph_height) as usize;
        let mapping = params.view.mapping();
        let sample_rate = history.latest_sample_rate();
        let is_real = params.view.is_real_spectrum;

        let new_rows = if full {
            fill_rows(surface, graph_height, self.height, params.background);
            history.rows_filled().min(rows)
        } else {
            let n = self.pending_rows.min(rows);
            scroll_down(surface, graph_height, n as u32);
            n
        };

        // oldest first so the newest row is painted last
        for k in (0..new_rows).rev() {
            let y = graph_height + k as u32;
            fill_rows(surface, y, y + 1, params.background);
            let Some(row) = history.row_at(k) else {
                continue;
            };
            if let Some(strip) = self.strips.get(row.slot).and_then(Option::as_ref) {
                let layout = BinLayout::new(
                    strip.center_freq,
                    sample_rate,
                    strip.pixels.width() as usize,
                    is_real,
                );
                draw_strip(surface, strip, &layout, &mapping, width, y);
            }
        }
    }

    fn paint_graph(&mut self, history: &HistoryBuffer, params: &RenderParams) {
        let graph_height = params.graph_height(self.height);
        if graph_height == 0 {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            fill_rows(surface, 0, graph_height, params.background);
        }
        if self.average.is_empty() {
            return;
        }
        let layout = BinLayout::new(
            self.average_center,
            history.latest_sample_rate(),
            self.average.len(),
            params.view.is_real_spectrum,
        );
        let paths = graph_paths(
            &self.average,
            &layout,
            &params.view.mapping(),
            graph_height as f32,
            params.min_level,
            params.max_level,
        );
        let Some((fill, line)) = paths else {
            return;
        };
        self.ensure_graph_mask(graph_height);
        let (Some(surface), Some((_, mask))) = (self.surface.as_mut(), self.graph_mask.as_ref())
        else {
            return;
        };
        let mut paint = Paint::default();
        paint.anti_alias = true;
        let [r, g, b, a] = params.fill_color.to_srgba_unmultiplied();
        paint.set_color_rgba8(r, g, b, a);
        surface.fill_path(&fill, &paint, FillRule::Winding, Transform::identity(), Some(mask));
        let [r, g, b, a] = params.line_color.to_srgba_unmultiplied();
        paint.set_color_rgba8(r, g, b, a);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        surface.stroke_path(&line, &paint, &stroke, Transform::identity(), Some(mask));
    }
}

impl RenderBackend for CanvasBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Canvas
    }

    fn attach_history(&mut self, history: &HistoryBuffer, params: &RenderParams) {
        // strips are per instance and derived again from what the history kept
        self.mirror = Some(Self::mirror_of(history));
        self.strips = (0..history.capacity()).map(|_| None).collect();
        for row in history.iter_oldest_first() {
            self.strips[row.slot] = make_strip(&self.table, row.amplitudes, row.center_freq, params);
        }
        self.average.clear();
        if let Some(row) = history.newest() {
            self.update_average(row.amplitudes, row.center_freq, params.averaging);
        }
        self.pending_rows = 0;
        self.invalidated = true;
    }

    fn ingest_frame(&mut self, history: &HistoryBuffer, params: &RenderParams) {
        self.sync_mirror(history, params);
        let Some(row) = history.newest() else {
            return;
        };
        self.strips[row.slot] = make_strip(&self.table, row.amplitudes, row.center_freq, params);
        self.pending_rows += 1;
        self.update_average(row.amplitudes, row.center_freq, params.averaging);
    }

    fn render(
        &mut self,
        history: &HistoryBuffer,
        params: &RenderParams,
    ) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        self.ensure_surface()?;
        self.sync_mirror(history, params);

        let layout = PaintedLayout {
            view: params.view,
            graph_height: params.graph_height(self.height),
            sample_rate: history.latest_sample_rate(),
            bin_count: history.bin_count(),
            background: params.background,
        };
        let rows = (self.height - layout.graph_height) as usize;
        let full = self.invalidated || self.painted != Some(layout) || self.pending_rows >= rows;
        if full {
            self.full_repaints += 1;
        }
        self.paint_waterfall(history, params, full);
        self.paint_graph(history, params);

        self.painted = Some(layout);
        self.pending_rows = 0;
        self.invalidated = false;
        self.revision += 1;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.invalidated = true;
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn output(&self) -> SurfaceOutput<'_> {
        match &self.surface {
            Some(surface) if self.revision > 0 => SurfaceOutput::Raster(surface),
            _ => SurfaceOutput::Empty,
        }
    }

    fn read_pixels(&mut self) -> Result<FrameImage, RenderError> {
        let Some(surface) = self.surface.as_ref() else {
            return Ok(FrameImage::default());
        };
        let pixels = surface
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok(FrameImage {
            width: surface.width(),
            height: surface.height(),
            pixels,
        })
    }
}

fn make_strip(
    table: &GradientTable,
    amplitudes: &[f32],
    center_freq: f64,
    params: &RenderParams,
) -> Option<Strip> {
    let mut pixels = Pixmap::new(amplitudes.len() as u32, 1)?;
    let background = params.background.to_array();
    for (px, &power) in pixels.data_mut().chunks_exact_mut(4).zip(amplitudes) {
        let color = if power.is_nan() {
            background
        } else {
            table
                .lookup_linear(normalize_level(power, params.min_level, params.max_level))
                .to_array()
        };
        px.copy_from_slice(&color);
    }
    Some(Strip {
        pixels,
        center_freq,
    })
}

fn draw_strip(
    surface: &mut Pixmap,
    strip: &Strip,
    layout: &BinLayout,
    mapping: &CoordinateMapping,
    width: u32,
    y: u32,
) {
    let hz_per_pixel = mapping.hz_per_pixel();
    if hz_per_pixel <= 0.0 || layout.bin_width <= 0.0 || width == 0 {
        return;
    }
    let scale = (layout.bin_width / hz_per_pixel) as f32;
    let left = mapping.freq_to_pixel_x(layout.first_edge) as f32;
    let paint = PixmapPaint {
        opacity: 1.0,
        blend_mode: BlendMode::Source,
        quality: FilterQuality::Nearest,
    };
    surface.draw_pixmap(
        0,
        0,
        strip.pixels.as_ref(),
        &paint,
        Transform::from_row(scale, 0.0, 0.0, 1.0, left, y as f32),
        None,
    );
}

/// Fill rows `[from, to)` with an opaque color.
fn fill_rows(surface: &mut Pixmap, from: u32, to: u32, color: Color32) {
    let stride = surface.width() as usize * 4;
    let rgba = color.to_array();
    let data = surface.data_mut();
    let end = (to as usize * stride).min(data.len());
    let start = (from as usize * stride).min(end);
    for px in data[start..end].chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

/// Move everything below `top` down by `rows`, dropping what falls off.
fn scroll_down(surface: &mut Pixmap, top: u32, rows: u32) {
    if rows == 0 {
        return;
    }
    let stride = surface.width() as usize * 4;
    let height = surface.height() as usize;
    let (top, rows) = (top as usize, rows as usize);
    if top + rows >= height {
        return;
    }
    let data = surface.data_mut();
    data.copy_within(top * stride..(height - rows) * stride, (top + rows) * stride);
}

/// Filled area under the averaged curve and the curve itself.
fn graph_paths(
    average: &[f32],
    layout: &BinLayout,
    mapping: &CoordinateMapping,
    graph_height: f32,
    min_level: f32,
    max_level: f32,
) -> Option<(Path, Path)> {
    let points: Vec<(f32, f32)> = average
        .iter()
        .enumerate()
        .map(|(i, &power)| {
            let x = mapping.freq_to_pixel_x(layout.bin_center(i)) as f32;
            let v = normalize_level(power, min_level, max_level);
            (x, graph_height - v * graph_height)
        })
        .collect();
    let (&(first_x, _), &(last_x, _)) = (points.first()?, points.last()?);

    let mut fill = PathBuilder::new();
    fill.move_to(first_x, graph_height);
    for &(x, y) in &points {
        fill.line_to(x, y);
    }
    fill.line_to(last_x, graph_height);
    fill.close();

    let mut line = PathBuilder::new();
    line.move_to(points[0].0, points[0].1);
    for &(x, y) in &points[1..] {
        line.line_to(x, y);
    }
    Some((fill.finish()?, line.finish()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SpectrumFrame;

    fn params(width: f32) -> RenderParams {
        let mut p = RenderParams::default();
        p.view = ViewState::for_band(0.0, 64.0, false, width);
        p.view.split_fraction = 1.0;
        p.min_level = 0.0;
        p.max_level = 1.0;
        p
    }

    fn feed(h: &mut HistoryBuffer, b: &mut CanvasBackend, p: &RenderParams, value: f32) {
        h.ingest(SpectrumFrame::new(0.0, 64.0, vec![value; 16]));
        b.ingest_frame(h, p);
    }

    #[test]
    fn unchanged_view_scrolls_instead_of_repainting() {
        let p = params(32.0);
        let mut h = HistoryBuffer::new(16);
        let mut b = CanvasBackend::new(8);
        b.resize(32, 8);
        feed(&mut h, &mut b, &p, 1.0);
        b.render(&h, &p).unwrap();
        assert_eq!(b.full_repaints(), 1);

        feed(&mut h, &mut b, &p, 0.0);
        b.render(&h, &p).unwrap();
        assert_eq!(b.full_repaints(), 1);

        let img = b.read_pixels().unwrap();
        assert_eq!(img.pixel(16, 0), Some([0, 0, 0, 255]));
        assert_eq!(img.pixel(16, 1), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(16, 2), Some([0, 0, 0, 255]));
    }

    #[test]
    fn view_change_repaints_everything() {
        let mut p = params(32.0);
        let mut h = HistoryBuffer::new(16);
        let mut b = CanvasBackend::new(8);
        b.resize(32, 8);
        feed(&mut h, &mut b, &p, 1.0);
        b.render(&h, &p).unwrap();
        p.view.left_visible_freq = -16.0;
        p.view.right_visible_freq = 16.0;
        b.render(&h, &p).unwrap();
        assert_eq!(b.full_repaints(), 2);
    }

    #[test]
    fn average_reseeds_on_retune() {
        let mut b = CanvasBackend::new(8);
        b.update_average(&[0.0, 0.0], 1.0, 0.5);
        b.update_average(&[1.0, 1.0], 1.0, 0.5);
        assert_eq!(b.graph_average(), &[0.5, 0.5]);
        b.update_average(&[1.0, 1.0], 2.0, 0.5);
        assert_eq!(b.graph_average(), &[1.0, 1.0]);
    }

    #[test]
    fn attached_backend_rebuilds_strips_from_history() {
        let p = params(32.0);
        let mut h = HistoryBuffer::new(16);
        let mut first = CanvasBackend::new(8);
        feed(&mut h, &mut first, &p, 0.0);
        feed(&mut h, &mut first, &p, 1.0);
        assert_eq!(first.cached_rows(), 2);

        let mut second = CanvasBackend::new(8);
        second.resize(32, 8);
        second.attach_history(&h, &p);
        assert_eq!(second.cached_rows(), 2);
        assert_eq!(second.graph_average(), &[1.0; 16]);

        second.render(&h, &p).unwrap();
        let img = second.read_pixels().unwrap();
        assert_eq!(img.pixel(16, 0), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(16, 1), Some([0, 0, 0, 255]));
    }
}
