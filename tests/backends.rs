use livespectrum::data::coords::ViewState;
use livespectrum::data::history::HistoryBuffer;
use livespectrum::reactive::Scheduler;
use livespectrum::render::{
    BackendKind, CanvasBackend, FrameImage, GpuBackend, GpuContext, GpuError, RenderBackend,
    RenderError, RenderParams, SurfaceOutput,
};
use livespectrum::{SpectrumConfig, SpectrumFrame, SpectrumRenderer, SpectrumSettings};

const BINS: usize = 64;
const WIDTH: u32 = 256;
const HEIGHT: u32 = 64;
const FRAMES: usize = 24;

fn params() -> RenderParams {
    let mut view = ViewState::for_band(0.0, BINS as f64, false, WIDTH as f32);
    view.split_fraction = 0.5;
    RenderParams {
        view,
        min_level: -100.0,
        max_level: 0.0,
        ..RenderParams::default()
    }
}

fn frame(index: usize) -> SpectrumFrame {
    let bins = (0..BINS)
        .map(|b| -100.0 + ((b * 7 + index * 13) % 101) as f32)
        .collect();
    SpectrumFrame::new(0.0, BINS as f64, bins)
}

/// Feed `FRAMES` frames through `backend` and read back the rendered image.
fn render_with(backend: &mut dyn RenderBackend, history: &mut HistoryBuffer) -> FrameImage {
    let params = params();
    backend.resize(WIDTH, HEIGHT);
    backend.attach_history(history, &params);
    for i in 0..FRAMES {
        history.ingest(frame(i));
        backend.ingest_frame(history, &params);
    }
    backend.render(history, &params).expect("render");
    backend.read_pixels().expect("read back")
}

fn assert_waterfalls_match(a: &FrameImage, b: &FrameImage, tolerance: u8) {
    let graph_height = params().graph_height(HEIGHT);
    for y in graph_height..HEIGHT {
        for bin in 0..BINS as u32 {
            let x = bin * 4 + 1;
            let pa = a.pixel(x, y).expect("pixel a");
            let pb = b.pixel(x, y).expect("pixel b");
            for c in 0..4 {
                let diff = pa[c].abs_diff(pb[c]);
                assert!(
                    diff <= tolerance,
                    "pixel ({x}, {y}) channel {c}: {pa:?} vs {pb:?}"
                );
            }
        }
    }
}

#[test]
fn canvas_rows_show_newest_first() {
    let mut history = HistoryBuffer::new(128);
    let mut canvas = CanvasBackend::new(32);
    let image = render_with(&mut canvas, &mut history);
    assert_eq!((image.width, image.height), (WIDTH, HEIGHT));

    let graph_height = params().graph_height(HEIGHT);
    let table = livespectrum::data::gradient::default_gradient().build_stretched_table(32);
    let newest = frame(FRAMES - 1);
    for bin in [0usize, 17, 63] {
        let v = (newest.bins[bin] + 100.0) / 100.0;
        let expected = table.lookup_linear(v);
        let px = image.pixel(bin as u32 * 4 + 1, graph_height).unwrap();
        assert_eq!(px, expected.to_array(), "bin {bin}");
    }
    // rows beyond the filled history stay background
    let empty_row = graph_height + FRAMES as u32;
    assert_eq!(image.pixel(10, empty_row), Some([0, 0, 0, 255]));
}

#[test]
fn canvas_scrolls_instead_of_repainting() {
    let mut history = HistoryBuffer::new(128);
    let mut canvas = CanvasBackend::new(32);
    let before = render_with(&mut canvas, &mut history);
    assert_eq!(canvas.full_repaints(), 1);

    let params = params();
    history.ingest(frame(FRAMES));
    canvas.ingest_frame(&history, &params);
    canvas.render(&history, &params).unwrap();
    assert_eq!(canvas.full_repaints(), 1);
    let after = canvas.read_pixels().unwrap();

    // the previous newest row moved down by one
    let graph_height = params.graph_height(HEIGHT);
    for x in (1..WIDTH).step_by(4) {
        assert_eq!(
            after.pixel(x, graph_height + 1),
            before.pixel(x, graph_height)
        );
    }

    // a scrolled image equals a repaint from scratch
    let mut fresh_history = HistoryBuffer::new(128);
    let mut fresh = CanvasBackend::new(32);
    fresh.resize(WIDTH, HEIGHT);
    fresh.attach_history(&fresh_history, &params);
    for i in 0..=FRAMES {
        fresh_history.ingest(frame(i));
        fresh.ingest_frame(&fresh_history, &params);
    }
    fresh.render(&fresh_history, &params).unwrap();
    assert_waterfalls_match(&after, &fresh.read_pixels().unwrap(), 0);
}

#[test]
fn renderer_swaps_backends_without_losing_history() {
    let cfg = SpectrumConfig {
        history_depth: 32,
        use_gpu: false,
        ..Default::default()
    };
    let settings = SpectrumSettings::from_config(&cfg);
    let mut renderer = SpectrumRenderer::new(&cfg, settings, Scheduler::new(), None);
    renderer.resize(WIDTH, HEIGHT);
    for i in 0..FRAMES {
        renderer.ingest(frame(i));
    }
    assert!(renderer.redraw().unwrap());
    assert_eq!(renderer.backend_kind(), BackendKind::Canvas);

    // without a GPU context the request falls back to a new canvas
    renderer.set_use_gpu(true);
    assert!(renderer.redraw().unwrap());
    assert_eq!(renderer.backend_kind(), BackendKind::Canvas);
    assert_eq!(renderer.history().rows_filled(), FRAMES);

    // the view follows the band of the ingested frames
    let (left, right) = renderer.settings().visible_range.get();
    assert_eq!((left, right), (-32.0, 32.0));
}

/// Stands in for a shader backend whose device went away.
struct LostDevice {
    size: (u32, u32),
}

impl RenderBackend for LostDevice {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn attach_history(&mut self, _: &HistoryBuffer, _: &RenderParams) {}

    fn ingest_frame(&mut self, _: &HistoryBuffer, _: &RenderParams) {}

    fn render(&mut self, _: &HistoryBuffer, _: &RenderParams) -> Result<(), RenderError> {
        Err(GpuError::DeviceLost.into())
    }

    fn invalidate(&mut self) {}

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn revision(&self) -> u64 {
        0
    }

    fn output(&self) -> SurfaceOutput<'_> {
        SurfaceOutput::Empty
    }

    fn read_pixels(&mut self) -> Result<FrameImage, RenderError> {
        Ok(FrameImage::default())
    }
}

#[test]
fn device_loss_falls_back_to_canvas_with_history_intact() {
    let cfg = SpectrumConfig {
        history_depth: 32,
        use_gpu: false,
        min_level: -100.0,
        max_level: 0.0,
        split_fraction: 1.0,
        ..Default::default()
    };
    let settings = SpectrumSettings::from_config(&cfg);
    let mut renderer = SpectrumRenderer::new(&cfg, settings, Scheduler::new(), None);
    renderer.resize(WIDTH, HEIGHT);
    renderer.replace_backend(Box::new(LostDevice { size: (0, 0) }));
    assert_eq!(renderer.backend_kind(), BackendKind::Gpu);
    for _ in 0..10 {
        renderer.ingest(SpectrumFrame::new(0.0, BINS as f64, vec![0.0; BINS]));
    }

    assert!(renderer.redraw().unwrap());
    assert_eq!(renderer.backend_kind(), BackendKind::Canvas);
    assert_eq!(renderer.history().rows_filled(), 10);

    let image = renderer.read_pixels().unwrap();
    assert_eq!(image.pixel(WIDTH / 2, 0), Some([255, 0, 0, 255]));
    assert_eq!(image.pixel(WIDTH / 2, 9), Some([255, 0, 0, 255]));
    assert_eq!(image.pixel(WIDTH / 2, 10), Some([0, 0, 0, 255]));
}

fn gpu() -> GpuContext {
    GpuContext::headless().expect("these tests need a GPU adapter")
}

#[test]
#[ignore = "needs a GPU adapter"]
fn gpu_and_canvas_waterfalls_agree() {
    let ctx = gpu();
    let mut canvas = CanvasBackend::new(32);
    let expected = render_with(&mut canvas, &mut HistoryBuffer::new(128));

    for float_textures in [true, false] {
        let mut gpu = GpuBackend::new(ctx.clone(), float_textures, 32).expect("gpu backend");
        let image = render_with(&mut gpu, &mut HistoryBuffer::new(128));
        assert_eq!((image.width, image.height), (WIDTH, HEIGHT));
        // one 8-bit step of the gradient table
        assert_waterfalls_match(&image, &expected, 4);
    }
}

#[test]
#[ignore = "needs a GPU adapter"]
fn gpu_rebuilds_after_context_loss() {
    let ctx = gpu();
    let params = params();
    let mut history = HistoryBuffer::new(128);
    let mut gpu = GpuBackend::new(ctx, true, 32).expect("gpu backend");
    let before = render_with(&mut gpu, &mut history);
    assert_eq!(gpu.initializations(), 1);

    gpu.mark_context_lost();
    assert!(!gpu.is_ready());
    gpu.render(&history, &params).unwrap();
    assert_eq!(gpu.initializations(), 2);
    let after = gpu.read_pixels().unwrap();
    assert_waterfalls_match(&after, &before, 0);
}
