//! Top-level entry point for running the spectrum display as a native window.

use std::sync::mpsc::Receiver;

use eframe::egui;

use super::SpectrumApp;
use crate::config::SpectrumConfig;
use crate::sink::SpectrumFrame;

/// Open a native window showing frames received on `rx`.
///
/// The window uses eframe's wgpu renderer, and the shader backend shares
/// its device. When no GPU is available the raster backend takes over.
///
/// The call blocks until the window is closed.
pub fn run_spectrum(rx: Receiver<SpectrumFrame>, cfg: SpectrumConfig) -> eframe::Result<()> {
    run_spectrum_with(rx, cfg, |app| app)
}

/// Like [`run_spectrum`], with a hook to configure the app (labels,
/// receiver marks) once it exists.
pub fn run_spectrum_with(
    rx: Receiver<SpectrumFrame>,
    mut cfg: SpectrumConfig,
    setup: impl FnOnce(SpectrumApp) -> SpectrumApp + 'static,
) -> eframe::Result<()> {
    cfg.sanitize();
    let title = cfg.title.clone();
    let mut opts = cfg.native_options.take().unwrap_or_default();
    opts.renderer = eframe::Renderer::Wgpu;

    if opts.viewport.icon.is_none() {
        if let Some(icon) = load_app_icon_svg() {
            opts.viewport = opts.viewport.clone().with_icon(icon);
        }
    }
    if opts.viewport.inner_size.is_none() {
        opts.viewport = opts
            .viewport
            .clone()
            .with_inner_size(egui::vec2(1200.0, 800.0));
    }

    eframe::run_native(
        &title,
        opts,
        Box::new(move |cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            if cc.wgpu_render_state.is_none() {
                tracing::warn!("wgpu renderer unavailable, drawing on the CPU");
            }
            let app = setup(SpectrumApp::new(rx, &cfg, cc.wgpu_render_state.clone()));
            app.set_repaint_context(cc.egui_ctx.clone());
            Ok(Box::new(app))
        }),
    )
}

/// Render the bundled `icon.svg` for the window icon.
fn load_app_icon_svg() -> Option<egui::IconData> {
    let svg_path = concat!(env!("CARGO_MANIFEST_DIR"), "/icon.svg");
    let data = std::fs::read(svg_path).ok()?;

    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(&data, &opt).ok()?;
    let size = tree.size().to_int_size();
    if size.width() == 0 || size.height() == 0 {
        return None;
    }
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Some(egui::IconData {
        rgba: pixmap.take(),
        width: size.width(),
        height: size.height(),
    })
}
