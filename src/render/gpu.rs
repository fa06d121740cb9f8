//! Shader render backend on `wgpu`.
//!
//! The history is mirrored into a texture with one row per history slot,
//! plus a one-texel-wide texture with each row's center frequency. Both are
//! kept current row by row as frames arrive; the fragment shader in
//! `shaders/spectrum.wgsl` then draws the graph and the waterfall straight
//! from them into an offscreen target that egui samples.
//!
//! Values are stored as `R32Float` when the adapter allows it. Otherwise they
//! are quantized to `R8Unorm` with the level range in effect at upload time,
//! so older rows keep the range they were written with.
//!
//! GPU objects live in [`GpuState::Ready`]. Any reason to distrust them (a
//! reallocated history, an explicit [`GpuBackend::mark_context_lost`]) drops
//! back to [`GpuState::Uninitialized`], and the next render rebuilds all of
//! them from the history buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use eframe::egui_wgpu::{self, wgpu};
use egui::Color32;
use thiserror::Error;

use super::{BackendKind, FrameImage, RenderBackend, RenderError, RenderParams, SurfaceOutput};
use crate::data::coords::BinLayout;
use crate::data::gradient::{default_gradient, quantize_level, GradientTable};
use crate::data::history::HistoryBuffer;

/// Rows blended into the graph's running average.
const AVERAGE_ROWS: u32 = 16;

/// Retune distance after which frequencies are re-based before going to the
/// shader as `f32` offsets. Keeps offsets of on-screen rows below ~0.1 Hz error.
const REBASE_DISTANCE_HZ: f64 = 1.0e6;

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("{what} of {size} texels exceeds the device limit of {limit}")]
    TooLarge {
        what: &'static str,
        size: u32,
        limit: u32,
    },
    #[error("GPU readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
    #[error("waiting for the GPU failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("GPU readback was abandoned")]
    ReadbackAborted,
    #[error("GPU device was lost")]
    DeviceLost,
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Device and queue the backend draws with, shared with egui when running
/// inside eframe.
#[derive(Clone)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    float_textures: bool,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Open a device without a window, e.g. for tests and offline rendering.
    pub fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("livespectrum-headless"),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            ..Default::default()
        }))?;
        Ok(Self::new(&adapter, device, queue))
    }

    /// Reuse the device eframe renders with.
    pub fn from_render_state(state: &egui_wgpu::RenderState) -> Self {
        Self::new(&state.adapter, state.device.clone(), state.queue.clone())
    }

    fn new(adapter: &wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let float_textures = adapter
            .get_texture_format_features(wgpu::TextureFormat::R32Float)
            .allowed_usages
            .contains(wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST);
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::warn!(?reason, %message, "GPU device lost");
            flag.store(true, Ordering::SeqCst);
        });
        tracing::debug!(float_textures, "GPU context ready");
        Self {
            device,
            queue,
            float_textures,
            lost,
        }
    }

    /// Whether `R32Float` history textures are available.
    pub fn supports_float_textures(&self) -> bool {
        self.float_textures
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn max_texture_side(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend state
// ─────────────────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default)]
struct Uniforms {
    surface: [f32; 4],
    history: [f32; 4],
    freq: [f32; 4],
    levels: [f32; 4],
    misc: [f32; 4],
    line_color: [f32; 4],
    fill_color: [f32; 4],
    background: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mirror {
    generation: u64,
    capacity: usize,
    bin_count: usize,
}

struct GpuResources {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniforms: wgpu::Buffer,
    history: wgpu::Texture,
    centers: wgpu::Texture,
    output: Output,
    mirror: Mirror,
}

struct Output {
    texture: wgpu::Texture,
    render_view: wgpu::TextureView,
    display_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

enum GpuState {
    Uninitialized,
    Ready(Box<GpuResources>),
}

pub struct GpuBackend {
    ctx: GpuContext,
    state: GpuState,
    float_textures: bool,
    table: GradientTable,
    reference_freq: f64,
    width: u32,
    height: u32,
    rendered: bool,
    revision: u64,
    output_generation: u64,
    initializations: u64,
}

impl GpuBackend {
    /// Create a backend on `ctx`. Float textures are used when requested and
    /// supported; GPU objects are created lazily by the first render.
    pub fn new(
        ctx: GpuContext,
        float_textures: bool,
        gradient_stretch: usize,
    ) -> Result<Self, GpuError> {
        if ctx.is_lost() {
            return Err(GpuError::DeviceLost);
        }
        let float_textures = float_textures && ctx.supports_float_textures();
        Ok(Self {
            ctx,
            state: GpuState::Uninitialized,
            float_textures,
            table: default_gradient().build_stretched_table(gradient_stretch),
            reference_freq: 0.0,
            width: 0,
            height: 0,
            rendered: false,
            revision: 0,
            output_generation: 0,
            initializations: 0,
        })
    }

    pub fn uses_float_textures(&self) -> bool {
        self.float_textures
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GpuState::Ready(_))
    }

    /// How many times the GPU objects were (re)built.
    pub fn initializations(&self) -> u64 {
        self.initializations
    }

    /// Forget every GPU object, as after a lost context. The next render
    /// rebuilds them and re-uploads the history.
    pub fn mark_context_lost(&mut self) {
        if self.is_ready() {
            tracing::warn!("GPU context marked lost, rebuilding on next render");
        }
        self.state = GpuState::Uninitialized;
        self.rendered = false;
    }

    fn history_format(&self) -> wgpu::TextureFormat {
        if self.float_textures {
            wgpu::TextureFormat::R32Float
        } else {
            wgpu::TextureFormat::R8Unorm
        }
    }

    fn check_size(&self, what: &'static str, size: u32) -> Result<(), GpuError> {
        let limit = self.ctx.max_texture_side();
        if size > limit {
            return Err(GpuError::TooLarge { what, size, limit });
        }
        Ok(())
    }

    fn initialize(
        &mut self,
        history: &HistoryBuffer,
        params: &RenderParams,
    ) -> Result<GpuResources, GpuError> {
        let bins = history.bin_count().max(1) as u32;
        let capacity = history.capacity() as u32;
        self.check_size("bin count", bins)?;
        self.check_size("history depth", capacity)?;

        let device = &self.ctx.device;
        let history_tex = create_texture(
            device,
            "spectrum-history",
            bins,
            capacity,
            self.history_format(),
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let centers = create_texture(
            device,
            "spectrum-centers",
            1,
            capacity,
            wgpu::TextureFormat::R32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let gradient = create_texture(
            device,
            "spectrum-gradient",
            self.table.len() as u32,
            1,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        write_texture_row(
            &self.ctx.queue,
            &gradient,
            0,
            &self.table.to_rgba_bytes(),
            self.table.len() as u32 * 4,
        );

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spectrum-uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (pipeline, layout) = create_pipeline(device);
        let history_view = history_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let centers_view = centers.create_view(&wgpu::TextureViewDescriptor::default());
        let gradient_view = gradient.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spectrum-bind-group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&history_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&centers_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&gradient_view),
                },
            ],
        });

        let output = create_output(device, self.width, self.height);
        self.output_generation += 1;
        self.initializations += 1;
        self.reference_freq = history.newest().map_or(0.0, |row| row.center_freq);

        let resources = GpuResources {
            pipeline,
            bind_group,
            uniforms,
            history: history_tex,
            centers,
            output,
            mirror: Mirror {
                generation: history.generation(),
                capacity: history.capacity(),
                bin_count: history.bin_count(),
            },
        };
        for slot in 0..history.capacity() {
            self.upload_slot(&resources, history, slot, params);
        }
        tracing::debug!(
            bins,
            capacity,
            float = self.float_textures,
            rows = history.rows_filled(),
            "GPU resources initialized"
        );
        Ok(resources)
    }

    fn upload_slot(
        &self,
        res: &GpuResources,
        history: &HistoryBuffer,
        slot: usize,
        params: &RenderParams,
    ) {
        let Some(row) = history.slot(slot) else {
            return;
        };
        let bins = row.amplitudes.len() as u32;
        if self.float_textures {
            // NaN bins read as "below range" rather than poisoning the shader math
            let values: Vec<f32> = row
                .amplitudes
                .iter()
                .map(|&p| if p.is_nan() { f32::MIN } else { p })
                .collect();
            write_texture_row(
                &self.ctx.queue,
                &res.history,
                slot as u32,
                bytemuck::cast_slice(&values),
                bins * 4,
            );
        } else {
            let values: Vec<u8> = row
                .amplitudes
                .iter()
                .map(|&p| quantize_level(p, params.min_level, params.max_level))
                .collect();
            write_texture_row(&self.ctx.queue, &res.history, slot as u32, &values, bins);
        }
        self.upload_center(res, row.center_freq, slot);
    }

    fn upload_center(&self, res: &GpuResources, center_freq: f64, slot: usize) {
        let center = (center_freq - self.reference_freq) as f32;
        write_texture_row(
            &self.ctx.queue,
            &res.centers,
            slot as u32,
            bytemuck::bytes_of(&center),
            4,
        );
    }

    fn uniforms(&self, history: &HistoryBuffer, params: &RenderParams) -> Uniforms {
        let view = &params.view;
        let layout = BinLayout::new(
            0.0,
            history.latest_sample_rate(),
            history.bin_count(),
            view.is_real_spectrum,
        );
        let bin_width = if layout.bin_width > 0.0 {
            layout.bin_width
        } else {
            1.0
        };
        Uniforms {
            surface: [
                self.width as f32,
                self.height as f32,
                params.graph_height(self.height) as f32,
                history.bin_count() as f32,
            ],
            history: [
                history.capacity() as f32,
                history.slice_ptr() as f32,
                history.rows_filled() as f32,
                AVERAGE_ROWS as f32,
            ],
            freq: [
                (view.left_visible_freq - self.reference_freq) as f32,
                view.visible_span() as f32,
                bin_width as f32,
                layout.first_edge as f32,
            ],
            levels: [
                params.min_level,
                params.max_level,
                params.averaging.clamp(0.0, 1.0),
                if self.float_textures { 0.0 } else { 1.0 },
            ],
            misc: [self.table.len() as f32, 0.0, 0.0, 0.0],
            line_color: color_to_vec4(params.line_color),
            fill_color: color_to_vec4(params.fill_color),
            background: color_to_vec4(params.background),
        }
    }

    fn ensure_ready(
        &mut self,
        history: &HistoryBuffer,
        params: &RenderParams,
    ) -> Result<(), GpuError> {
        let mirror = Mirror {
            generation: history.generation(),
            capacity: history.capacity(),
            bin_count: history.bin_count(),
        };
        self.check_size("surface width", self.width)?;
        self.check_size("surface height", self.height)?;
        if let GpuState::Ready(res) = &mut self.state {
            if res.mirror == mirror {
                if (res.output.width, res.output.height) != (self.width, self.height) {
                    res.output = create_output(&self.ctx.device, self.width, self.height);
                    self.output_generation += 1;
                }
                return Ok(());
            }
        }
        let resources = self.initialize(history, params)?;
        self.state = GpuState::Ready(Box::new(resources));
        Ok(())
    }
}

impl RenderBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn attach_history(&mut self, _history: &HistoryBuffer, _params: &RenderParams) {
        // the next render uploads the whole history
        self.state = GpuState::Uninitialized;
        self.rendered = false;
    }

    fn ingest_frame(&mut self, history: &HistoryBuffer, params: &RenderParams) {
        let GpuState::Ready(res) = &self.state else {
            return;
        };
        let in_sync = res.mirror
            == Mirror {
                generation: history.generation(),
                capacity: history.capacity(),
                bin_count: history.bin_count(),
            };
        if !in_sync {
            self.state = GpuState::Uninitialized;
            return;
        }
        let Some(row) = history.newest() else {
            return;
        };
        let rebase = needs_rebase(self.reference_freq, row.center_freq);
        if rebase {
            tracing::debug!(
                from = self.reference_freq,
                to = row.center_freq,
                "re-basing shader frequency reference"
            );
            self.reference_freq = row.center_freq;
        }
        let GpuState::Ready(res) = &self.state else {
            return;
        };
        if rebase {
            for old in history.iter_oldest_first() {
                self.upload_center(res, old.center_freq, old.slot);
            }
        }
        self.upload_slot(res, history, row.slot, params);
    }

    fn render(
        &mut self,
        history: &HistoryBuffer,
        params: &RenderParams,
    ) -> Result<(), RenderError> {
        if self.ctx.is_lost() {
            self.state = GpuState::Uninitialized;
            return Err(GpuError::DeviceLost.into());
        }
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        self.ensure_ready(history, params)?;
        let uniforms = self.uniforms(history, params);
        let GpuState::Ready(res) = &self.state else {
            return Ok(());
        };

        self.ctx
            .queue
            .write_buffer(&res.uniforms, 0, bytemuck::bytes_of(&uniforms));
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("spectrum-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("spectrum-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &res.output.render_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&res.pipeline);
            pass.set_bind_group(0, &res.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        self.rendered = true;
        self.revision += 1;
        Ok(())
    }

    fn invalidate(&mut self) {
        // every render redraws the full surface; nothing cached to drop
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn output(&self) -> SurfaceOutput<'_> {
        match &self.state {
            GpuState::Ready(res) if self.rendered => SurfaceOutput::Gpu {
                view: &res.output.display_view,
                generation: self.output_generation,
            },
            _ => SurfaceOutput::Empty,
        }
    }

    fn read_pixels(&mut self) -> Result<FrameImage, RenderError> {
        let GpuState::Ready(res) = &self.state else {
            return Ok(FrameImage::default());
        };
        if !self.rendered {
            return Ok(FrameImage::default());
        }
        Ok(read_texture(&self.ctx, &res.output)?)
    }
}

fn needs_rebase(reference_freq: f64, center_freq: f64) -> bool {
    (center_freq - reference_freq).abs() > REBASE_DISTANCE_HZ
}

// ─────────────────────────────────────────────────────────────────────────────
// wgpu helpers
// ─────────────────────────────────────────────────────────────────────────────

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn write_texture_row(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    row: u32,
    data: &[u8],
    bytes_per_row: u32,
) {
    let texels = texture.width();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: row, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: texels,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
}

fn create_output(device: &wgpu::Device, width: u32, height: u32) -> Output {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("spectrum-output"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[DISPLAY_FORMAT],
    });
    let render_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    // egui treats texture contents as sRGB-encoded, like its own textures
    let display_view = texture.create_view(&wgpu::TextureViewDescriptor {
        format: Some(DISPLAY_FORMAT),
        ..Default::default()
    });
    Output {
        texture,
        render_view,
        display_view,
        width: width.max(1),
        height: height.max(1),
    }
}

fn create_pipeline(device: &wgpu::Device) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("spectrum-shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/spectrum.wgsl").into()),
    });
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("spectrum-bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
        ],
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("spectrum-pipeline-layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("spectrum-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: OUTPUT_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    });
    (pipeline, layout)
}

fn read_texture(ctx: &GpuContext, output: &Output) -> Result<FrameImage, GpuError> {
    let (width, height) = (output.width, output.height);
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;
    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spectrum-readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("spectrum-readback-encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &output.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv().map_err(|_| GpuError::ReadbackAborted)??;

    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    buffer.unmap();
    Ok(FrameImage {
        width,
        height,
        pixels,
    })
}

fn color_to_vec4(color: Color32) -> [f32; 4] {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_eight_vec4s() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 128);
    }

    #[test]
    fn reference_moves_only_on_large_retunes() {
        assert!(!needs_rebase(100e6, 100.5e6));
        assert!(!needs_rebase(100e6, 99e6));
        assert!(needs_rebase(100e6, 101.5e6));
        assert!(needs_rebase(0.0, 2.4e9));
        // f32 steps are 256 Hz this far from the reference
        let offset = 2_300_000_100.0_f64;
        assert!((offset as f32 as f64 - offset).abs() > 1.0);
    }
}
