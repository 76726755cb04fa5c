use std::sync::Arc;

use anyhow::Context;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::document::Document;
use crate::notices::NoticeBoard;
use crate::platform::HostPlatform;
use crate::recognition::RecognitionBackend;
use crate::settings::Settings;
use crate::state::{GpuContext, InputState, QuadBuffers};
use crate::texture::CanvasTexture;
use crate::vertex::{QUAD_INDICES, QUAD_VERTICES, Vertex};

pub struct State {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    pub gpu: GpuContext<'static>,
    pub quad: QuadBuffers,
    pub canvas_texture: CanvasTexture,
    pub input: InputState,

    pub document: Document,
    pub platform: HostPlatform,
    /// Canvas generation currently on the GPU.
    pub uploaded: Option<u64>,
    pub notice_board: NoticeBoard,
    pub title: String,
}

/// Logical canvas size for a physical window size.
pub fn logical_size(size: PhysicalSize<u32>, scale: f64) -> (u32, u32) {
    let logical = size.to_logical::<f64>(scale);
    (logical.width.round() as u32, logical.height.round() as u32)
}

fn recognition_backend(settings: &Settings) -> Box<dyn RecognitionBackend> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let _ = settings;
            Box::new(crate::recognition::web::WebBackend)
        } else {
            use crate::recognition::{tesseract::TesseractEngine, ThreadedBackend};
            Box::new(ThreadedBackend::new(TesseractEngine::new(
                settings.tesseract_program.clone(),
                settings.language.clone(),
            )))
        }
    }
}

fn host_platform(settings: &Settings) -> HostPlatform {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let _ = settings;
            HostPlatform::new()
        } else {
            HostPlatform::new(settings.export_dir.clone())
        }
    }
}

impl State {
    pub async fn new(window: Arc<Window>, settings: Settings) -> anyhow::Result<State> {
        let mut size = window.inner_size();

        #[cfg(target_arch = "wasm32")]
        {
            if size.width == 0 || size.height == 0 {
                size = PhysicalSize::new(1920, 1080);
            }
        }
        size.width = size.width.max(1);
        size.height = size.height.max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let texture_layout = CanvasTexture::bind_group_layout(&device);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../data/shaders/blit.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let quad = QuadBuffers {
            vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad Vertex Buffer"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad Index Buffer"),
                contents: bytemuck::cast_slice(&QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            }),
            count: QUAD_INDICES.len() as u32,
        };

        let scale = window.scale_factor();
        let document = Document::new(
            settings.clone(),
            logical_size(size, scale),
            scale as f32,
            recognition_backend(&settings),
        );
        let canvas_texture = CanvasTexture::new(&device, &texture_layout, document.canvas.physical_size());

        log::info!(
            "canvas ready: {}x{} physical, scale {scale}, format {surface_format:?}",
            size.width,
            size.height
        );

        Ok(Self {
            window,
            size,
            gpu: GpuContext {
                surface,
                device,
                queue,
                config,
                blit_pipeline,
                texture_layout,
            },
            quad,
            canvas_texture,
            input: InputState::default(),
            document,
            platform: host_platform(&settings),
            uploaded: None,
            notice_board: NoticeBoard::default(),
            title: String::new(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}
