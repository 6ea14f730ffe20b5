pub mod camera;
mod draw_list;
mod egui_overlay;
mod mesh_cache;
mod uniforms;

use crate::app::session::ViewportSession;
use crate::app::EguiFrame;
use draw_list::{build_draw_list, DrawItem, Pass};
use egui_overlay::EguiOverlay;
use mesh_cache::{MeshCache, Vertex};
use std::num::NonZeroU64;
use std::sync::Arc;
use uniforms::{FrameUniforms, ObjectUniforms, OBJECT_STRIDE};
use winit::dpi::PhysicalSize;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_OBJECT_CAPACITY: u64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no GPU adapter compatible with the window surface")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("window surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("GPU ran out of memory")]
    OutOfMemory,
}

struct Pipelines {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    shadow_catcher: wgpu::RenderPipeline,
    shadow: wgpu::RenderPipeline,
}

impl Pipelines {
    fn for_pass(&self, pass: Pass) -> &wgpu::RenderPipeline {
        match pass {
            Pass::Opaque => &self.opaque,
            Pass::Transparent => &self.transparent,
            Pass::ShadowCatcher => &self.shadow_catcher,
        }
    }
}

pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    shadow_view: wgpu::TextureView,
    shadow_map_size: u32,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    object_buffer: wgpu::Buffer,
    object_capacity: u64,
    object_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    pipelines: Pipelines,
    meshes: MeshCache,
    overlay: EguiOverlay,
}

impl RenderContext {
    pub fn new(window: Arc<Window>, shadow_map_size: u32) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("matview device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        log::info!("Surface format: {format:?}");
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_target(&device, config.width, config.height);

        let max_dimension = device.limits().max_texture_dimension_2d;
        let clamped_shadow_size = shadow_map_size.clamp(1, max_dimension);
        if clamped_shadow_size != shadow_map_size {
            log::warn!(
                "Shadow map size {shadow_map_size} exceeds GPU limit; using {clamped_shadow_size}"
            );
        }
        let shadow_view = create_shadow_map(&device, clamped_shadow_size);
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame layout"),
            entries: &[uniform_entry(false, std::mem::size_of::<FrameUniforms>() as u64)],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object layout"),
            entries: &[uniform_entry(true, OBJECT_STRIDE)],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame bind group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let (object_buffer, object_bind_group) =
            create_object_buffer(&device, &object_layout, INITIAL_OBJECT_CAPACITY);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow bind group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let pipelines = create_pipelines(
            &device,
            format,
            &[&frame_layout, &object_layout, &shadow_layout],
            &[&frame_layout, &object_layout],
        );
        let overlay = EguiOverlay::new(&device, format);

        log::info!(
            "Renderer ready: {}x{}, shadow map {clamped_shadow_size}",
            config.width,
            config.height
        );
        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            shadow_view,
            shadow_map_size: clamped_shadow_size,
            frame_buffer,
            frame_bind_group,
            object_layout,
            object_buffer,
            object_capacity: INITIAL_OBJECT_CAPACITY,
            object_bind_group,
            shadow_bind_group,
            pipelines,
            meshes: MeshCache::default(),
            overlay,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_target(&self.device, new_size.width, new_size.height);
    }

    /// Draws the session's scene followed by the UI overlay and presents.
    pub fn render(&mut self, session: &ViewportSession, ui: &EguiFrame) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => {
                log::warn!("Skipping frame: {err}");
                return Ok(());
            }
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let scene = session.scene();
        let camera = session.camera();
        let items = build_draw_list(scene, session.material(), camera.position);
        self.meshes
            .sync(&self.device, items.iter().map(|item| item.mesh.as_ref()));

        let mut frame = FrameUniforms::new(camera, &scene.lights, scene.background);
        frame.shadow_params[3] = 1.0 / self.shadow_map_size as f32;
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));
        self.upload_objects(session, &items);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        let size_in_pixels = [self.config.width, self.config.height];
        let callbacks = self.overlay.prepare(
            &self.device,
            &self.queue,
            &mut encoder,
            ui,
            size_in_pixels,
        );

        if scene.lights.key.shadow.is_some() {
            self.shadow_pass(&mut encoder, &items);
        }
        self.main_pass(&mut encoder, &target, &items, scene.background.to_linear());
        self.overlay.paint(&mut encoder, &target, ui, size_in_pixels);

        self.queue
            .submit(callbacks.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();
        self.overlay.finish(ui);
        Ok(())
    }

    fn upload_objects(&mut self, session: &ViewportSession, items: &[DrawItem]) {
        let needed = items.len() as u64;
        if needed > self.object_capacity {
            let capacity = needed.next_power_of_two();
            let (buffer, bind_group) =
                create_object_buffer(&self.device, &self.object_layout, capacity);
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
            self.object_capacity = capacity;
            log::debug!("object uniform buffer grown to {capacity} slots");
        }
        let objects: Vec<ObjectUniforms> = items
            .iter()
            .map(|item| {
                ObjectUniforms::new(item.world, item.slot, item.receive_shadow, session.material())
            })
            .collect();
        if !objects.is_empty() {
            self.queue
                .write_buffer(&self.object_buffer, 0, bytemuck::cast_slice(&objects));
        }
    }

    fn shadow_pass(&self, encoder: &mut wgpu::CommandEncoder, items: &[DrawItem]) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shadow pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipelines.shadow);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        for (index, item) in items.iter().enumerate() {
            if item.cast_shadow {
                self.draw_item(&mut pass, index, item);
            }
        }
    }

    fn main_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        items: &[DrawItem],
        clear: [f32; 3],
    ) {
        let [r, g, b] = clear;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(2, &self.shadow_bind_group, &[]);
        for (index, item) in items.iter().enumerate() {
            pass.set_pipeline(self.pipelines.for_pass(item.pass));
            self.draw_item(&mut pass, index, item);
        }
    }

    fn draw_item(&self, pass: &mut wgpu::RenderPass<'_>, index: usize, item: &DrawItem) {
        let Some(mesh) = self.meshes.get(item.mesh.id()) else {
            return;
        };
        let offset = (index as u64 * OBJECT_STRIDE) as u32;
        pass.set_bind_group(1, &self.object_bind_group, &[offset]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.meshes.clear();
        log::info!("Renderer released");
    }
}

fn uniform_entry(dynamic: bool, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

fn create_object_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    capacity: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("object uniforms"),
        size: capacity * OBJECT_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("object bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(OBJECT_STRIDE),
            }),
        }],
    });
    (buffer, bind_group)
}

fn create_depth_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_shadow_map(device: &wgpu::Device, size: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_pipelines(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    main_layouts: &[&wgpu::BindGroupLayout],
    shadow_layouts: &[&wgpu::BindGroupLayout],
) -> Pipelines {
    let physical = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("physical shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(
                include_str!("shaders/common.wgsl"),
                include_str!("shaders/physical.wgsl")
            )
            .into(),
        ),
    });
    let depth_only = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadow shader"),
        source: wgpu::ShaderSource::Wgsl(
            concat!(
                include_str!("shaders/common.wgsl"),
                include_str!("shaders/shadow.wgsl")
            )
            .into(),
        ),
    });
    let main_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene pipeline layout"),
        bind_group_layouts: main_layouts,
        push_constant_ranges: &[],
    });
    let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shadow pipeline layout"),
        bind_group_layouts: shadow_layouts,
        push_constant_ranges: &[],
    });

    let scene_pipeline = |label: &str, blend: Option<wgpu::BlendState>, depth_write: bool| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&main_layout),
            vertex: wgpu::VertexState {
                module: &physical,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &physical,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    };

    let shadow = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shadow pipeline"),
        layout: Some(&shadow_layout),
        vertex: wgpu::VertexState {
            module: &depth_only,
            entry_point: Some("vs_shadow"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    Pipelines {
        opaque: scene_pipeline("opaque pipeline", None, true),
        transparent: scene_pipeline(
            "transparent pipeline",
            Some(wgpu::BlendState::ALPHA_BLENDING),
            false,
        ),
        shadow_catcher: scene_pipeline(
            "shadow catcher pipeline",
            Some(wgpu::BlendState::ALPHA_BLENDING),
            false,
        ),
        shadow,
    }
}
