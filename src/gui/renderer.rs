//! wgpu renderer that draws a single RGBA texture over the whole window.

use anyhow::{anyhow, Context};
use wgpu::*;
use winit::window::Window;

use crate::resolution::Resolution;

const BACKGROUND: Color = Color::BLACK;

struct Gpu {
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    async fn open(instance: &Instance, surface: &Surface) -> anyhow::Result<Self> {
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                compatible_surface: Some(surface),
                ..Default::default()
            })
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        let info = adapter.get_info();
        log::info!(
            "using {:?} adapter {} ({:?})",
            info.backend,
            info.name,
            info.device_type,
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

struct Texture {
    inner: wgpu::Texture,
    size: Extent3d,
}

impl Texture {
    const FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

    fn create(gpu: &Gpu, size: Extent3d) -> Self {
        let inner = gpu.device.create_texture(&TextureDescriptor {
            label: Some("frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self { inner, size }
    }

    /// Uploads `data`, reallocating the texture if `size` changed. Returns whether it did.
    fn update(&mut self, gpu: &Gpu, size: Extent3d, data: &[u8]) -> bool {
        assert_eq!((size.width * size.height * 4) as usize, data.len());

        let mut reallocated = false;
        if self.size != size {
            log::trace!(
                "reallocating frame texture ({}x{} -> {}x{})",
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
            *self = Self::create(gpu, size);
            reallocated = true;
        }

        gpu.queue.write_texture(
            ImageCopyTexture {
                texture: &self.inner,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );

        reallocated
    }
}

fn create_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let sampler = device.create_sampler(&SamplerDescriptor::default());
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("frame_bind_group"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(
                    &texture.inner.create_view(&Default::default()),
                ),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

pub struct Renderer {
    gpu: Gpu,
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    texture: Texture,

    /// Surface must be destroyed before `Window`.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window) -> anyhow::Result<Self> {
        // The OpenGL backend panics spuriously, so don't enable it.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let surface = unsafe { instance.create_surface(&window)? };
        let gpu = pollster::block_on(Gpu::open(&instance, &surface))?;

        let surface_format = *surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .context("adapter cannot render to window surface")?;

        let shader = gpu.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });

        let pipeline = gpu
            .device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("textured_quad"),
                layout: Some(
                    &gpu.device
                        .create_pipeline_layout(&PipelineLayoutDescriptor {
                            label: None,
                            bind_group_layouts: &[&bind_group_layout],
                            push_constant_ranges: &[],
                        }),
                ),
                vertex: VertexState {
                    module: &shader,
                    entry_point: "vert",
                    buffers: &[],
                },
                fragment: Some(FragmentState {
                    module: &shader,
                    entry_point: "frag",
                    targets: &[Some(ColorTargetState {
                        format: surface_format,
                        write_mask: ColorWrites::ALL,
                        blend: None,
                    })],
                }),
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
            });

        let texture = Texture::create(&gpu, Extent3d::default());
        let bind_group = create_bind_group(&gpu.device, &bind_group_layout, &texture);

        let this = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            bind_group_layout,
            bind_group,
            texture,
            window,
        };
        this.configure_surface();
        Ok(this)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Replaces the displayed image with `data`, which holds RGBA8 pixels.
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.texture.update(&self.gpu, size, data) {
            // The bind group refers to the old texture.
            self.bind_group =
                create_bind_group(&self.gpu.device, &self.bind_group_layout, &self.texture);
        }
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.configure_surface();
                self.surface
                    .get_current_texture()
                    .context("failed to acquire next frame after reconfiguring surface")?
            }
            Err(SurfaceError::Timeout) => {
                log::debug!("timed out acquiring a frame, skipping redraw");
                return Ok(());
            }
            Err(e) => return Err(e).context("failed to acquire frame"),
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    fn configure_surface(&self) {
        let size = self.window.inner_size();
        log::debug!(
            "configuring surface at {}x{} (format: {:?})",
            size.width,
            size.height,
            self.surface_format,
        );
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };
        self.surface.configure(&self.gpu.device, &config);
    }
}
