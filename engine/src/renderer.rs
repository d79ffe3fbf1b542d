use crate::batch::{SpriteBatch, INDICES_PER_SPRITE, VERTICES_PER_SPRITE};
use crate::buffer::{GpuIndexBuffer, GpuVertexBuffer};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::pipelines;
use crate::texture::TextureBinding;
use crate::vertex::SpriteVertex;
use anyhow::{Context, Result};
use log::{error, warn};
use pollster::block_on;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wgpu::*;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Owns the GPU side of sprite batching: fixed-capacity vertex/index
/// buffers sized from the sprite limit, the camera uniform and the sprite
/// pipeline. Each frame it rebuilds dirty groups, uploads only the changed
/// buffer regions and issues one draw call per non-empty group.
pub struct BatchRenderer {
    surface: Surface,
    device: Arc<Device>,
    queue: Arc<Queue>,
    config: SurfaceConfiguration,
    size: PhysicalSize<u32>,
    pipeline: RenderPipeline,
    camera: Camera,
    vertex_buf: GpuVertexBuffer<SpriteVertex>,
    index_buf: GpuIndexBuffer<u32>,
    // bound for untextured groups and for textures that were never uploaded
    white: TextureBinding,
    batch: SpriteBatch,
    last_frametime: Duration,
}

impl BatchRenderer {
    pub fn new(window: &Window, max_sprites: u32) -> Result<Self> {
        let size = window.inner_size();

        // should make it work on linux, macos and windows
        // since vulkan works on linux and windows, and metal on macos
        let instance = Instance::new(Backends::VULKAN | Backends::METAL);
        let surface = unsafe { instance.create_surface(window) };
        let adapter = block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .context("no suitable graphics adapter")?;

        let (device, queue) = block_on(adapter.request_device(
            &DeviceDescriptor {
                label: None,
                features: Features::empty(),
                limits: Limits::default(),
            },
            None,
        ))
        .context("failed to acquire a graphics device")?;

        let (device, queue) = (Arc::new(device), Arc::new(queue));

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface
                .get_preferred_format(&adapter)
                .context("surface exposes no compatible texture format")?,
            width: size.width,
            height: size.height,
            present_mode: PresentMode::Fifo,
        };
        surface.configure(&device, &config);

        let pipeline = pipelines::sprite::init(&device, config.format);
        let camera = Camera::new(&device, size.width, size.height)?;

        let max_vertices = max_sprites as usize * VERTICES_PER_SPRITE as usize;
        let max_indices = max_sprites as usize * INDICES_PER_SPRITE as usize;
        let vertex_buf =
            GpuVertexBuffer::with_capacity(&device, max_vertices, Some("Sprite batch VB"));
        let index_buf =
            GpuIndexBuffer::with_capacity(&device, max_indices, Some("Sprite batch IB"));

        let white = TextureBinding::new(&device, &queue, 1, 1, &[255, 255, 255, 255], "white")?;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            camera,
            vertex_buf,
            index_buf,
            white,
            batch: SpriteBatch::new(max_sprites),
            last_frametime: Duration::new(0, 0),
        })
    }

    pub fn batch(&self) -> &SpriteBatch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut SpriteBatch {
        &mut self.batch
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            warn!(
                "ignoring resize to {}x{}, keeping the current projection",
                new_size.width, new_size.height
            );
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.reconfigure_surface();

        if let Err(e) = self.camera.resize(new_size.width, new_size.height) {
            warn!("projection update rejected: {}", e);
        }
    }

    pub fn reconfigure_surface(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Empties the sprite set; used on scene reset. The GPU buffers keep
    /// their allocation and are rewritten as new sprites come in.
    pub fn clear(&mut self) {
        self.batch.clear();
    }

    /// Copies every group flagged for upload into its region of the shared
    /// buffers. Groups that did not change since the last frame are skipped.
    fn flush(&mut self) -> Result<(), RenderError> {
        let Self {
            batch,
            vertex_buf,
            index_buf,
            queue,
            ..
        } = self;

        for group in batch.groups_mut() {
            if !group.needs_upload() {
                continue;
            }

            vertex_buf.write_at(queue, group.vertex_offset() as usize, group.vertices())?;
            index_buf.write_at(queue, group.index_offset() as usize, group.indices())?;
            group.mark_uploaded();
        }
        Ok(())
    }

    /// Runs one frame: rebuild dirty geometry, upload changed regions,
    /// then draw every non-empty group with a single indexed call each and
    /// present. A failed buffer upload abandons the frame (the flagged
    /// groups retry next frame); surface errors are returned to the caller.
    pub fn render(&mut self) -> Result<(), SurfaceError> {
        self.batch.rebuild();
        if let Err(e) = self.flush() {
            error!("skipping frame, geometry upload failed: {}", e);
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let start = Instant::now();
        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });

        self.camera.update_uniform_buffer(&self.queue);

        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &[RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color {
                        r: 0.1,
                        g: 0.2,
                        b: 0.3,
                        a: 1.0,
                    }),
                    store: true,
                },
            }],
            depth_stencil_attachment: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        render_pass.set_index_buffer(self.index_buf.slice(..), self.index_buf.index_format());
        render_pass.set_bind_group(0, self.camera.bind_group(), &[]);

        for group in self.batch.groups().iter().filter(|g| !g.is_empty()) {
            let bind_group = group
                .texture()
                .and_then(|t| t.bind_group())
                .unwrap_or_else(|| self.white.bind_group());
            render_pass.set_bind_group(1, bind_group, &[]);

            let indices = group.index_offset()..group.index_offset() + group.index_count();
            render_pass.draw_indexed(indices, group.vertex_offset() as i32, 0..1);
        }

        drop(render_pass);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.last_frametime = start.elapsed();

        Ok(())
    }

    pub fn frametime(&self) -> &Duration {
        &self.last_frametime
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}
