use crate::buffer::{GpuUniformBuffer, GpuVertexBufferLayout};
use crate::camera::CameraUniform;
use crate::texture::Texture;
use crate::vertex::SpriteVertex;
use wgpu::*;

pub fn init(device: &Device, format: TextureFormat) -> RenderPipeline {
    let shader = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some("Sprite SM"),
        source: ShaderSource::Wgsl(include_str!("sprite.wgsl").into()),
    });

    let render_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Sprite RPL"),
        bind_group_layouts: &[
            &GpuUniformBuffer::<CameraUniform>::bind_group_layout(
                device,
                Some("Sprite RPL Camera BGL"),
            ),
            &Texture::build_bind_group_layout(device, "Sprite RPL Texture"),
        ],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Sprite RP"),
        layout: Some(&render_pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[SpriteVertex::layout().to_owned()],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[ColorTargetState {
                format,
                blend: Some(BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            }],
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Cw,
            // we're drawing sprites, which are rectangles with a texture, so no culling is needed
            cull_mode: None,
            polygon_mode: PolygonMode::Fill,
            clamp_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
    })
}
