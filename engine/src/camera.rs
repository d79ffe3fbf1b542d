use crate::buffer::{GpuUniformBuffer, Uniform};
use crate::error::RenderError;
use cgmath::Matrix4;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutEntry, BindingType,
    BufferBindingType, Device, Queue, ShaderStages,
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Orthographic transform from window pixel space to wgpu clip space.
///
/// Pixel space has its origin at the window's top-left corner with +y going
/// down, so the matrix is `ortho(0, w, h, 0)` composed with the GL-to-wgpu
/// depth correction. Zero dimensions are rejected with
/// [`RenderError::InvalidDimension`] and the previous matrix stays in effect.
pub struct Projection {
    width: u32,
    height: u32,
    matrix: Matrix4<f32>,
}

impl Projection {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimension { width, height });
        }

        Ok(Self {
            width,
            height,
            matrix: Self::compute(width, height),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimension { width, height });
        }

        self.width = width;
        self.height = height;
        self.matrix = Self::compute(width, height);
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    fn compute(width: u32, height: u32) -> Matrix4<f32> {
        cgmath::ortho(0.0, width as f32, height as f32, 0.0, 0.0, 1000.0) * OPENGL_TO_WGPU_MATRIX
    }
}

/// GPU-facing wrapper around [`Projection`]: uniform buffer plus bind group,
/// written once per frame.
pub struct Camera {
    projection: Projection,
    uniform_buf: GpuUniformBuffer<CameraUniform>,
    bind_group: BindGroup,
}

impl Camera {
    pub fn new(device: &Device, width: u32, height: u32) -> Result<Self, RenderError> {
        let projection = Projection::new(width, height)?;
        let uniform = CameraUniform {
            proj: projection.matrix().into(),
        };

        let buffer = GpuUniformBuffer::new(device, &[uniform], Some("Camera UB"));
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            layout: &GpuUniformBuffer::<CameraUniform>::bind_group_layout(
                device,
                Some("Camera BGL"),
            ),
            entries: &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("Camera BG"),
        });

        Ok(Self {
            projection,
            uniform_buf: buffer,
            bind_group,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.projection.resize(width, height)
    }

    pub fn update_uniform_buffer(&self, queue: &Queue) {
        let uniform = CameraUniform {
            proj: self.projection.matrix().into(),
        };

        self.uniform_buf.update(queue, &[uniform]);
    }

    pub fn bind_group(&self) -> &BindGroup {
        &self.bind_group
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    proj: [[f32; 4]; 4],
}

impl Uniform for CameraUniform {
    fn bind_group_layout_entry() -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Vector4;

    #[test]
    fn identical_dimensions_yield_identical_matrices() {
        let a = Projection::new(800, 600).unwrap();
        let mut b = Projection::new(320, 240).unwrap();
        b.resize(800, 600).unwrap();
        assert_eq!(a.matrix(), b.matrix());

        // repeated calls with the same dimensions are idempotent
        b.resize(800, 600).unwrap();
        assert_eq!(a.matrix(), b.matrix());
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(
            Projection::new(0, 600),
            Err(RenderError::InvalidDimension { .. })
        ));

        let mut proj = Projection::new(800, 600).unwrap();
        let before = proj.matrix();
        assert!(proj.resize(800, 0).is_err());
        assert!(proj.resize(0, 0).is_err());
        // the previous valid projection stays in effect
        assert_eq!(proj.matrix(), before);
        assert_eq!((proj.width(), proj.height()), (800, 600));
    }

    #[test]
    fn matrix_is_always_finite() {
        for &(w, h) in &[(1u32, 1u32), (800, 600), (1920, 1080), (5, 4000)] {
            let cells: [[f32; 4]; 4] = Projection::new(w, h).unwrap().matrix().into();
            for row in &cells {
                for cell in row {
                    assert!(cell.is_finite(), "{}x{} produced {}", w, h, cell);
                }
            }
        }
    }

    #[test]
    fn pixel_corners_map_to_clip_corners() {
        let proj = Projection::new(640, 480).unwrap();
        let m = proj.matrix();

        let top_left = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(top_left.x, -1.0);
        assert_relative_eq!(top_left.y, 1.0);

        let bottom_right = m * Vector4::new(640.0, 480.0, 0.0, 1.0);
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, -1.0);
    }
}
