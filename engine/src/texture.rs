use crate::error::RenderError;
use anyhow::{Context, Result};
use image::GenericImageView;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use wgpu::*;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique texture identity, used as the batch group key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A decoded RGBA8 image plus an optional GPU-resident binding.
///
/// Decoding and GPU upload are separate steps: a texture only becomes
/// drawable after [`Texture::upload`] succeeds. Sprites referencing a
/// texture without a binding are drawn as solid-color quads.
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    binding: Option<TextureBinding>,
}

impl Texture {
    /// Decodes an image file through the `image` crate and converts it to RGBA8.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?;
        let (width, height) = image.dimensions();

        Ok(Self::from_pixels(
            width,
            height,
            image.to_rgba8().into_raw(),
        ))
    }

    /// Wraps an already-decoded RGBA8 pixel buffer.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            id: TextureId::next(),
            width,
            height,
            pixels,
            binding: None,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Creates the GPU texture, view, sampler and bind group and writes the
    /// pixel data. Idempotent once a binding exists.
    pub fn upload(&mut self, device: &Device, queue: &Queue) -> Result<(), RenderError> {
        if self.binding.is_some() {
            return Ok(());
        }

        let binding = TextureBinding::new(
            device,
            queue,
            self.width,
            self.height,
            &self.pixels,
            "sprite texture",
        )?;
        self.binding = Some(binding);
        Ok(())
    }

    /// The GPU bind group, present only after a successful upload.
    pub fn bind_group(&self) -> Option<&BindGroup> {
        self.binding.as_ref().map(|b| &b.bind_group)
    }

    pub fn build_bind_group_layout(device: &Device, label: &str) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension: TextureViewDimension::D2,
                        sample_type: TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler {
                        comparison: false,
                        filtering: true,
                    },
                    count: None,
                },
            ],
            label: Some(&format!("{} BGL", label)),
        })
    }
}

/// GPU-side half of a [`Texture`].
pub(crate) struct TextureBinding {
    _texture: wgpu::Texture,
    bind_group: BindGroup,
}

impl TextureBinding {
    pub(crate) fn new(
        device: &Device,
        queue: &Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::TextureUpload(format!(
                "{}: zero-sized image ({}x{})",
                label, width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::TextureUpload(format!(
                "{}: pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                label,
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        let texture_size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&TextureDescriptor {
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            label: Some(&format!("{} TEX", label)),
        });

        queue.write_texture(
            ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            pixels,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: NonZeroU32::new(4 * width),
                rows_per_image: NonZeroU32::new(height),
            },
            texture_size,
        );

        let texture_view = texture.create_view(&TextureViewDescriptor::default());
        let texture_sampler = device.create_sampler(&SamplerDescriptor {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let texture_bind_group_layout = Texture::build_bind_group_layout(device, label);

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            layout: &texture_bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&texture_view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&texture_sampler),
                },
            ],
            label: Some(&format!("{} BG", label)),
        });

        Ok(Self {
            _texture: texture,
            bind_group,
        })
    }

    pub(crate) fn bind_group(&self) -> &BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_ids_are_unique() {
        let a = Texture::from_pixels(1, 1, vec![255; 4]);
        let b = Texture::from_pixels(1, 1, vec![255; 4]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn texture_without_upload_has_no_bind_group() {
        let tex = Texture::from_pixels(2, 2, vec![0; 16]);
        assert_eq!((tex.width(), tex.height()), (2, 2));
        assert!(tex.bind_group().is_none());
    }
}
