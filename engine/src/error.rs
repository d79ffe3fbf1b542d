use crate::sprite::SpriteId;
use thiserror::Error;
use wgpu::BufferAddress;

/// Contract violations surfaced by the sprite batching core.
///
/// `CapacityExceeded` and `UnknownSpriteId` are returned to the caller and
/// never absorbed. `InvalidDimension` leaves the previous projection in
/// effect. `TextureUpload` degrades the affected sprites to solid-color
/// quads. `BufferUpload` is fatal to the current frame only.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("sprite capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: u32 },

    #[error("no sprite registered with id {0}")]
    UnknownSpriteId(SpriteId),

    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },

    #[error("texture upload failed: {0}")]
    TextureUpload(String),

    #[error("buffer write of {len} bytes at offset {offset} exceeds capacity of {capacity} bytes")]
    BufferUpload {
        offset: BufferAddress,
        len: BufferAddress,
        capacity: BufferAddress,
    },
}
