use crate::texture::{Texture, TextureId};
use cgmath::{Vector2, Vector4};
use std::fmt;
use std::sync::Arc;

/// Identity of a registered sprite. Non-zero, unique among the live sprites
/// of a [`crate::batch::SpriteBatch`], and never reused while its owner is
/// still registered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(pub(crate) u32);

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A renderable unit: transform, tint and an optional shared texture.
///
/// `position` is the *center* of the quad in window pixel space (origin
/// top-left, +y down). `rotation` is in radians and pivots about the
/// center. `size` must be non-negative; a zero size is legal and produces a
/// degenerate quad that still occupies a geometry slot.
pub struct Sprite {
    pub(crate) position: Vector2<f32>,
    pub(crate) size: Vector2<f32>,
    pub(crate) rotation: f32,
    pub(crate) color: Vector4<f32>,
    pub(crate) texture: Option<Arc<Texture>>,
}

impl Sprite {
    pub fn new<P, S>(position: P, size: S) -> Self
    where
        P: Into<Vector2<f32>>,
        S: Into<Vector2<f32>>,
    {
        let size = size.into();
        debug_assert!(size.x >= 0.0 && size.y >= 0.0, "sprite size must be non-negative");

        Self {
            position: position.into(),
            size,
            rotation: 0.0,
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            texture: None,
        }
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    /// RGBA tint, each channel in `[0, 1]`. Multiplied against the texture
    /// sample, or shown directly when untextured.
    pub fn with_color<C: Into<Vector4<f32>>>(mut self, color: C) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_texture(mut self, texture: Arc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn position(&self) -> Vector2<f32> {
        self.position
    }

    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn color(&self) -> Vector4<f32> {
        self.color
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    /// Batch group key: the texture identity, or `None` for untextured.
    pub(crate) fn group_key(&self) -> Option<TextureId> {
        self.texture.as_ref().map(|t| t.id())
    }

    /// The four quad corners in pixel space, in top-left, top-right,
    /// bottom-right, bottom-left order, rotated about the sprite center.
    pub(crate) fn corners(&self) -> [Vector2<f32>; 4] {
        let half = self.size / 2.0;
        let (sin, cos) = self.rotation.sin_cos();

        let offsets = [
            Vector2::new(-half.x, -half.y),
            Vector2::new(half.x, -half.y),
            Vector2::new(half.x, half.y),
            Vector2::new(-half.x, half.y),
        ];

        let mut corners = [Vector2::new(0.0, 0.0); 4];
        for (corner, offset) in corners.iter_mut().zip(offsets.iter()) {
            *corner = Vector2::new(
                self.position.x + offset.x * cos - offset.y * sin,
                self.position.y + offset.x * sin + offset.y * cos,
            );
        }
        corners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_rotation_corners_are_position_plus_minus_half_size() {
        let sprite = Sprite::new([100.0, 40.0], [20.0, 10.0]);
        let corners = sprite.corners();

        assert_eq!(corners[0], Vector2::new(90.0, 35.0));
        assert_eq!(corners[1], Vector2::new(110.0, 35.0));
        assert_eq!(corners[2], Vector2::new(110.0, 45.0));
        assert_eq!(corners[3], Vector2::new(90.0, 45.0));
    }

    #[test]
    fn quarter_turn_rotates_about_center() {
        let sprite =
            Sprite::new([0.0, 0.0], [2.0, 4.0]).with_rotation(std::f32::consts::FRAC_PI_2);
        let corners = sprite.corners();

        // top-left offset (-1, -2) maps to (2, -1) under a quarter turn
        assert_relative_eq!(corners[0].x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(corners[0].y, -1.0, epsilon = 1e-5);
        // bottom-right is its mirror image
        assert_relative_eq!(corners[2].x, -2.0, epsilon = 1e-5);
        assert_relative_eq!(corners[2].y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn builder_sets_transform_tint_and_texture() {
        let tex = Arc::new(crate::texture::Texture::from_pixels(1, 1, vec![255; 4]));
        let sprite = Sprite::new([1.0, 2.0], [3.0, 4.0])
            .with_rotation(0.5)
            .with_color([0.1, 0.2, 0.3, 0.4])
            .with_texture(Arc::clone(&tex));

        assert_eq!(sprite.position(), Vector2::new(1.0, 2.0));
        assert_eq!(sprite.size(), Vector2::new(3.0, 4.0));
        assert_eq!(sprite.rotation(), 0.5);
        assert_eq!(sprite.color(), Vector4::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(sprite.texture().map(|t| t.id()), Some(tex.id()));
        assert_eq!(sprite.group_key(), Some(tex.id()));
    }

    #[test]
    fn zero_size_is_a_degenerate_quad() {
        let sprite = Sprite::new([5.0, 5.0], [0.0, 0.0]);
        for corner in sprite.corners().iter() {
            assert_eq!(*corner, Vector2::new(5.0, 5.0));
        }
    }
}
