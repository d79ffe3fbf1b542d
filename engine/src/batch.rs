use crate::error::RenderError;
use crate::sprite::{Sprite, SpriteId};
use crate::texture::{Texture, TextureId};
use crate::vertex::SpriteVertex;
use ahash::AHashMap;
use std::sync::Arc;

/// Default sprite capacity; sizes the GPU buffers once at startup.
pub const DEFAULT_MAX_SPRITES: u32 = 1000;

pub const VERTICES_PER_SPRITE: u32 = 4;
pub const INDICES_PER_SPRITE: u32 = 6;

/// Identity texture coordinates for the four quad corners, in the same
/// top-left, top-right, bottom-right, bottom-left order as
/// [`Sprite::corners`].
const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Two triangles per quad, 0-1-2 and 2-3-0, fixed winding.
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Hands out sprite ids from a monotonic counter, recycling released ids
/// through a free list. Ids start at 1 and are never reused while live.
struct IdAllocator {
    capacity: u32,
    next: u32,
    free: Vec<u32>,
    live: u32,
}

impl IdAllocator {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 1,
            free: Vec::new(),
            live: 0,
        }
    }

    fn allocate(&mut self) -> Result<SpriteId, RenderError> {
        if self.live == self.capacity {
            return Err(RenderError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        self.live += 1;
        match self.free.pop() {
            Some(id) => Ok(SpriteId(id)),
            None => {
                let id = self.next;
                self.next += 1;
                Ok(SpriteId(id))
            }
        }
    }

    fn release(&mut self, id: SpriteId) {
        self.live -= 1;
        self.free.push(id.0);
    }

    fn reset(&mut self) {
        self.next = 1;
        self.free.clear();
        self.live = 0;
    }
}

/// All sprites sharing one texture (or none), drawn with a single call.
///
/// Vertices and indices are CPU-side staging only; the indices are
/// group-local (every value is below `4 x member count`) and the draw pass
/// offsets them with `vertex_offset` as the base vertex, so one group's
/// upload region never depends on another group's contents.
pub struct BatchGroup {
    key: Option<TextureId>,
    texture: Option<Arc<Texture>>,
    members: Vec<SpriteId>,
    vertices: Vec<SpriteVertex>,
    indices: Vec<u32>,
    dirty: bool,
    needs_upload: bool,
    vertex_offset: u32,
    index_offset: u32,
}

impl BatchGroup {
    fn new(key: Option<TextureId>, texture: Option<Arc<Texture>>) -> Self {
        Self {
            key,
            texture,
            members: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            dirty: false,
            needs_upload: false,
            vertex_offset: 0,
            index_offset: 0,
        }
    }

    pub fn key(&self) -> Option<TextureId> {
        self.key
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    pub fn members(&self) -> &[SpriteId] {
        &self.members
    }

    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Slot of the group's first vertex in the shared GPU vertex buffer.
    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    /// Slot of the group's first index in the shared GPU index buffer.
    pub fn index_offset(&self) -> u32 {
        self.index_offset
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.needs_upload = false;
    }
}

/// Maintains the live sprite set and regenerates CPU-side quad geometry,
/// grouped by texture identity so the renderer can draw each group with a
/// single call.
///
/// Sprites live in a dense arena (`Vec` plus id-to-index map) for cache
/// locality during rebuilds; group membership keeps insertion order and
/// groups keep creation order, so regeneration is deterministic.
pub struct SpriteBatch {
    max_sprites: u32,
    sprites: Vec<(SpriteId, Sprite)>,
    index_of: AHashMap<SpriteId, usize>,
    groups: Vec<BatchGroup>,
    group_of: AHashMap<Option<TextureId>, usize>,
    ids: IdAllocator,
}

impl SpriteBatch {
    pub fn new(max_sprites: u32) -> Self {
        Self {
            max_sprites,
            sprites: Vec::new(),
            index_of: AHashMap::new(),
            groups: Vec::new(),
            group_of: AHashMap::new(),
            ids: IdAllocator::new(max_sprites),
        }
    }

    /// Registers a sprite, assigning it a fresh id and marking its group
    /// dirty. Fails with [`RenderError::CapacityExceeded`] once `max_sprites`
    /// sprites are live; the batch is left untouched in that case.
    pub fn add_sprite(&mut self, sprite: Sprite) -> Result<SpriteId, RenderError> {
        let id = self.ids.allocate()?;

        let key = sprite.group_key();
        let group_idx = match self.group_of.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.groups.len();
                self.groups
                    .push(BatchGroup::new(key, sprite.texture.clone()));
                self.group_of.insert(key, idx);
                idx
            }
        };

        let group = &mut self.groups[group_idx];
        group.members.push(id);
        group.dirty = true;

        self.index_of.insert(id, self.sprites.len());
        self.sprites.push((id, sprite));
        Ok(id)
    }

    /// Unregisters a sprite and releases its id for later reuse. Removing an
    /// id that is not registered is a reported logic error
    /// ([`RenderError::UnknownSpriteId`]), never a silent no-op.
    pub fn remove_sprite(&mut self, id: SpriteId) -> Result<(), RenderError> {
        let idx = self
            .index_of
            .remove(&id)
            .ok_or(RenderError::UnknownSpriteId(id))?;

        let (_, sprite) = self.sprites.swap_remove(idx);
        if idx < self.sprites.len() {
            let moved_id = self.sprites[idx].0;
            self.index_of.insert(moved_id, idx);
        }

        if let Some(&group_idx) = self.group_of.get(&sprite.group_key()) {
            let group = &mut self.groups[group_idx];
            if let Some(pos) = group.members.iter().position(|m| *m == id) {
                group.members.remove(pos);
            }
            group.dirty = true;
        }

        self.ids.release(id);
        Ok(())
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.index_of.get(&id).map(|&idx| &self.sprites[idx].1)
    }

    pub fn set_position<P: Into<cgmath::Vector2<f32>>>(
        &mut self,
        id: SpriteId,
        position: P,
    ) -> Result<(), RenderError> {
        let position = position.into();
        self.mutate(id, |sprite| sprite.position = position)
    }

    pub fn set_size<S: Into<cgmath::Vector2<f32>>>(
        &mut self,
        id: SpriteId,
        size: S,
    ) -> Result<(), RenderError> {
        let size = size.into();
        debug_assert!(size.x >= 0.0 && size.y >= 0.0, "sprite size must be non-negative");
        self.mutate(id, |sprite| sprite.size = size)
    }

    pub fn set_rotation(&mut self, id: SpriteId, radians: f32) -> Result<(), RenderError> {
        self.mutate(id, |sprite| sprite.rotation = radians)
    }

    pub fn set_color<C: Into<cgmath::Vector4<f32>>>(
        &mut self,
        id: SpriteId,
        color: C,
    ) -> Result<(), RenderError> {
        let color = color.into();
        self.mutate(id, |sprite| sprite.color = color)
    }

    fn mutate<F: FnOnce(&mut Sprite)>(&mut self, id: SpriteId, f: F) -> Result<(), RenderError> {
        let idx = *self
            .index_of
            .get(&id)
            .ok_or(RenderError::UnknownSpriteId(id))?;

        f(&mut self.sprites[idx].1);

        if let Some(&group_idx) = self.group_of.get(&self.sprites[idx].1.group_key()) {
            self.groups[group_idx].dirty = true;
        }
        Ok(())
    }

    /// Number of live sprites.
    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn max_sprites(&self) -> u32 {
        self.max_sprites
    }

    /// Groups in stable creation order. Only meaningful between a
    /// [`Self::rebuild`] and the next mutation.
    pub fn groups(&self) -> &[BatchGroup] {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [BatchGroup] {
        &mut self.groups
    }

    /// Regenerates geometry for every dirty group: exactly 4 vertices and 6
    /// group-local indices per member, corners rotated about each sprite's
    /// center. Groups emptied by removals are evicted, running buffer
    /// offsets are reassigned, and any group whose geometry or offset
    /// changed is flagged for GPU upload. Calling this twice without
    /// intervening mutations leaves every group byte-identical.
    pub fn rebuild(&mut self) {
        if self.groups.iter().any(|g| g.members.is_empty()) {
            self.groups.retain(|g| !g.members.is_empty());
            self.group_of.clear();
            for (idx, group) in self.groups.iter().enumerate() {
                self.group_of.insert(group.key, idx);
            }
        }

        let Self {
            groups,
            sprites,
            index_of,
            ..
        } = self;

        for group in groups.iter_mut() {
            if !group.dirty {
                continue;
            }

            group.vertices.clear();
            group.indices.clear();
            for (slot, id) in group.members.iter().enumerate() {
                let idx = *index_of.get(id).expect("group member registered in arena");
                let sprite = &sprites[idx].1;
                let color: [f32; 4] = sprite.color.into();

                for (corner, uv) in sprite.corners().iter().zip(CORNER_UVS.iter()) {
                    group.vertices.push(SpriteVertex {
                        position: [corner.x, corner.y],
                        tex_coord: *uv,
                        color,
                    });
                }

                let base = slot as u32 * VERTICES_PER_SPRITE;
                group
                    .indices
                    .extend(QUAD_INDICES.iter().map(|i| base + i));
            }

            group.dirty = false;
            group.needs_upload = true;
        }

        // groups that moved inside the shared buffers must re-upload even
        // if their own geometry did not change
        let mut vertex_offset = 0;
        let mut index_offset = 0;
        for group in groups.iter_mut() {
            if group.vertex_offset != vertex_offset || group.index_offset != index_offset {
                group.vertex_offset = vertex_offset;
                group.index_offset = index_offset;
                group.needs_upload = true;
            }
            vertex_offset += group.vertices.len() as u32;
            index_offset += group.indices.len() as u32;
        }
    }

    /// Drops every sprite and group and resets the id allocator.
    pub fn clear(&mut self) {
        self.sprites.clear();
        self.index_of.clear();
        self.groups.clear();
        self.group_of.clear();
        self.ids.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn quad(x: f32, y: f32) -> Sprite {
        Sprite::new([x, y], [10.0, 10.0])
    }

    fn test_texture() -> Arc<Texture> {
        Arc::new(Texture::from_pixels(2, 2, vec![255; 16]))
    }

    #[test]
    fn live_ids_are_distinct_and_not_reused_while_live() {
        let mut batch = SpriteBatch::new(16);
        let mut live = Vec::new();

        for i in 0..8 {
            live.push(batch.add_sprite(quad(i as f32, 0.0)).unwrap());
        }
        let removed = live.remove(3);
        batch.remove_sprite(removed).unwrap();
        for i in 0..4 {
            live.push(batch.add_sprite(quad(i as f32, 20.0)).unwrap());
        }

        let unique: HashSet<_> = live.iter().copied().collect();
        assert_eq!(unique.len(), live.len());
        assert_eq!(batch.len(), live.len());
    }

    #[test]
    fn released_ids_become_eligible_for_reuse() {
        let mut batch = SpriteBatch::new(4);
        let id = batch.add_sprite(quad(0.0, 0.0)).unwrap();
        batch.remove_sprite(id).unwrap();
        let next = batch.add_sprite(quad(1.0, 0.0)).unwrap();
        assert_eq!(next, id);
    }

    #[test]
    fn add_beyond_capacity_fails_without_mutating_state() {
        let mut batch = SpriteBatch::new(2);
        batch.add_sprite(quad(0.0, 0.0)).unwrap();
        batch.add_sprite(quad(1.0, 0.0)).unwrap();

        let err = batch.add_sprite(quad(2.0, 0.0)).unwrap_err();
        assert!(matches!(err, RenderError::CapacityExceeded { capacity: 2 }));
        assert_eq!(batch.len(), batch.max_sprites() as usize);

        batch.rebuild();
        assert_eq!(batch.groups().len(), 1);
        assert_eq!(batch.groups()[0].members().len(), 2);
    }

    #[test]
    fn removing_an_unregistered_sprite_is_reported() {
        let mut batch = SpriteBatch::new(4);
        let id = batch.add_sprite(quad(0.0, 0.0)).unwrap();
        batch.remove_sprite(id).unwrap();

        assert!(matches!(
            batch.remove_sprite(id),
            Err(RenderError::UnknownSpriteId(_))
        ));
        assert!(matches!(
            batch.set_rotation(id, 1.0),
            Err(RenderError::UnknownSpriteId(_))
        ));
    }

    #[test]
    fn rebuild_is_idempotent_without_mutations() {
        let mut batch = SpriteBatch::new(8);
        let tex = test_texture();
        batch.add_sprite(quad(0.0, 0.0).with_texture(tex.clone())).unwrap();
        batch.add_sprite(quad(30.0, 0.0).with_texture(tex)).unwrap();
        batch.add_sprite(quad(60.0, 0.0)).unwrap();

        batch.rebuild();
        let snapshot: Vec<(Vec<SpriteVertex>, Vec<u32>)> = batch
            .groups()
            .iter()
            .map(|g| (g.vertices().to_vec(), g.indices().to_vec()))
            .collect();

        batch.rebuild();
        for (group, (vertices, indices)) in batch.groups().iter().zip(snapshot.iter()) {
            assert_eq!(group.vertices(), &vertices[..]);
            assert_eq!(group.indices(), &indices[..]);
        }
    }

    #[test]
    fn counts_match_membership_and_indices_stay_in_bounds() {
        let mut batch = SpriteBatch::new(16);
        let tex = test_texture();
        for i in 0..5 {
            batch
                .add_sprite(quad(i as f32 * 20.0, 0.0).with_texture(tex.clone()))
                .unwrap();
        }
        batch.rebuild();

        let group = &batch.groups()[0];
        let members = group.members().len() as u32;
        assert_eq!(group.vertices().len() as u32, members * VERTICES_PER_SPRITE);
        assert_eq!(group.indices().len() as u32, members * INDICES_PER_SPRITE);
        let vertex_count = group.vertices().len() as u32;
        assert!(group.indices().iter().all(|i| *i < vertex_count));
    }

    #[test]
    fn one_texture_group_plus_untextured_gives_two_draw_ranges() {
        let mut batch = SpriteBatch::new(8);
        let tex = test_texture();
        for i in 0..3 {
            batch
                .add_sprite(quad(i as f32 * 20.0, 0.0).with_texture(tex.clone()))
                .unwrap();
        }
        batch.add_sprite(quad(0.0, 50.0)).unwrap();
        batch.rebuild();

        assert_eq!(batch.groups().len(), 2);
        assert_eq!(batch.groups()[0].index_count(), 18);
        assert_eq!(batch.groups()[1].index_count(), 6);
        assert_eq!(batch.groups()[1].vertex_offset(), 12);
        assert_eq!(batch.groups()[1].index_offset(), 18);
    }

    #[test]
    fn removal_mid_group_leaves_contiguous_index_bases() {
        let mut batch = SpriteBatch::new(8);
        let a = batch.add_sprite(quad(0.0, 0.0)).unwrap();
        let b = batch.add_sprite(quad(20.0, 0.0)).unwrap();
        let c = batch.add_sprite(quad(40.0, 0.0)).unwrap();
        batch.rebuild();

        batch.remove_sprite(b).unwrap();
        batch.rebuild();

        let group = &batch.groups()[0];
        assert_eq!(group.members(), &[a, c]);
        assert_eq!(group.vertices().len(), 8);
        let expected: Vec<u32> = vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4];
        assert_eq!(group.indices(), &expected[..]);
    }

    #[test]
    fn emptied_groups_are_evicted_and_offsets_reassigned() {
        let mut batch = SpriteBatch::new(8);
        let tex = test_texture();
        let a = batch
            .add_sprite(quad(0.0, 0.0).with_texture(tex.clone()))
            .unwrap();
        let b = batch.add_sprite(quad(20.0, 0.0).with_texture(tex)).unwrap();
        batch.add_sprite(quad(0.0, 50.0)).unwrap();
        batch.rebuild();
        assert_eq!(batch.groups()[1].vertex_offset(), 8);

        batch.remove_sprite(a).unwrap();
        batch.remove_sprite(b).unwrap();
        batch.rebuild();

        assert_eq!(batch.groups().len(), 1);
        let group = &batch.groups()[0];
        assert!(group.key().is_none());
        assert_eq!(group.vertex_offset(), 0);
        assert_eq!(group.index_offset(), 0);
        assert!(group.needs_upload());
    }

    #[test]
    fn mutation_marks_the_owning_group_for_regeneration() {
        let mut batch = SpriteBatch::new(4);
        let id = batch.add_sprite(quad(0.0, 0.0)).unwrap();
        batch.rebuild();
        batch.groups_mut()[0].mark_uploaded();

        batch.set_position(id, [100.0, 100.0]).unwrap();
        assert_eq!(
            batch.sprite(id).unwrap().position(),
            cgmath::Vector2::new(100.0, 100.0)
        );
        batch.rebuild();

        let group = &batch.groups()[0];
        assert!(group.needs_upload());
        assert_eq!(group.vertices()[0].position, [95.0, 95.0]);
    }

    #[test]
    fn unchanged_groups_are_not_flagged_for_upload_again() {
        let mut batch = SpriteBatch::new(8);
        let tex = test_texture();
        batch.add_sprite(quad(0.0, 0.0).with_texture(tex)).unwrap();
        let plain = batch.add_sprite(quad(0.0, 50.0)).unwrap();
        batch.rebuild();
        for group in batch.groups_mut() {
            group.mark_uploaded();
        }

        batch.set_color(plain, [1.0, 0.0, 0.0, 1.0]).unwrap();
        batch.rebuild();

        assert!(!batch.groups()[0].needs_upload());
        assert!(batch.groups()[1].needs_upload());
    }

    #[test]
    fn clear_resets_sprites_groups_and_ids() {
        let mut batch = SpriteBatch::new(4);
        batch.add_sprite(quad(0.0, 0.0)).unwrap();
        batch.add_sprite(quad(10.0, 0.0)).unwrap();
        batch.rebuild();

        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.groups().is_empty());

        // allocation starts over from the first id
        let id = batch.add_sprite(quad(0.0, 0.0)).unwrap();
        assert_eq!(format!("{}", id), "1");
    }
}
