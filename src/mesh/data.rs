//! CPU-side mesh storage with typed accessors over packed vertices.

use glam::{Quat, Vec2, Vec3, Vec4};

use crate::mesh::format::{
    pack_color, pack_skinning, pack_tangent_frame, pack_uv, unpack_color, unpack_skinning,
    unpack_tangent_frame, unpack_uv, VertexFormat,
};

/// Axis-aligned bounding box of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }
}

impl Bounds {
    /// Grow the box to contain `point`.
    pub fn union_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

/// A sub-range of the index buffer drawn as one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRange {
    /// First index of the range.
    pub start_index: u32,
    /// Number of indices in the range.
    pub count: u32,
}

/// Mesh geometry in CPU memory.
///
/// Vertices live in one contiguous byte buffer laid out per the mesh's
/// [`VertexFormat`]; the accessors pack and unpack attributes in place.
/// Accessing a vertex out of range or an attribute the format does not carry
/// panics in debug builds.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    format: VertexFormat,
    vertices: Vec<u8>,
    /// Index buffer.
    pub indices: Vec<u32>,
    /// Draw ranges; an empty list means the whole index buffer is one element.
    pub element_ranges: Vec<ElementRange>,
    /// Bounding box; maintained by [`set_position`](Self::set_position).
    pub bounds: Bounds,
}

impl MeshData {
    /// Create a mesh with `vertex_count` zeroed vertices of `format`.
    pub fn new(format: VertexFormat, vertex_count: u32) -> Self {
        Self {
            format,
            vertices: vec![0; (format.stride() * vertex_count) as usize],
            indices: Vec::new(),
            element_ranges: Vec::new(),
            bounds: Bounds::default(),
        }
    }

    /// The mesh's vertex format.
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        if self.format.stride() == 0 {
            return 0;
        }
        (self.vertices.len() as u32) / self.format.stride()
    }

    /// The packed vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    fn field(&self, vertex: u32, offset: u32, len: u32) -> &[u8] {
        debug_assert!(vertex < self.vertex_count(), "vertex {vertex} out of range");
        let start = (vertex * self.format.stride() + offset) as usize;
        &self.vertices[start..start + len as usize]
    }

    fn field_mut(&mut self, vertex: u32, offset: u32, len: u32) -> &mut [u8] {
        debug_assert!(vertex < self.vertex_count(), "vertex {vertex} out of range");
        let start = (vertex * self.format.stride() + offset) as usize;
        &mut self.vertices[start..start + len as usize]
    }

    fn read_u32(&self, vertex: u32, offset: u32) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(self.field(vertex, offset, 4));
        u32::from_le_bytes(word)
    }

    fn write_u32(&mut self, vertex: u32, offset: u32, value: u32) {
        self.field_mut(vertex, offset, 4)
            .copy_from_slice(&value.to_le_bytes());
    }

    /// Set the position of `vertex` and grow the bounds.
    pub fn set_position(&mut self, vertex: u32, position: Vec3) {
        let offset = self.format.position_offset();
        self.field_mut(vertex, offset, 12)
            .copy_from_slice(bytemuck::cast_slice(&position.to_array()));
        self.bounds.union_point(position);
    }

    /// Read the position of `vertex`.
    pub fn position(&self, vertex: u32) -> Vec3 {
        let bytes = self.field(vertex, self.format.position_offset(), 12);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        Vec3::from_slice(floats)
    }

    /// Set UV channel `channel` of `vertex`.
    pub fn set_uv(&mut self, vertex: u32, channel: u8, uv: Vec2) {
        let offset = self.format.uv_offset(channel);
        self.write_u32(vertex, offset, pack_uv(uv));
    }

    /// Read UV channel `channel` of `vertex`.
    pub fn uv(&self, vertex: u32, channel: u8) -> Vec2 {
        unpack_uv(self.read_u32(vertex, self.format.uv_offset(channel)))
    }

    /// Set the tangent frame of `vertex`.
    pub fn set_tangent_frame(&mut self, vertex: u32, frame: Quat) {
        debug_assert!(self.format.has_tangent);
        let offset = self.format.tangent_offset();
        self.write_u32(vertex, offset, pack_tangent_frame(frame));
    }

    /// Read the tangent frame of `vertex`.
    pub fn tangent_frame(&self, vertex: u32) -> Quat {
        debug_assert!(self.format.has_tangent);
        unpack_tangent_frame(self.read_u32(vertex, self.format.tangent_offset()))
    }

    /// Set color channel `channel` of `vertex`.
    pub fn set_color(&mut self, vertex: u32, channel: u8, color: Vec4) {
        let offset = self.format.color_offset(channel);
        self.write_u32(vertex, offset, pack_color(color));
    }

    /// Read color channel `channel` of `vertex`.
    pub fn color(&self, vertex: u32, channel: u8) -> Vec4 {
        unpack_color(self.read_u32(vertex, self.format.color_offset(channel)))
    }

    /// Set the bone bindings of `vertex`.
    pub fn set_skinning(&mut self, vertex: u32, bone_ids: &[Option<u32>], weights: &[f32]) {
        debug_assert!(self.format.has_skinning);
        debug_assert_eq!(bone_ids.len(), weights.len());
        let (ids, packed_weights) = pack_skinning(bone_ids, weights);
        let ids_offset = self.format.bone_ids_offset();
        let weights_offset = self.format.bone_weights_offset();
        self.write_u32(vertex, ids_offset, ids);
        self.write_u32(vertex, weights_offset, packed_weights);
    }

    /// Read the bone bindings of `vertex`, skipping unused slots.
    pub fn skinning(&self, vertex: u32) -> Vec<(u32, f32)> {
        debug_assert!(self.format.has_skinning);
        unpack_skinning(
            self.read_u32(vertex, self.format.bone_ids_offset()),
            self.read_u32(vertex, self.format.bone_weights_offset()),
        )
    }

    /// The draw ranges, falling back to one range over the whole index buffer.
    pub fn effective_ranges(&self) -> Vec<ElementRange> {
        if self.element_ranges.is_empty() {
            vec![ElementRange {
                start_index: 0,
                count: self.indices.len() as u32,
            }]
        } else {
            self.element_ranges.clone()
        }
    }
}
