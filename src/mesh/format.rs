//! Packed vertex formats and the format registry.
//!
//! A vertex format is four small fields bit-packed into a `u32` type id.
//! Every layout quantity derives from those fields, so two formats with the
//! same type id always agree on stride and attribute offsets, and the type id
//! can be persisted in mesh files.
//!
//! Attribute data is packed aggressively: UVs as half-float pairs, the
//! tangent frame as a byte-packed unit quaternion, colors and skinning
//! weights as bytes. One fully-featured vertex is 32 bytes instead of 92.

use std::collections::HashMap;

use glam::{Quat, Vec2, Vec4};
use half::f16;

/// Maximum UV or color channels a format can carry.
pub const MAX_CHANNELS: u8 = 7;

/// Identifier of a registered vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatId(pub u32);

/// Description of the attributes one vertex carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat {
    /// Number of UV channels (0..=7).
    pub uv_channels: u8,
    /// Number of color channels (0..=7).
    pub color_channels: u8,
    /// Whether vertices carry a packed tangent frame.
    pub has_tangent: bool,
    /// Whether vertices carry bone ids and weights.
    pub has_skinning: bool,
}

impl VertexFormat {
    /// Create a format. Panics if a channel count exceeds [`MAX_CHANNELS`].
    pub fn new(uv_channels: u8, color_channels: u8, has_tangent: bool, has_skinning: bool) -> Self {
        assert!(uv_channels <= MAX_CHANNELS);
        assert!(color_channels <= MAX_CHANNELS);
        Self {
            uv_channels,
            color_channels,
            has_tangent,
            has_skinning,
        }
    }

    /// Bit-pack the fields into the format's type id.
    pub fn type_id(&self) -> u32 {
        (self.has_skinning as u32)
            | (self.has_tangent as u32) << 1
            | (self.uv_channels as u32) << 2
            | (self.color_channels as u32) << 6
    }

    /// Reconstruct a format from its type id.
    pub fn from_type_id(type_id: u32) -> Self {
        Self {
            has_skinning: type_id & 1 != 0,
            has_tangent: type_id >> 1 & 1 != 0,
            uv_channels: (type_id >> 2 & 0xf) as u8,
            color_channels: (type_id >> 6 & 0xf) as u8,
        }
    }

    /// Byte offset of the position attribute.
    pub fn position_offset(&self) -> u32 {
        0
    }

    /// Byte offset of UV channel `channel`.
    pub fn uv_offset(&self, channel: u8) -> u32 {
        debug_assert!(channel < self.uv_channels);
        12 + channel as u32 * 4
    }

    /// Byte offset of the packed tangent frame.
    pub fn tangent_offset(&self) -> u32 {
        12 + self.uv_channels as u32 * 4
    }

    /// Byte offset of color channel `channel`.
    pub fn color_offset(&self, channel: u8) -> u32 {
        debug_assert!(channel < self.color_channels);
        12 + self.uv_channels as u32 * 4 + if self.has_tangent { 4 } else { 0 } + channel as u32 * 4
    }

    /// Byte offset of the packed bone ids.
    pub fn bone_ids_offset(&self) -> u32 {
        12 + (self.uv_channels as u32 + self.color_channels as u32) * 4
            + if self.has_tangent { 4 } else { 0 }
    }

    /// Byte offset of the packed bone weights.
    pub fn bone_weights_offset(&self) -> u32 {
        self.bone_ids_offset() + 4
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u32 {
        12 + (self.uv_channels as u32 + self.color_channels as u32) * 4
            + if self.has_tangent { 4 } else { 0 }
            + if self.has_skinning { 8 } else { 0 }
    }

    /// Enumerate the format's attributes in buffer order.
    pub fn attributes(&self) -> Vec<VertexAttribute> {
        let mut attrs = vec![VertexAttribute {
            semantic: AttributeSemantic::Position,
            format: AttributeFormat::Float32x3,
            offset: 0,
        }];
        for ch in 0..self.uv_channels {
            attrs.push(VertexAttribute {
                semantic: AttributeSemantic::Uv(ch),
                format: AttributeFormat::Float16x2,
                offset: self.uv_offset(ch),
            });
        }
        if self.has_tangent {
            attrs.push(VertexAttribute {
                semantic: AttributeSemantic::TangentFrame,
                format: AttributeFormat::Unorm8x4,
                offset: self.tangent_offset(),
            });
        }
        for ch in 0..self.color_channels {
            attrs.push(VertexAttribute {
                semantic: AttributeSemantic::Color(ch),
                format: AttributeFormat::Unorm8x4,
                offset: self.color_offset(ch),
            });
        }
        if self.has_skinning {
            attrs.push(VertexAttribute {
                semantic: AttributeSemantic::BoneIds,
                format: AttributeFormat::Uint8x4,
                offset: self.bone_ids_offset(),
            });
            attrs.push(VertexAttribute {
                semantic: AttributeSemantic::BoneWeights,
                format: AttributeFormat::Unorm8x4,
                offset: self.bone_weights_offset(),
            });
        }
        attrs
    }
}

/// Meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    /// Object-space position.
    Position,
    /// Texture coordinate channel.
    Uv(u8),
    /// Byte-packed unit quaternion tangent frame.
    TangentFrame,
    /// Vertex color channel.
    Color(u8),
    /// Skinning bone indices.
    BoneIds,
    /// Skinning bone weights.
    BoneWeights,
}

/// Storage format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// Three 32-bit floats.
    Float32x3,
    /// Two 16-bit floats.
    Float16x2,
    /// Four normalized bytes.
    Unorm8x4,
    /// Four unsigned byte integers.
    Uint8x4,
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub semantic: AttributeSemantic,
    /// How it is stored.
    pub format: AttributeFormat,
    /// Byte offset within the vertex.
    pub offset: u32,
}

/// Stride and attribute table for pipeline vertex-input creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    /// Size of one vertex in bytes.
    pub stride: u32,
    /// Attributes in buffer order.
    pub attributes: Vec<VertexAttribute>,
}

/// Interns vertex formats and hands out stable [`FormatId`]s.
///
/// Registration is idempotent: formats with equal type ids map to the same
/// id, and the layout computed at first registration is reused.
#[derive(Debug, Default)]
pub struct VertexFormatRegistry {
    by_type_id: HashMap<u32, FormatId>,
    formats: Vec<VertexFormat>,
    layouts: Vec<VertexLayout>,
}

impl VertexFormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `format`, returning its id.
    pub fn register(&mut self, format: VertexFormat) -> FormatId {
        if let Some(&id) = self.by_type_id.get(&format.type_id()) {
            return id;
        }
        let id = FormatId(self.formats.len() as u32);
        self.by_type_id.insert(format.type_id(), id);
        self.formats.push(format);
        self.layouts.push(VertexLayout {
            stride: format.stride(),
            attributes: format.attributes(),
        });
        log::trace!(
            "registered vertex format type_id={} stride={} as {:?}",
            format.type_id(),
            format.stride(),
            id
        );
        id
    }

    /// The format registered under `id`.
    ///
    /// Panics if `id` did not come from this registry.
    pub fn format(&self, id: FormatId) -> VertexFormat {
        self.formats[id.0 as usize]
    }

    /// The layout of the format registered under `id`.
    ///
    /// Panics if `id` did not come from this registry.
    pub fn layout(&self, id: FormatId) -> &VertexLayout {
        &self.layouts[id.0 as usize]
    }

    /// Number of distinct formats registered.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether no format has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

fn pack_unorm8(value: f32) -> u8 {
    ((value * 255.0) as i32).clamp(0, 255) as u8
}

/// Pack a UV pair into a `u32` as two half floats.
pub fn pack_uv(uv: Vec2) -> u32 {
    let x = f16::from_f32(uv.x).to_bits() as u32;
    let y = f16::from_f32(uv.y).to_bits() as u32;
    x | y << 16
}

/// Unpack a UV pair packed by [`pack_uv`].
pub fn unpack_uv(packed: u32) -> Vec2 {
    Vec2::new(
        f16::from_bits(packed as u16).to_f32(),
        f16::from_bits((packed >> 16) as u16).to_f32(),
    )
}

/// Pack a unit quaternion into four bytes, one per component.
///
/// Components are clamped to [-1, 1] and quantized to 1/255 steps.
pub fn pack_tangent_frame(q: Quat) -> u32 {
    let pack = |c: f32| (((c + 1.0) * 255.0 * 0.5) as i32).clamp(0, 255) as u32;
    pack(q.x) | pack(q.y) << 8 | pack(q.z) << 16 | pack(q.w) << 24
}

/// Unpack a quaternion packed by [`pack_tangent_frame`].
///
/// The result is not renormalized.
pub fn unpack_tangent_frame(packed: u32) -> Quat {
    let unpack = |b: u32| (b & 255) as f32 * (2.0 / 255.0) - 1.0;
    Quat::from_xyzw(
        unpack(packed),
        unpack(packed >> 8),
        unpack(packed >> 16),
        unpack(packed >> 24),
    )
}

/// Pack an RGBA color into four bytes.
pub fn pack_color(color: Vec4) -> u32 {
    pack_unorm8(color.x) as u32
        | (pack_unorm8(color.y) as u32) << 8
        | (pack_unorm8(color.z) as u32) << 16
        | (pack_unorm8(color.w) as u32) << 24
}

/// Unpack a color packed by [`pack_color`].
pub fn unpack_color(packed: u32) -> Vec4 {
    let unpack = |b: u32| (b & 255) as f32 * (1.0 / 255.0);
    Vec4::new(
        unpack(packed),
        unpack(packed >> 8),
        unpack(packed >> 16),
        unpack(packed >> 24),
    )
}

/// Sentinel byte marking an unused bone slot.
pub const BONE_ID_NONE: u8 = 255;

/// Pack up to four bone bindings into `(ids, weights)` words.
///
/// Unused slots carry the [`BONE_ID_NONE`] sentinel and zero weight. Weights
/// are quantized to bytes; the quantization residual is added to weight 0 so
/// the packed weights always sum to 255.
pub fn pack_skinning(bone_ids: &[Option<u32>], bone_weights: &[f32]) -> (u32, u32) {
    let mut ids = [BONE_ID_NONE; 4];
    let mut weights = [0u8; 4];
    let mut residual = 255u8;
    for i in 0..bone_ids.len().min(bone_weights.len()).min(4) {
        ids[i] = match bone_ids[i] {
            Some(id) => id as u8,
            None => BONE_ID_NONE,
        };
        weights[i] = pack_unorm8(bone_weights[i]);
        residual = residual.wrapping_sub(weights[i]);
    }
    weights[0] = weights[0].wrapping_add(residual);
    (u32::from_le_bytes(ids), u32::from_le_bytes(weights))
}

/// Unpack bone bindings packed by [`pack_skinning`].
///
/// Slots carrying the sentinel id are skipped.
pub fn unpack_skinning(ids: u32, weights: u32) -> Vec<(u32, f32)> {
    let id_bytes = ids.to_le_bytes();
    let weight_bytes = weights.to_le_bytes();
    (0..4)
        .filter(|&i| id_bytes[i] != BONE_ID_NONE)
        .map(|i| (id_bytes[i] as u32, weight_bytes[i] as f32 * (1.0 / 255.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(VertexFormat::new(0, 0, false, false), 12)]
    #[case(VertexFormat::new(1, 0, true, false), 20)]
    #[case(VertexFormat::new(2, 0, false, false), 20)]
    #[case(VertexFormat::new(2, 1, true, true), 36)]
    #[case(VertexFormat::new(7, 7, true, true), 80)]
    fn test_stride(#[case] format: VertexFormat, #[case] expected: u32) {
        assert_eq!(format.stride(), expected);
    }

    #[test]
    fn test_type_id_round_trip() {
        let format = VertexFormat::new(3, 2, true, true);
        let id = format.type_id();
        assert_eq!(VertexFormat::from_type_id(id), format);
        // Distinct fields produce distinct ids.
        assert_ne!(
            VertexFormat::new(3, 2, true, false).type_id(),
            VertexFormat::new(3, 2, false, true).type_id()
        );
    }

    #[test]
    fn test_offsets_are_pure_functions_of_fields() {
        let format = VertexFormat::new(2, 1, true, true);
        assert_eq!(format.position_offset(), 0);
        assert_eq!(format.uv_offset(0), 12);
        assert_eq!(format.uv_offset(1), 16);
        assert_eq!(format.tangent_offset(), 20);
        assert_eq!(format.color_offset(0), 24);
        assert_eq!(format.bone_ids_offset(), 28);
        assert_eq!(format.bone_weights_offset(), 32);
        assert_eq!(format.stride(), 36);
    }

    #[test]
    fn test_registry_is_idempotent() {
        let mut registry = VertexFormatRegistry::new();
        let a = registry.register(VertexFormat::new(2, 0, true, false));
        let b = registry.register(VertexFormat::new(1, 0, false, false));
        let c = registry.register(VertexFormat::new(2, 0, true, false));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.layout(a).stride, 24);
    }

    #[test]
    fn test_uv_codec_round_trip() {
        for uv in [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.25),
            Vec2::new(1.0, -1.0),
            Vec2::new(12.5, -3.75),
        ] {
            let out = unpack_uv(pack_uv(uv));
            assert!((out.x - uv.x).abs() < 0.01, "{uv} -> {out}");
            assert!((out.y - uv.y).abs() < 0.01, "{uv} -> {out}");
        }
    }

    #[test]
    fn test_tangent_frame_codec_error_bound() {
        let q = Quat::from_xyzw(0.1825742, 0.3651484, 0.5477226, 0.7302967);
        let out = unpack_tangent_frame(pack_tangent_frame(q));
        for (a, b) in [(q.x, out.x), (q.y, out.y), (q.z, out.z), (q.w, out.w)] {
            assert!((a - b).abs() <= 2.0 / 255.0);
        }
    }

    #[test]
    fn test_tangent_frame_codec_clamps() {
        let q = Quat::from_xyzw(2.0, -2.0, 0.0, 1.0);
        let out = unpack_tangent_frame(pack_tangent_frame(q));
        assert!((out.x - 1.0).abs() < 1e-6);
        assert!((out.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_color_codec_round_trip() {
        let color = Vec4::new(1.0, 0.5, 0.25, 0.0);
        let out = unpack_color(pack_color(color));
        for (a, b) in [
            (color.x, out.x),
            (color.y, out.y),
            (color.z, out.z),
            (color.w, out.w),
        ] {
            assert!((a - b).abs() <= 1.0 / 255.0);
        }
    }

    #[test]
    fn test_skinning_weights_sum_to_255() {
        let (ids, weights) = pack_skinning(
            &[Some(3), Some(7), Some(12)],
            &[0.333, 0.333, 0.334],
        );
        let weight_bytes = weights.to_le_bytes();
        let sum: u32 = weight_bytes.iter().map(|&w| w as u32).sum();
        assert_eq!(sum, 255);
        assert_eq!(ids.to_le_bytes()[3], BONE_ID_NONE);
    }

    #[test]
    fn test_skinning_unused_slots_are_sentinel() {
        let (ids, weights) = pack_skinning(&[Some(5)], &[1.0]);
        let bindings = unpack_skinning(ids, weights);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, 5);
        assert!((bindings[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_skinning_mismatched_slice_lengths_clamp() {
        let (ids, weights) = pack_skinning(&[Some(1), Some(2), Some(3)], &[0.5, 0.5]);
        let bindings = unpack_skinning(ids, weights);
        // Only the slots backed by both slices are packed.
        assert_eq!(bindings.len(), 2);
        assert_eq!(ids.to_le_bytes()[2], BONE_ID_NONE);
        let sum: u32 = weights.to_le_bytes().iter().map(|&w| w as u32).sum();
        assert_eq!(sum, 255);
    }

    #[test]
    fn test_attribute_enumeration() {
        let format = VertexFormat::new(1, 1, true, true);
        let attrs = format.attributes();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs[0].semantic, AttributeSemantic::Position);
        assert_eq!(attrs.last().unwrap().semantic, AttributeSemantic::BoneWeights);
        // Offsets strictly increase in buffer order.
        assert!(attrs.windows(2).all(|w| w[0].offset < w[1].offset));
    }
}
