//! Mesh geometry: packed vertex formats, CPU storage, GPU upload handles.

mod data;
mod format;
mod gpu;

pub use data::{Bounds, ElementRange, MeshData};
pub use format::{
    pack_color, pack_skinning, pack_tangent_frame, pack_uv, unpack_color, unpack_skinning,
    unpack_tangent_frame, unpack_uv, AttributeFormat, AttributeSemantic, FormatId, VertexAttribute,
    VertexFormat, VertexFormatRegistry, VertexLayout, BONE_ID_NONE, MAX_CHANNELS,
};
pub use gpu::GpuMesh;
