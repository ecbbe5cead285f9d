//! GPU-resident mesh handles.

use crate::memory::ArenaAllocation;
use crate::mesh::format::FormatId;

/// A mesh uploaded into the shared vertex and index arenas.
///
/// Holds no device resources of its own; the allocations reference ranges of
/// the owning context's arena buffers and must be released through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    /// Range of the vertex arena holding the packed vertices.
    pub vertex_allocation: ArenaAllocation,
    /// Range of the index arena holding the `u32` indices.
    pub index_allocation: ArenaAllocation,
    /// Number of vertices uploaded.
    pub vertex_count: u32,
    /// Number of indices uploaded.
    pub index_count: u32,
    /// Registered vertex format of the uploaded data.
    pub format: FormatId,
}
