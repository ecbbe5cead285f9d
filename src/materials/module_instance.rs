//! Bound shader-module state.

use std::sync::Arc;

use crate::backend::DescriptorSet;
use crate::memory::ArenaAllocation;
use crate::shader::ShaderModule;

/// A module's uniform slice within the uniform arena.
///
/// The physical allocation holds `frame_count` copies of `length` logical
/// bytes, each copy starting on a `frame_size` boundary, so a frame still in
/// flight never observes a mid-frame update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlice {
    /// The physical arena allocation (size `frame_size * frame_count`).
    pub allocation: ArenaAllocation,
    /// Logical byte length of one copy.
    pub length: u64,
    /// Aligned stride between frame copies.
    pub frame_size: u64,
    /// Number of frame copies.
    pub frame_count: u32,
}

impl UniformSlice {
    /// Absolute buffer offset of frame `frame`'s copy.
    pub fn frame_offset(&self, frame: u32) -> u64 {
        debug_assert!(frame < self.frame_count);
        self.allocation.offset + frame as u64 * self.frame_size
    }
}

/// One shader module bound for one material or transform.
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    /// The bound module's metadata.
    pub module: Arc<ShaderModule>,
    /// Uniform slice, absent when the module declares no value parameters.
    pub uniform: Option<UniformSlice>,
    /// One descriptor set per frame-in-flight copy.
    pub descriptor_sets: Vec<Arc<DescriptorSet>>,
}

impl ModuleInstance {
    /// The descriptor set for frame `frame`.
    pub fn descriptor_set(&self, frame: u32) -> &Arc<DescriptorSet> {
        &self.descriptor_sets[frame as usize % self.descriptor_sets.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_offset_addressing() {
        let slice = UniformSlice {
            allocation: ArenaAllocation {
                offset: 1024,
                size: 768,
            },
            length: 48,
            frame_size: 256,
            frame_count: 3,
        };
        assert_eq!(slice.frame_offset(0), 1024);
        assert_eq!(slice.frame_offset(1), 1280);
        assert_eq!(slice.frame_offset(2), 1536);
    }
}
