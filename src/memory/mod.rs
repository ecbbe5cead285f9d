//! Device memory management.
//!
//! Large device buffers are created once and sub-allocated with
//! [`DeviceMemoryArena`]; meshes and material uniforms never own a device
//! buffer of their own.

mod arena;

pub use arena::{ArenaAllocation, DeviceMemoryArena};

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
