//! Render error types.
//!
//! The error taxonomy distinguishes conditions that are fatal for the current
//! frame or asset load from conditions the caller absorbs locally:
//!
//! - Resource exhaustion of a device memory arena is fatal; growing a
//!   GPU-resident buffer requires a recreation step outside this crate.
//! - Shadow-atlas exhaustion is *not* an error: [`ShadowSlotAllocator`]
//!   returns `None` and the caller skips shadow rendering for that light.
//! - Missing textures or shader parameters are absorbed by the material
//!   binder with a fallback resource and a logged diagnostic.
//! - Invariant violations (double-free of a shadow slot, writing past a
//!   uniform slice) are programming errors and assert instead of returning.
//!
//! [`ShadowSlotAllocator`]: crate::shadow::ShadowSlotAllocator

use thiserror::Error;

/// Errors that can occur in the render resource core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A device memory arena ran out of space.
    #[error("arena '{arena}' exhausted: requested {requested} bytes, {available} of {capacity} available")]
    ArenaExhausted {
        /// Label of the arena that overflowed.
        arena: &'static str,
        /// Size of the failed allocation request in bytes.
        requested: u64,
        /// Bytes still unallocated (possibly fragmented).
        available: u64,
        /// Total arena capacity in bytes.
        capacity: u64,
    },

    /// A shader module could not be found, and no default substitute exists.
    #[error("shader module '{module}' not found")]
    ShaderNotFound {
        /// Name of the missing module.
        module: String,
    },

    /// An asset declares a texture or storage format with no device mapping.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No valid pipeline could be resolved for a drawable.
    #[error("no pipeline for material {material} in render pass {pass}")]
    NoPipeline {
        /// Numeric id of the material.
        material: u32,
        /// Render pass the resolution failed for.
        pass: usize,
    },

    /// Failed to create a device resource.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
