//! GPU resource management and draw submission for the Cinder renderer.
//!
//! This crate owns the resource side of a real-time renderer: device memory
//! arenas, packed vertex formats, material binding, pipeline caching, shadow
//! atlas slots, and state-diffed draw batching. It deliberately stops at the
//! GPU API boundary; the recording backend in [`backend`] captures command
//! streams so every decision the crate makes is observable without hardware.
//!
//! Typical flow: construct a [`SceneResources`] context, upload meshes and
//! register materials through it, then per frame call
//! [`SceneResources::begin_frame`], flush dirty materials, and hand the
//! frame's drawables to a [`batch::DrawBatcher`].
//!
//! [`SceneResources`]: resources::SceneResources

pub mod backend;
pub mod batch;
pub mod error;
pub mod materials;
pub mod memory;
pub mod mesh;
pub mod pipeline;
pub mod resources;
pub mod shader;
pub mod shadow;
pub mod types;

pub use backend::RenderDevice;
pub use batch::{BatcherConfig, DrawBatcher, DrawableRecord, PassContext, PassStats};
pub use error::RenderError;
pub use materials::{Material, MaterialId, ParameterValue};
pub use memory::{ArenaAllocation, DeviceMemoryArena};
pub use mesh::{GpuMesh, MeshData, VertexFormat, VertexFormatRegistry};
pub use pipeline::{PipelineCache, PipelineKey};
pub use resources::{SceneConfig, SceneResources};
pub use shadow::ShadowSlotAllocator;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
