//! Device resource objects.
//!
//! Resources are created through [`RenderDevice`] and shared as `Arc`s.
//! Each carries the descriptor it was created from and a device-unique id;
//! the id is what ends up in recorded commands.
//!
//! [`RenderDevice`]: crate::backend::RenderDevice

use std::sync::Arc;

use crate::backend::{BufferId, DescriptorSetId, PipelineId, SamplerId, TextureId};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// A GPU buffer.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) id: BufferId,
    pub(crate) descriptor: BufferDescriptor,
}

impl Buffer {
    /// Device-unique buffer id.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The descriptor the buffer was created from.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }
}

/// A GPU texture.
#[derive(Debug)]
pub struct Texture {
    pub(crate) id: TextureId,
    pub(crate) descriptor: TextureDescriptor,
}

impl Texture {
    /// Device-unique texture id.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The descriptor the texture was created from.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest-texel sampling.
    Nearest,
    /// Bilinear filtering.
    #[default]
    Linear,
}

/// Texture addressing mode outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Repeat the texture.
    #[default]
    Repeat,
    /// Clamp to the edge texel.
    ClampToEdge,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Filtering mode for minification and magnification.
    pub filter: FilterMode,
    /// Addressing mode for all axes.
    pub wrap: WrapMode,
}

impl SamplerDescriptor {
    /// Bilinear repeat sampler, the material default.
    pub fn linear() -> Self {
        Self::default()
    }

    /// Nearest clamped sampler.
    pub fn nearest() -> Self {
        Self {
            filter: FilterMode::Nearest,
            wrap: WrapMode::ClampToEdge,
        }
    }
}

/// A texture sampler.
#[derive(Debug)]
pub struct Sampler {
    pub(crate) id: SamplerId,
    pub(crate) descriptor: SamplerDescriptor,
}

impl Sampler {
    /// Device-unique sampler id.
    pub fn id(&self) -> SamplerId {
        self.id
    }

    /// The descriptor the sampler was created from.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }
}

/// A resource bound through a descriptor set entry.
#[derive(Debug, Clone)]
pub enum BoundResource {
    /// A sub-range of a uniform buffer.
    UniformSlice {
        /// The backing buffer.
        buffer: Arc<Buffer>,
        /// Byte offset of the slice.
        offset: u64,
        /// Byte length of the slice.
        length: u64,
    },
    /// A sub-range of a storage buffer.
    StorageSlice {
        /// The backing buffer.
        buffer: Arc<Buffer>,
        /// Byte offset of the slice.
        offset: u64,
        /// Byte length of the slice.
        length: u64,
    },
    /// A sampled texture.
    Texture(Arc<Texture>),
    /// A sampler.
    Sampler(Arc<Sampler>),
}

/// One entry of a descriptor set.
#[derive(Debug, Clone)]
pub struct DescriptorBinding {
    /// Binding index within the set.
    pub binding: u32,
    /// The bound resource.
    pub resource: BoundResource,
}

/// An immutable set of resource bindings.
///
/// Sets are never updated in place. Re-binding a material builds a new set;
/// uniform data updates go through the buffer the set already references, so
/// no set churn happens on per-frame parameter changes.
#[derive(Debug)]
pub struct DescriptorSet {
    pub(crate) id: DescriptorSetId,
    pub(crate) label: Option<String>,
    pub(crate) entries: Vec<DescriptorBinding>,
}

impl DescriptorSet {
    /// Device-unique set id.
    pub fn id(&self) -> DescriptorSetId {
        self.id
    }

    /// Debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The set's bindings, sorted by binding index.
    pub fn entries(&self) -> &[DescriptorBinding] {
        &self.entries
    }

    /// Look up the entry at `binding`.
    pub fn entry(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.entries.iter().find(|e| e.binding == binding)
    }
}

/// A linked graphics pipeline.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) id: PipelineId,
    pub(crate) label: String,
    pub(crate) double_sided: bool,
    pub(crate) transparent: bool,
}

impl Pipeline {
    /// Device-unique pipeline id.
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether back-face culling is disabled.
    pub fn double_sided(&self) -> bool {
        self.double_sided
    }

    /// Whether alpha blending is enabled.
    pub fn transparent(&self) -> bool {
        self.transparent
    }
}
