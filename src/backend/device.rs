//! Render device front-end.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::dummy::DummyBackend;
use crate::backend::resource::{
    Buffer, DescriptorBinding, DescriptorSet, Pipeline, Sampler, SamplerDescriptor,
};
use crate::backend::{BufferId, CommandBuffer, DescriptorSetId, PipelineId, SamplerId, TextureId};
use crate::backend::resource::Texture;
use crate::error::RenderError;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// The graphics device.
///
/// All resource creation funnels through here so ids stay unique per device.
/// Only the recording backend is compiled into this crate; the creation
/// surface is shaped so a hardware backend slots in behind it.
#[derive(Debug)]
pub struct RenderDevice {
    backend: DummyBackend,
}

assert_impl_all!(RenderDevice: Send, Sync);

impl RenderDevice {
    /// Create a device over the recording backend.
    pub fn new() -> Arc<Self> {
        let device = Self {
            backend: DummyBackend::new(),
        };
        log::trace!("created render device, backend={}", device.backend.name());
        Arc::new(device)
    }

    /// Required alignment for uniform buffer offsets.
    pub fn uniform_alignment(&self) -> u64 {
        self.backend.uniform_alignment()
    }

    /// Access the recording backend, for inspection in tests.
    pub fn backend(&self) -> &DummyBackend {
        &self.backend
    }

    /// Create a buffer.
    pub fn create_buffer(&self, descriptor: BufferDescriptor) -> Result<Arc<Buffer>, RenderError> {
        if descriptor.size == 0 {
            return Err(RenderError::ResourceCreation(format!(
                "zero-sized buffer '{}'",
                descriptor.label.as_deref().unwrap_or("<unnamed>")
            )));
        }
        let id = BufferId(self.backend.next_resource_id());
        log::trace!(
            "create buffer id={:?} size={} label={:?}",
            id,
            descriptor.size,
            descriptor.label
        );
        Ok(Arc::new(Buffer { id, descriptor }))
    }

    /// Create a texture.
    pub fn create_texture(
        &self,
        descriptor: TextureDescriptor,
    ) -> Result<Arc<Texture>, RenderError> {
        let size = descriptor.size;
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(RenderError::ResourceCreation(format!(
                "zero-sized texture '{}'",
                descriptor.label.as_deref().unwrap_or("<unnamed>")
            )));
        }
        let id = TextureId(self.backend.next_resource_id());
        log::trace!(
            "create texture id={:?} size={}x{}x{} format={:?}",
            id,
            size.width,
            size.height,
            size.depth,
            descriptor.format
        );
        Ok(Arc::new(Texture { id, descriptor }))
    }

    /// Create a sampler.
    pub fn create_sampler(&self, descriptor: SamplerDescriptor) -> Arc<Sampler> {
        let id = SamplerId(self.backend.next_resource_id());
        log::trace!("create sampler id={:?} {:?}", id, descriptor);
        Arc::new(Sampler { id, descriptor })
    }

    /// Create a descriptor set from `entries`.
    ///
    /// Entries are sorted by binding index; duplicate bindings are rejected.
    pub fn create_descriptor_set(
        &self,
        label: impl Into<String>,
        mut entries: Vec<DescriptorBinding>,
    ) -> Result<Arc<DescriptorSet>, RenderError> {
        entries.sort_by_key(|e| e.binding);
        if entries.windows(2).any(|w| w[0].binding == w[1].binding) {
            return Err(RenderError::ResourceCreation(
                "duplicate binding index in descriptor set".to_string(),
            ));
        }
        let id = DescriptorSetId(self.backend.next_resource_id());
        let label = label.into();
        log::trace!(
            "create descriptor set id={:?} label={} entries={}",
            id,
            label,
            entries.len()
        );
        Ok(Arc::new(DescriptorSet {
            id,
            label: Some(label),
            entries,
        }))
    }

    /// Create a pipeline object.
    ///
    /// Shader-module linking happens in the compiler; the device only mints
    /// the resource the link produces.
    pub fn create_pipeline(
        &self,
        label: impl Into<String>,
        double_sided: bool,
        transparent: bool,
    ) -> Arc<Pipeline> {
        let id = PipelineId(self.backend.next_resource_id());
        let label = label.into();
        log::trace!("create pipeline id={:?} label={}", id, label);
        Arc::new(Pipeline {
            id,
            label,
            double_sided,
            transparent,
        })
    }

    /// Begin recording a command buffer.
    pub fn create_command_buffer(&self, label: impl Into<String>) -> CommandBuffer {
        CommandBuffer::new(label)
    }

    /// Write `data` into `buffer` at `offset`.
    ///
    /// Panics in debug builds if the write runs past the end of the buffer.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) {
        debug_assert!(
            offset + data.len() as u64 <= buffer.size(),
            "write past end of buffer {:?}: offset {} + len {} > size {}",
            buffer.id(),
            offset,
            data.len(),
            buffer.size()
        );
        self.backend.write_buffer(buffer.id().0, offset, data);
    }

    /// Upload texel data to `texture`.
    pub fn write_texture(&self, texture: &Texture, data: &[u8]) {
        self.backend.write_texture(texture.id().0, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, Extent3d, TextureFormat, TextureUsage};

    #[test]
    fn test_resource_ids_are_unique() {
        let device = RenderDevice::new();
        let a = device
            .create_buffer(BufferDescriptor::new(64, BufferUsage::VERTEX))
            .unwrap();
        let b = device
            .create_buffer(BufferDescriptor::new(64, BufferUsage::VERTEX))
            .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_zero_sized_buffer_rejected() {
        let device = RenderDevice::new();
        assert!(matches!(
            device.create_buffer(BufferDescriptor::new(0, BufferUsage::UNIFORM)),
            Err(RenderError::ResourceCreation(_))
        ));
    }

    #[test]
    fn test_texture_creation() {
        let device = RenderDevice::new();
        let tex = device
            .create_texture(TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            ))
            .unwrap();
        assert_eq!(tex.descriptor().size, Extent3d::new_2d(16, 16));
    }

    #[test]
    fn test_duplicate_descriptor_binding_rejected() {
        let device = RenderDevice::new();
        let sampler = device.create_sampler(SamplerDescriptor::linear());
        let entries = vec![
            DescriptorBinding {
                binding: 1,
                resource: crate::backend::resource::BoundResource::Sampler(sampler.clone()),
            },
            DescriptorBinding {
                binding: 1,
                resource: crate::backend::resource::BoundResource::Sampler(sampler),
            },
        ];
        assert!(device.create_descriptor_set("dup", entries).is_err());
    }
}
