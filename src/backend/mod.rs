//! GPU backend abstraction.
//!
//! Real GPU APIs live behind this boundary; this crate ships only the
//! recording backend, which captures the command stream and resource
//! traffic without touching hardware. That is enough for the resource
//! core: every state-diffing and splitting decision the draw batcher makes
//! is visible in the recorded command list, and tests assert on it
//! directly.
//!
//! Resource identity is carried by small integer ids assigned at creation.
//! The batcher compares ids to decide whether a rebind is redundant, so
//! two `Arc`s to the same resource never cause a duplicate bind.

pub mod dummy;

mod device;
mod resource;

pub use device::RenderDevice;
pub use resource::{
    BoundResource, Buffer, DescriptorBinding, DescriptorSet, FilterMode, Pipeline, Sampler,
    SamplerDescriptor, Texture, WrapMode,
};

use crate::types::Viewport;

/// Identifier of a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Identifier of a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Identifier of a texture sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub u32);

/// Identifier of a descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetId(pub u32);

/// Identifier of a linked pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u32);

/// A single recorded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the viewport rectangle.
    SetViewport(Viewport),
    /// Clear the pass's attachments.
    ClearAttachments,
    /// Bind a graphics pipeline.
    BindPipeline(PipelineId),
    /// Bind a descriptor set at a binding slot.
    BindDescriptorSet {
        /// Binding slot index.
        slot: u32,
        /// The descriptor set.
        set: DescriptorSetId,
    },
    /// Bind a vertex buffer at a byte offset.
    BindVertexBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Byte offset of the first vertex.
        offset: u64,
    },
    /// Bind an index buffer at a byte offset.
    BindIndexBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Byte offset into the buffer.
        offset: u64,
    },
    /// Draw `index_count` indices starting at `first_index`.
    DrawIndexed {
        /// Index of the first index to read.
        first_index: u32,
        /// Number of indices to draw.
        index_count: u32,
    },
}

/// A command buffer under recording.
///
/// Each buffer is independently submittable: the draw batcher re-establishes
/// the full binding state at the start of every buffer rather than carrying
/// bound state across buffers.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    label: Option<String>,
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create a new empty command buffer.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            commands: Vec::new(),
        }
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    /// Clear the pass attachments.
    pub fn clear_attachments(&mut self) {
        self.commands.push(Command::ClearAttachments);
    }

    /// Bind a pipeline.
    pub fn bind_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    /// Bind a descriptor set at `slot`.
    pub fn bind_descriptor_set(&mut self, slot: u32, set: DescriptorSetId) {
        self.commands.push(Command::BindDescriptorSet { slot, set });
    }

    /// Bind a vertex buffer.
    pub fn bind_vertex_buffer(&mut self, buffer: BufferId, offset: u64) {
        self.commands.push(Command::BindVertexBuffer { buffer, offset });
    }

    /// Bind an index buffer.
    pub fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64) {
        self.commands.push(Command::BindIndexBuffer { buffer, offset });
    }

    /// Record an indexed draw.
    pub fn draw_indexed(&mut self, first_index: u32, index_count: u32) {
        self.commands.push(Command::DrawIndexed {
            first_index,
            index_count,
        });
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the recorded command list.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Count of draw calls recorded so far.
    pub fn draw_count(&self) -> u32 {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count() as u32
    }

    /// Count of a specific kind of state-change command.
    pub fn count_matching(&self, pred: impl Fn(&Command) -> bool) -> u32 {
        self.commands.iter().filter(|c| pred(c)).count() as u32
    }
}
