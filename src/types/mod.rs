//! Core value types shared across the crate.
//!
//! Descriptors are plain data: they describe a resource to create and are
//! retained by the created resource for inspection and debug output.

mod buffer;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use texture::{
    AssetTextureFormat, Extent3d, TextureData, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Viewport rectangle for command recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Create a viewport covering `width` × `height` at the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}
