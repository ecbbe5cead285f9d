//! Texture descriptors, formats, and asset-format mapping.

use bitflags::bitflags;

use crate::error::RenderError;

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be sampled in shaders.
        const SAMPLED = 1 << 0;
        /// Texture can be used as a color attachment.
        const COLOR_ATTACHMENT = 1 << 1;
        /// Texture can be used as a depth attachment.
        const DEPTH_ATTACHMENT = 1 << 2;
        /// Texture can be copied to.
        const COPY_DST = 1 << 3;
    }
}

/// Device texture storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit channel.
    R8Unorm,
    /// Two 8-bit channels.
    Rg8Unorm,
    /// Four 8-bit channels.
    Rgba8Unorm,
    /// Single 32-bit float channel.
    R32Float,
    /// Two 32-bit float channels.
    Rg32Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// 32-bit depth.
    Depth32Float,
    /// Block-compressed BC1 (RGB + 1-bit alpha).
    Bc1,
    /// Block-compressed BC3 (RGBA).
    Bc3,
    /// Block-compressed BC5 (two channels, normal maps).
    Bc5,
}

impl TextureFormat {
    /// Bytes per texel for uncompressed formats, `None` for block-compressed.
    pub fn texel_size(&self) -> Option<u32> {
        match self {
            Self::R8Unorm => Some(1),
            Self::Rg8Unorm => Some(2),
            Self::Rgba8Unorm => Some(4),
            Self::R32Float => Some(4),
            Self::Rg32Float => Some(8),
            Self::Rgba32Float => Some(16),
            Self::Rgba16Float => Some(8),
            Self::Depth32Float => Some(4),
            Self::Bc1 | Self::Bc3 | Self::Bc5 => None,
        }
    }

    /// Whether this format can back a render-target attachment.
    ///
    /// Block-compressed formats cannot; requesting one as an attachment is an
    /// [`RenderError::UnsupportedFormat`] condition since continuing would
    /// corrupt GPU state.
    pub fn attachment_format(&self) -> Result<Self, RenderError> {
        match self {
            Self::Bc1 | Self::Bc3 | Self::Bc5 => Err(RenderError::UnsupportedFormat(format!(
                "{self:?} cannot be used as a render target"
            ))),
            other => Ok(*other),
        }
    }
}

/// Storage format declared by a texture asset.
///
/// Asset formats are mapped to [`TextureFormat`] on upload; three-channel
/// formats are expanded to four since devices do not support them natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetTextureFormat {
    /// 8-bit single channel.
    R8,
    /// 8-bit two channels.
    Rg8,
    /// 8-bit three channels (expanded to RGBA on upload).
    Rgb8,
    /// 8-bit four channels.
    Rgba8,
    /// 32-bit float single channel.
    RFloat32,
    /// 32-bit float two channels.
    RgFloat32,
    /// 32-bit float three channels (expanded to RGBA on upload).
    RgbFloat32,
    /// 32-bit float four channels.
    RgbaFloat32,
    /// Block-compressed BC1.
    Bc1,
    /// Block-compressed BC3.
    Bc3,
    /// Block-compressed BC5.
    Bc5,
}

impl AssetTextureFormat {
    /// Map the asset format to the device format used to store it.
    pub fn device_format(&self) -> TextureFormat {
        match self {
            Self::R8 => TextureFormat::R8Unorm,
            Self::Rg8 => TextureFormat::Rg8Unorm,
            Self::Rgb8 | Self::Rgba8 => TextureFormat::Rgba8Unorm,
            Self::RFloat32 => TextureFormat::R32Float,
            Self::RgFloat32 => TextureFormat::Rg32Float,
            Self::RgbFloat32 | Self::RgbaFloat32 => TextureFormat::Rgba32Float,
            Self::Bc1 => TextureFormat::Bc1,
            Self::Bc3 => TextureFormat::Bc3,
            Self::Bc5 => TextureFormat::Bc5,
        }
    }

    /// Whether upload must expand three-channel texels to four.
    pub fn needs_channel_expansion(&self) -> bool {
        matches!(self, Self::Rgb8 | Self::RgbFloat32)
    }
}

/// In-memory texture pixel data handed over by an asset loader.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Declared storage format of `bytes`.
    pub format: AssetTextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Raw texel bytes, tightly packed.
    pub bytes: Vec<u8>,
}

/// 3D extent of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth or array layer count.
    pub depth: u32,
}

impl Extent3d {
    /// Create a 2D extent (depth 1).
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Texture dimensions.
    pub size: Extent3d,
    /// Storage format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            format,
            usage,
        }
    }

    /// Create a 2D array texture descriptor with `layers` layers.
    pub fn new_2d_array(
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: None,
            size: Extent3d {
                width,
                height,
                depth: layers,
            },
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
