//! Texture storage and the fallback texture.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{RenderDevice, Texture};
use crate::error::RenderError;
use crate::types::{TextureData, TextureDescriptor, TextureUsage};

/// Named textures available for material binding.
///
/// Unresolvable lookups substitute a shared 2x2 magenta/black checker so a
/// broken texture reference is loud on screen but never fails the material.
#[derive(Debug)]
pub struct TextureStore {
    device: Arc<RenderDevice>,
    textures: HashMap<String, Arc<Texture>>,
    fallback: Option<Arc<Texture>>,
}

impl TextureStore {
    /// Create an empty store.
    pub fn new(device: Arc<RenderDevice>) -> Self {
        Self {
            device,
            textures: HashMap::new(),
            fallback: None,
        }
    }

    /// Register an already-created texture under `name`.
    pub fn insert(&mut self, name: impl Into<String>, texture: Arc<Texture>) {
        self.textures.insert(name.into(), texture);
    }

    /// Upload `data` and register the texture under `name`.
    ///
    /// Three-channel data is expanded to four on the way in.
    pub fn load(&mut self, name: impl Into<String>, data: &TextureData) -> Result<Arc<Texture>, RenderError> {
        let name = name.into();
        let format = data.format.device_format();
        let texture = self.device.create_texture(
            TextureDescriptor::new_2d(
                data.width,
                data.height,
                format,
                TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            )
            .with_label(name.clone()),
        )?;
        if data.format.needs_channel_expansion() {
            let expanded = expand_three_channel(&data.bytes, channel_width(data)?);
            self.device.write_texture(&texture, &expanded);
        } else {
            self.device.write_texture(&texture, &data.bytes);
        }
        self.textures.insert(name, texture.clone());
        Ok(texture)
    }

    /// Look up `name` without fallback substitution.
    pub fn get(&self, name: &str) -> Option<&Arc<Texture>> {
        self.textures.get(name)
    }

    /// Look up `name`, substituting the fallback texture when unresolvable.
    ///
    /// Returns the texture and whether the fallback was used.
    pub fn get_or_fallback(&mut self, name: Option<&str>) -> (Arc<Texture>, bool) {
        if let Some(name) = name {
            if let Some(texture) = self.textures.get(name) {
                return (texture.clone(), false);
            }
        }
        (self.fallback(), true)
    }

    /// The shared fallback texture, created on first use.
    pub fn fallback(&mut self) -> Arc<Texture> {
        if let Some(fallback) = &self.fallback {
            return fallback.clone();
        }
        let texture = self
            .device
            .create_texture(
                TextureDescriptor::new_2d(
                    2,
                    2,
                    crate::types::TextureFormat::Rgba8Unorm,
                    TextureUsage::SAMPLED | TextureUsage::COPY_DST,
                )
                .with_label("fallback_checker"),
            )
            .expect("fallback texture descriptor is statically valid");
        // Magenta/black checker.
        let magenta = [255u8, 0, 255, 255];
        let black = [0u8, 0, 0, 255];
        let texels: Vec<u8> = [magenta, black, black, magenta].concat();
        self.device.write_texture(&texture, &texels);
        self.fallback = Some(texture.clone());
        texture
    }
}

fn channel_width(data: &TextureData) -> Result<u32, RenderError> {
    let texel_count = (data.width * data.height) as usize;
    if texel_count == 0 || data.bytes.len() % (texel_count * 3) != 0 {
        return Err(RenderError::UnsupportedFormat(format!(
            "three-channel texture data of {} bytes does not cover {}x{} texels",
            data.bytes.len(),
            data.width,
            data.height
        )));
    }
    Ok((data.bytes.len() / (texel_count * 3)) as u32)
}

/// Expand tightly-packed 3-channel texels to 4 channels.
///
/// `channel_bytes` is the per-channel width (1 for 8-bit, 4 for float data);
/// the added fourth channel is the format's maximum (opaque alpha).
fn expand_three_channel(bytes: &[u8], channel_bytes: u32) -> Vec<u8> {
    let channel_bytes = channel_bytes as usize;
    let texel = channel_bytes * 3;
    let alpha_one: Vec<u8> = if channel_bytes == 4 {
        1.0f32.to_le_bytes().to_vec()
    } else {
        vec![0xff; channel_bytes]
    };
    let mut out = Vec::with_capacity(bytes.len() / 3 * 4);
    for chunk in bytes.chunks_exact(texel) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(&alpha_one);
    }
    out
}
