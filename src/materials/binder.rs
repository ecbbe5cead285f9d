//! Resolves material parameters against shader modules and builds GPU state.

use std::sync::Arc;

use crate::backend::{
    BoundResource, Buffer, DescriptorBinding, RenderDevice, Sampler, SamplerDescriptor,
};
use crate::error::RenderError;
use crate::materials::{Material, ModuleInstance, TextureStore, UniformSlice};
use crate::memory::{align_up, DeviceMemoryArena};
use crate::shader::{
    BindableType, ParameterKind, ShaderCompiler, ShaderModule, ATTR_DOUBLE_SIDED, ATTR_TRANSPARENT,
    DEFAULT_GEOMETRY, DEFAULT_PATTERN,
};
use crate::types::{BufferDescriptor, BufferUsage};

/// Binds materials to shader modules.
///
/// Binding never fails on a bad parameter: unresolvable textures get the
/// fallback texture, unresolvable modules get the default module pair. The
/// only fatal outcomes are a missing default module and resource exhaustion.
#[derive(Debug)]
pub struct MaterialBinder {
    device: Arc<RenderDevice>,
    frames_in_flight: u32,
    default_sampler: Arc<Sampler>,
    fallback_storage: Arc<Buffer>,
}

impl MaterialBinder {
    /// Create a binder producing `frames_in_flight` copies of mutable state.
    pub fn new(device: Arc<RenderDevice>, frames_in_flight: u32) -> Result<Self, RenderError> {
        if frames_in_flight == 0 {
            return Err(RenderError::InvalidParameter(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        let default_sampler = device.create_sampler(SamplerDescriptor::linear());
        let fallback_storage = device.create_buffer(
            BufferDescriptor::new(256, BufferUsage::STORAGE).with_label("fallback_storage"),
        )?;
        Ok(Self {
            device,
            frames_in_flight,
            default_sampler,
            fallback_storage,
        })
    }

    /// Number of frame copies bound state carries.
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// Bind `module` for `material`.
    ///
    /// Allocates the uniform slice (one copy per frame in flight, skipped
    /// when the module has no value parameters) and builds the per-frame
    /// descriptor sets: binding 0 is the uniform slice when present,
    /// bindable parameters follow in declaration order.
    pub fn bind_module(
        &self,
        material: &Material,
        module: &Arc<ShaderModule>,
        uniform_arena: &mut DeviceMemoryArena,
        textures: &mut TextureStore,
    ) -> Result<ModuleInstance, RenderError> {
        let uniform = if module.uniform_size() > 0 {
            let frame_size = align_up(module.uniform_size() as u64, self.device.uniform_alignment());
            let allocation = uniform_arena.alloc(frame_size * self.frames_in_flight as u64)?;
            Some(UniformSlice {
                allocation,
                length: module.uniform_size() as u64,
                frame_size,
                frame_count: self.frames_in_flight,
            })
        } else {
            None
        };

        // Resolve bindables once; only the uniform entry differs per frame.
        let mut bindables = Vec::new();
        for param in module.bindable_parameters() {
            let ParameterKind::Bindable(bindable) = param.kind else {
                unreachable!();
            };
            let resource = match bindable {
                BindableType::Texture => {
                    let name = material
                        .parameter(&param.name)
                        .and_then(|v| v.texture_name());
                    let (texture, used_fallback) = textures.get_or_fallback(name);
                    if used_fallback {
                        log::warn!(
                            "material '{}': texture parameter '{}' ({}) unresolved, using fallback",
                            material.name(),
                            param.name,
                            name.unwrap_or("<unset>")
                        );
                    }
                    BoundResource::Texture(texture)
                }
                BindableType::Sampler => BoundResource::Sampler(self.default_sampler.clone()),
                BindableType::StorageBuffer => {
                    log::warn!(
                        "material '{}': storage parameter '{}' has no source, binding fallback",
                        material.name(),
                        param.name
                    );
                    BoundResource::StorageSlice {
                        buffer: self.fallback_storage.clone(),
                        offset: 0,
                        length: self.fallback_storage.size(),
                    }
                }
            };
            bindables.push(resource);
        }

        let mut descriptor_sets = Vec::with_capacity(self.frames_in_flight as usize);
        for frame in 0..self.frames_in_flight {
            let mut entries = Vec::new();
            if let Some(slice) = &uniform {
                entries.push(DescriptorBinding {
                    binding: 0,
                    resource: BoundResource::UniformSlice {
                        buffer: uniform_arena.buffer().clone(),
                        offset: slice.frame_offset(frame),
                        length: slice.length,
                    },
                });
            }
            for (i, resource) in bindables.iter().enumerate() {
                entries.push(DescriptorBinding {
                    binding: i as u32 + 1,
                    resource: resource.clone(),
                });
            }
            descriptor_sets.push(self.device.create_descriptor_set(
                format!("{}:{}:f{}", material.name(), module.name(), frame),
                entries,
            )?);
        }

        Ok(ModuleInstance {
            module: module.clone(),
            uniform,
            descriptor_sets,
        })
    }

    fn resolve_module(
        &self,
        compiler: &dyn ShaderCompiler,
        wanted: &str,
        default: &str,
    ) -> Result<Arc<ShaderModule>, RenderError> {
        if let Some(module) = compiler.find_module(wanted) {
            return Ok(module);
        }
        log::warn!("shader module '{wanted}' not found, substituting '{default}'");
        compiler
            .find_module(default)
            .ok_or_else(|| RenderError::ShaderNotFound {
                module: default.to_string(),
            })
    }

    /// Resolve and bind the material's pattern and geometry modules.
    ///
    /// Module names derive from the shader name (`<Shader>Pattern`,
    /// `<Shader>Geometry`). A previous binding's uniform slices are returned
    /// to the arena first.
    pub fn register_material(
        &self,
        material: &mut Material,
        compiler: &dyn ShaderCompiler,
        uniform_arena: &mut DeviceMemoryArena,
        textures: &mut TextureStore,
    ) -> Result<(), RenderError> {
        for old in [material.pattern.take(), material.geometry.take()]
            .into_iter()
            .flatten()
        {
            if let Some(slice) = old.uniform {
                uniform_arena.free(slice.allocation);
            }
        }

        let shader = material.shader_name().to_string();
        let pattern_module =
            self.resolve_module(compiler, &format!("{shader}Pattern"), DEFAULT_PATTERN)?;
        let geometry_module =
            self.resolve_module(compiler, &format!("{shader}Geometry"), DEFAULT_GEOMETRY)?;

        let pattern = self.bind_module(material, &pattern_module, uniform_arena, textures)?;
        let geometry = self.bind_module(material, &geometry_module, uniform_arena, textures)?;

        material.pattern_variables = pattern_module
            .value_parameters()
            .map(|p| p.name.clone())
            .collect();
        material.geometry_variables = geometry_module
            .value_parameters()
            .map(|p| p.name.clone())
            .collect();
        material.is_transparent = pattern_module.has_attribute(ATTR_TRANSPARENT)
            || geometry_module.has_attribute(ATTR_TRANSPARENT);
        material.is_double_sided = pattern_module.has_attribute(ATTR_DOUBLE_SIDED)
            || geometry_module.has_attribute(ATTR_DOUBLE_SIDED);
        material.pattern = Some(pattern);
        material.geometry = Some(geometry);
        log::trace!(
            "registered material '{}' shader='{}' transparent={} double_sided={}",
            material.name(),
            shader,
            material.is_transparent,
            material.is_double_sided
        );
        Ok(())
    }

    /// Re-pack dirty parameter values into the material's uniform slices.
    ///
    /// Every frame copy is rewritten: frames in flight each read their own
    /// copy through the rotating descriptor sets, so all of them must carry
    /// the new values.
    ///
    /// Returns whether the material was dirty; the caller is responsible for
    /// invalidating pipelines cached for this material when it was.
    pub fn update_material_uniforms(
        &self,
        material: &mut Material,
        uniform_arena: &mut DeviceMemoryArena,
    ) -> bool {
        if !material.parameter_dirty() {
            return false;
        }
        material.clear_parameter_dirty();

        for instance in [material.pattern.clone(), material.geometry.clone()]
            .into_iter()
            .flatten()
        {
            let Some(slice) = instance.uniform else {
                continue;
            };
            for param in instance.module.value_parameters() {
                let ParameterKind::Value { offset, size } = param.kind else {
                    unreachable!();
                };
                let Some(value) = material.parameter(&param.name) else {
                    continue;
                };
                let Some(bytes) = value.to_bytes() else {
                    log::warn!(
                        "material '{}': bindable value assigned to uniform parameter '{}'",
                        material.name(),
                        param.name
                    );
                    continue;
                };
                debug_assert!(
                    (offset + size) as u64 <= slice.length,
                    "uniform write past slice for parameter '{}'",
                    param.name
                );
                let len = bytes.len().min(size as usize);
                for frame in 0..slice.frame_count {
                    uniform_arena.set_data(
                        slice.allocation,
                        frame as u64 * slice.frame_size + offset as u64,
                        &bytes[..len],
                    );
                }
            }
            uniform_arena.sync(slice.allocation);
        }
        true
    }
}
