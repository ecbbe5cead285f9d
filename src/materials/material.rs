//! Material resources and parameter values.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::materials::ModuleInstance;

/// Numeric identity of a registered material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// A value assigned to a named shader parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Scalar float.
    Float(f32),
    /// Unsigned integer.
    Uint(u32),
    /// Two-component vector.
    Vec2(Vec2),
    /// Three-component vector.
    Vec3(Vec3),
    /// Four-component vector.
    Vec4(Vec4),
    /// 4x4 matrix.
    Mat4(Mat4),
    /// Name of a texture in the texture store.
    Texture(String),
}

impl ParameterValue {
    /// Packed bytes for uniform upload, `None` for bindable values.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Float(v) => Some(v.to_le_bytes().to_vec()),
            Self::Uint(v) => Some(v.to_le_bytes().to_vec()),
            Self::Vec2(v) => Some(bytemuck::cast_slice(&v.to_array()).to_vec()),
            Self::Vec3(v) => Some(bytemuck::cast_slice(&v.to_array()).to_vec()),
            Self::Vec4(v) => Some(bytemuck::cast_slice(&v.to_array()).to_vec()),
            Self::Mat4(v) => Some(bytemuck::cast_slice(&v.to_cols_array()).to_vec()),
            Self::Texture(_) => None,
        }
    }

    /// Texture name, if this is a texture reference.
    pub fn texture_name(&self) -> Option<&str> {
        match self {
            Self::Texture(name) => Some(name),
            _ => None,
        }
    }
}

/// A material: a shader reference plus a named parameter table.
///
/// The GPU-facing state (module instances, resolved variable lists, derived
/// render flags) is populated by the binder at registration and refreshed by
/// the uniform-update path when parameters change.
#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    name: String,
    shader_name: String,
    parameters: BTreeMap<String, ParameterValue>,
    parameter_dirty: bool,
    /// Pattern module instance, set by the binder.
    pub pattern: Option<ModuleInstance>,
    /// Geometry module instance, set by the binder.
    pub geometry: Option<ModuleInstance>,
    /// Value-parameter names the pattern module resolved, declaration order.
    pub pattern_variables: Vec<String>,
    /// Value-parameter names the geometry module resolved, declaration order.
    pub geometry_variables: Vec<String>,
    /// Whether alpha blending is required, derived from module attributes.
    pub is_transparent: bool,
    /// Whether back-face culling is disabled, derived from module attributes.
    pub is_double_sided: bool,
}

impl Material {
    /// Create an unbound material using shader `shader_name`.
    pub fn new(id: MaterialId, name: impl Into<String>, shader_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            shader_name: shader_name.into(),
            parameters: BTreeMap::new(),
            parameter_dirty: true,
            pattern: None,
            geometry: None,
            pattern_variables: Vec::new(),
            geometry_variables: Vec::new(),
            is_transparent: false,
            is_double_sided: false,
        }
    }

    /// Numeric material id.
    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// Material name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader name the pattern/geometry modules are derived from.
    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    /// Assign a parameter value and mark the material dirty.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.parameters.insert(name.into(), value);
        self.parameter_dirty = true;
    }

    /// Look up a parameter value.
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    /// Whether parameter values changed since the last uniform upload.
    pub fn parameter_dirty(&self) -> bool {
        self.parameter_dirty
    }

    /// Clear the dirty flag. Called by the uniform-update path.
    pub fn clear_parameter_dirty(&mut self) {
        self.parameter_dirty = false;
    }
}

/// Owns all registered materials, addressed by [`MaterialId`].
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
}

impl MaterialRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a material, returning its id.
    pub fn create(&mut self, name: impl Into<String>, shader_name: impl Into<String>) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(Material::new(id, name, shader_name));
        id
    }

    /// Look up a material.
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Look up a material mutably.
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    /// Iterate all materials mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    /// Number of registered materials.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether no material has been registered.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
