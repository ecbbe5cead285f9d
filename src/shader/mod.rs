//! Shader-module compiler contract.
//!
//! Materials reference shader modules by name; a module declares the
//! parameters it consumes and the attributes that steer pipeline state.
//! The real shading-language compiler lives outside this crate behind
//! [`ShaderCompiler`]; [`ModuleLibrary`] is a table-driven implementation
//! that carries the same metadata, used by the default material path and
//! by tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RenderError;
use crate::mesh::VertexLayout;

/// Pattern module substituted when a material's own pattern fails to resolve.
pub const DEFAULT_PATTERN: &str = "DefaultPattern";
/// Geometry module substituted when a material's geometry fails to resolve.
pub const DEFAULT_GEOMETRY: &str = "DefaultGeometry";

/// Module attribute marking a transparent material.
pub const ATTR_TRANSPARENT: &str = "Transparent";
/// Module attribute disabling back-face culling.
pub const ATTR_DOUBLE_SIDED: &str = "DoubleSided";

/// Kind of resource a bindable parameter consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindableType {
    /// A sampled texture.
    Texture,
    /// A sampler.
    Sampler,
    /// A storage buffer.
    StorageBuffer,
}

/// How a shader parameter receives its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Plain value packed into the module's uniform block.
    Value {
        /// Byte offset within the uniform block.
        offset: u32,
        /// Byte size of the value.
        size: u32,
    },
    /// Resource bound through a descriptor set entry.
    Bindable(BindableType),
}

/// One parameter a shader module declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderParameter {
    /// Parameter name as it appears in the shader.
    pub name: String,
    /// Where the parameter's data comes from.
    pub kind: ParameterKind,
}

/// Metadata of one compiled shader module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderModule {
    name: String,
    parameters: Vec<ShaderParameter>,
    attributes: Vec<String>,
    uniform_size: u32,
}

impl ShaderModule {
    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All parameters in declaration order.
    pub fn parameters(&self) -> &[ShaderParameter] {
        &self.parameters
    }

    /// Value parameters in declaration order.
    pub fn value_parameters(&self) -> impl Iterator<Item = &ShaderParameter> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.kind, ParameterKind::Value { .. }))
    }

    /// Bindable parameters in declaration order.
    pub fn bindable_parameters(&self) -> impl Iterator<Item = &ShaderParameter> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.kind, ParameterKind::Bindable(_)))
    }

    /// Byte size of the module's uniform block, 0 if it has no value params.
    pub fn uniform_size(&self) -> u32 {
        self.uniform_size
    }

    /// Whether the module carries `attribute`.
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Builder for defining a [`ShaderModule`] in a [`ModuleLibrary`].
///
/// Value parameters receive offsets in declaration order with natural
/// vector alignment (4 for scalars, 8 for two-component, 16 above), and the
/// uniform size is rounded up to 16.
#[derive(Debug)]
pub struct ShaderModuleBuilder {
    name: String,
    parameters: Vec<ShaderParameter>,
    attributes: Vec<String>,
    uniform_cursor: u32,
}

impl ShaderModuleBuilder {
    /// Start a module named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            attributes: Vec::new(),
            uniform_cursor: 0,
        }
    }

    fn value_alignment(size: u32) -> u32 {
        match size {
            0..=4 => 4,
            5..=8 => 8,
            _ => 16,
        }
    }

    /// Declare a value parameter of `size` bytes.
    pub fn value(mut self, name: impl Into<String>, size: u32) -> Self {
        let alignment = Self::value_alignment(size);
        let offset = (self.uniform_cursor + alignment - 1) & !(alignment - 1);
        self.uniform_cursor = offset + size;
        self.parameters.push(ShaderParameter {
            name: name.into(),
            kind: ParameterKind::Value { offset, size },
        });
        self
    }

    /// Declare a bindable parameter.
    pub fn bindable(mut self, name: impl Into<String>, bindable: BindableType) -> Self {
        self.parameters.push(ShaderParameter {
            name: name.into(),
            kind: ParameterKind::Bindable(bindable),
        });
        self
    }

    /// Declare a sampled texture parameter.
    pub fn texture(self, name: impl Into<String>) -> Self {
        self.bindable(name, BindableType::Texture)
    }

    /// Attach a module attribute.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    /// Finish the module.
    pub fn build(self) -> ShaderModule {
        let uniform_size = (self.uniform_cursor + 15) & !15;
        ShaderModule {
            name: self.name,
            parameters: self.parameters,
            attributes: self.attributes,
            uniform_size,
        }
    }
}

/// Product of linking modules against a vertex layout for one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProgram {
    /// Label naming the linked combination, used for the pipeline resource.
    pub label: String,
}

/// Compiler collaborator resolving and linking shader modules.
pub trait ShaderCompiler: Send + Sync {
    /// Look up a module by name.
    fn find_module(&self, name: &str) -> Option<Arc<ShaderModule>>;

    /// Link `pattern` and `geometry` against `layout` for render pass `pass`.
    fn link(
        &self,
        pass: usize,
        layout: &VertexLayout,
        pattern: &ShaderModule,
        geometry: &ShaderModule,
    ) -> Result<LinkedProgram, RenderError>;
}

/// Table-driven [`ShaderCompiler`].
///
/// Always defines [`DEFAULT_PATTERN`] and [`DEFAULT_GEOMETRY`] so the
/// material fallback path cannot dead-end.
#[derive(Debug)]
pub struct ModuleLibrary {
    modules: HashMap<String, Arc<ShaderModule>>,
}

impl Default for ModuleLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLibrary {
    /// Create a library holding only the default modules.
    pub fn new() -> Self {
        let mut library = Self {
            modules: HashMap::new(),
        };
        library.define(
            ShaderModuleBuilder::new(DEFAULT_PATTERN)
                .value("SolidColor", 16)
                .build(),
        );
        library.define(ShaderModuleBuilder::new(DEFAULT_GEOMETRY).build());
        library
    }

    /// Add or replace a module definition.
    pub fn define(&mut self, module: ShaderModule) -> Arc<ShaderModule> {
        let module = Arc::new(module);
        self.modules
            .insert(module.name().to_string(), module.clone());
        module
    }
}

impl ShaderCompiler for ModuleLibrary {
    fn find_module(&self, name: &str) -> Option<Arc<ShaderModule>> {
        self.modules.get(name).cloned()
    }

    fn link(
        &self,
        pass: usize,
        layout: &VertexLayout,
        pattern: &ShaderModule,
        geometry: &ShaderModule,
    ) -> Result<LinkedProgram, RenderError> {
        if layout.attributes.is_empty() {
            return Err(RenderError::InvalidParameter(
                "vertex layout has no attributes".to_string(),
            ));
        }
        Ok(LinkedProgram {
            label: format!(
                "{}+{}/pass{}/stride{}",
                pattern.name(),
                geometry.name(),
                pass,
                layout.stride
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_offsets_follow_declaration_order() {
        let module = ShaderModuleBuilder::new("Test")
            .value("Roughness", 4)
            .value("Tint", 16)
            .value("Metallic", 4)
            .texture("AlbedoMap")
            .build();
        let offsets: Vec<_> = module
            .value_parameters()
            .map(|p| match p.kind {
                ParameterKind::Value { offset, size } => (p.name.as_str(), offset, size),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            offsets,
            vec![("Roughness", 0, 4), ("Tint", 16, 16), ("Metallic", 32, 4)]
        );
        assert_eq!(module.uniform_size(), 48);
        assert_eq!(module.bindable_parameters().count(), 1);
    }

    #[test]
    fn test_module_without_values_has_zero_uniform_size() {
        let module = ShaderModuleBuilder::new("Bare").texture("Map").build();
        assert_eq!(module.uniform_size(), 0);
    }

    #[test]
    fn test_attributes() {
        let module = ShaderModuleBuilder::new("Glass")
            .attribute(ATTR_TRANSPARENT)
            .build();
        assert!(module.has_attribute(ATTR_TRANSPARENT));
        assert!(!module.has_attribute(ATTR_DOUBLE_SIDED));
    }

    #[test]
    fn test_library_always_has_defaults() {
        let library = ModuleLibrary::new();
        assert!(library.find_module(DEFAULT_PATTERN).is_some());
        assert!(library.find_module(DEFAULT_GEOMETRY).is_some());
        assert!(library.find_module("NoSuchModule").is_none());
    }
}
