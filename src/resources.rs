//! The scene resource context.
//!
//! One explicitly constructed object owns the arenas, registries, caches,
//! and allocators the rest of the crate operates on. It is threaded by
//! reference through all calls; there is no process-wide state.

use std::sync::Arc;

use glam::Mat4;

use crate::backend::RenderDevice;
use crate::batch::PassContext;
use crate::error::RenderError;
use crate::materials::{
    Material, MaterialBinder, MaterialId, MaterialRegistry, ModuleInstance, ParameterValue,
    TextureStore,
};
use crate::memory::DeviceMemoryArena;
use crate::mesh::{GpuMesh, MeshData, VertexFormatRegistry};
use crate::pipeline::{PipelineCache, RenderPassId};
use crate::shader::{ModuleLibrary, ShaderCompiler, ShaderModuleBuilder};
use crate::shadow::ShadowSlotAllocator;
use crate::types::BufferUsage;

/// Module holding per-drawable transform data.
pub const TRANSFORM_MODULE: &str = "TransformUniform";
/// Value parameter of [`TRANSFORM_MODULE`] holding the world matrix.
pub const TRANSFORM_WORLD: &str = "WorldTransform";

/// Capacities and frame configuration for a [`SceneResources`].
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Vertex arena capacity in bytes.
    pub vertex_capacity: u64,
    /// Index arena capacity in bytes.
    pub index_capacity: u64,
    /// Uniform arena capacity in bytes.
    pub uniform_capacity: u64,
    /// Shadow atlas slot count.
    pub shadow_slots: u32,
    /// Frame-in-flight copy count for mutable GPU state.
    pub frames_in_flight: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 64 * 1024 * 1024,
            index_capacity: 16 * 1024 * 1024,
            uniform_capacity: 8 * 1024 * 1024,
            shadow_slots: 64,
            frames_in_flight: 3,
        }
    }
}

/// Everything a scene needs to upload resources and record draws.
pub struct SceneResources {
    device: Arc<RenderDevice>,
    /// Arena holding all mesh vertex data.
    pub vertex_arena: DeviceMemoryArena,
    /// Arena holding all mesh index data.
    pub index_arena: DeviceMemoryArena,
    /// Arena holding all module uniform slices.
    pub uniform_arena: DeviceMemoryArena,
    /// Registered vertex formats.
    pub formats: VertexFormatRegistry,
    /// Registered materials.
    pub materials: MaterialRegistry,
    /// Named textures and the fallback.
    pub textures: TextureStore,
    /// Shader module definitions.
    pub library: ModuleLibrary,
    /// Shared pipeline cache.
    pub pipelines: PipelineCache,
    /// Shadow atlas reservations.
    pub shadows: ShadowSlotAllocator,
    binder: MaterialBinder,
    frames_in_flight: u32,
    current_frame: u32,
}

impl SceneResources {
    /// Create the context over `device` with `config` capacities.
    pub fn new(device: Arc<RenderDevice>, config: SceneConfig) -> Result<Self, RenderError> {
        let vertex_arena = DeviceMemoryArena::new(
            device.clone(),
            "vertex",
            config.vertex_capacity,
            4,
            BufferUsage::VERTEX,
        )?;
        let index_arena = DeviceMemoryArena::new(
            device.clone(),
            "index",
            config.index_capacity,
            4,
            BufferUsage::INDEX,
        )?;
        let uniform_arena = DeviceMemoryArena::new(
            device.clone(),
            "uniform",
            config.uniform_capacity,
            device.uniform_alignment(),
            BufferUsage::UNIFORM,
        )?;
        let binder = MaterialBinder::new(device.clone(), config.frames_in_flight)?;
        let mut library = ModuleLibrary::new();
        library.define(
            ShaderModuleBuilder::new(TRANSFORM_MODULE)
                .value(TRANSFORM_WORLD, 64)
                .build(),
        );
        Ok(Self {
            textures: TextureStore::new(device.clone()),
            pipelines: PipelineCache::new(device.clone()),
            device,
            vertex_arena,
            index_arena,
            uniform_arena,
            formats: VertexFormatRegistry::new(),
            materials: MaterialRegistry::new(),
            library,
            shadows: ShadowSlotAllocator::new(config.shadow_slots),
            binder,
            frames_in_flight: config.frames_in_flight,
            current_frame: 0,
        })
    }

    /// The device everything was created on.
    pub fn device(&self) -> &Arc<RenderDevice> {
        &self.device
    }

    /// Frame-in-flight copy count.
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// The frame copy selected by the last [`begin_frame`](Self::begin_frame).
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Start frame `frame_index`.
    ///
    /// Selects the frame copy for uniform writes and descriptor sets and
    /// clears the shadow atlas; slots are re-reserved for the frame's active
    /// lights.
    pub fn begin_frame(&mut self, frame_index: u64) {
        self.current_frame = (frame_index % self.frames_in_flight as u64) as u32;
        self.shadows.reset();
    }

    /// Upload `mesh` into the vertex and index arenas.
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuMesh, RenderError> {
        let format = self.formats.register(mesh.format());
        let vertex_bytes = mesh.vertex_bytes();
        let vertex_allocation = self.vertex_arena.alloc(vertex_bytes.len() as u64)?;
        self.vertex_arena.set_data(vertex_allocation, 0, vertex_bytes);
        self.vertex_arena.sync(vertex_allocation);

        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let index_allocation = match self.index_arena.alloc(index_bytes.len() as u64) {
            Ok(allocation) => allocation,
            Err(err) => {
                self.vertex_arena.free(vertex_allocation);
                return Err(err);
            }
        };
        self.index_arena.set_data(index_allocation, 0, index_bytes);
        self.index_arena.sync(index_allocation);

        Ok(GpuMesh {
            vertex_allocation,
            index_allocation,
            vertex_count: mesh.vertex_count(),
            index_count: mesh.indices.len() as u32,
            format,
        })
    }

    /// Return `mesh`'s arena ranges.
    pub fn release_mesh(&mut self, mesh: GpuMesh) {
        self.vertex_arena.free(mesh.vertex_allocation);
        self.index_arena.free(mesh.index_allocation);
    }

    /// Create and bind a material, returning its id.
    pub fn register_material(
        &mut self,
        name: impl Into<String>,
        shader_name: impl Into<String>,
        parameters: impl IntoIterator<Item = (String, ParameterValue)>,
    ) -> Result<MaterialId, RenderError> {
        let id = self.materials.create(name, shader_name);
        let material = self.materials.get_mut(id).expect("just created");
        for (name, value) in parameters {
            material.set_parameter(name, value);
        }
        self.binder.register_material(
            material,
            &self.library,
            &mut self.uniform_arena,
            &mut self.textures,
        )?;
        Ok(id)
    }

    /// Assign a parameter on a registered material.
    pub fn set_material_parameter(
        &mut self,
        id: MaterialId,
        name: impl Into<String>,
        value: ParameterValue,
    ) -> Result<(), RenderError> {
        let material = self
            .materials
            .get_mut(id)
            .ok_or_else(|| RenderError::InvalidParameter(format!("unknown material {id:?}")))?;
        material.set_parameter(name, value);
        Ok(())
    }

    /// Upload dirty material parameters into every frame-in-flight copy.
    ///
    /// Pipelines cached for updated materials are invalidated; drawables
    /// revalidate on their next pipeline resolution.
    pub fn flush_materials(&mut self) {
        let mut updated = Vec::new();
        for material in self.materials.iter_mut() {
            if self
                .binder
                .update_material_uniforms(material, &mut self.uniform_arena)
            {
                updated.push(material.id());
            }
        }
        for id in updated {
            self.pipelines.invalidate_material(id);
        }
    }

    /// Bind a fresh transform module instance.
    pub fn create_transform_module(&mut self) -> Result<ModuleInstance, RenderError> {
        let module = self
            .library
            .find_module(TRANSFORM_MODULE)
            .expect("transform module defined at construction");
        // The transform module resolves no material parameters.
        let blank = Material::new(MaterialId(u32::MAX), "transform", "");
        self.binder
            .bind_module(&blank, &module, &mut self.uniform_arena, &mut self.textures)
    }

    /// Write `world` into `transform`'s copy for the current frame.
    pub fn set_transform(&mut self, transform: &ModuleInstance, world: Mat4) {
        let Some(slice) = transform.uniform else {
            return;
        };
        let frame_base = self.current_frame as u64 * slice.frame_size;
        self.uniform_arena.set_data(
            slice.allocation,
            frame_base,
            bytemuck::cast_slice(&world.to_cols_array()),
        );
        self.uniform_arena.sync(crate::memory::ArenaAllocation {
            offset: slice.allocation.offset + frame_base,
            size: slice.frame_size,
        });
    }

    /// Release a transform module's uniform slice.
    pub fn release_transform_module(&mut self, transform: ModuleInstance) {
        if let Some(slice) = transform.uniform {
            self.uniform_arena.free(slice.allocation);
        }
    }

    /// Borrow the context as a [`PassContext`] for `pass`.
    pub fn pass_context(&mut self, pass: RenderPassId) -> PassContext<'_> {
        let Self {
            materials,
            pipelines,
            formats,
            library,
            vertex_arena,
            index_arena,
            current_frame,
            ..
        } = self;
        PassContext {
            pass,
            frame: *current_frame,
            materials,
            pipelines,
            registry: formats,
            compiler: library,
            vertex_buffer: vertex_arena.buffer().clone(),
            index_buffer: index_arena.buffer().clone(),
            pass_set: None,
        }
    }
}
