//! Draw submission: drawable records, state-diffed batching, chunk splitting.
//!
//! The batcher walks a drawable sequence and records one command buffer
//! chunk at a time, issuing a bind only when the next draw's state differs
//! from what is currently bound. Chunks are capped at a configurable draw
//! count; some drivers degrade past 128 draws per buffer, so that is the
//! default. Every chunk re-establishes its full binding state because chunks
//! are independently submittable.

use std::sync::Arc;

use crate::backend::{Buffer, BufferId, CommandBuffer, DescriptorSet, Pipeline, PipelineId};
use crate::error::RenderError;
use crate::materials::{MaterialId, MaterialRegistry, ModuleInstance};
use crate::mesh::{ElementRange, GpuMesh, VertexFormatRegistry};
use crate::pipeline::{PipelineCache, PipelineKey, RenderPassId, MAX_RENDER_PASSES};
use crate::shader::ShaderCompiler;
use crate::types::Viewport;

/// Descriptor-set binding slot for pass-global resources.
pub const SLOT_PASS: u32 = 0;
/// Descriptor-set binding slot for the material's geometry module.
pub const SLOT_GEOMETRY: u32 = 1;
/// Descriptor-set binding slot for the material's pattern module.
pub const SLOT_PATTERN: u32 = 2;
/// Descriptor-set binding slot for the drawable's transform module.
pub const SLOT_TRANSFORM: u32 = 3;

#[derive(Debug, Clone)]
struct CachedPipeline {
    version: u64,
    pipeline: Arc<Pipeline>,
}

/// One mesh-range + material + transform combination, drawable in one call.
#[derive(Debug, Clone)]
pub struct DrawableRecord {
    /// The uploaded mesh.
    pub mesh: GpuMesh,
    /// Material the drawable renders with.
    pub material: MaterialId,
    /// Index range of the mesh to draw.
    pub range: ElementRange,
    /// Bound transform module (model/skinning matrices).
    pub transform: ModuleInstance,
    pipelines: [Option<CachedPipeline>; MAX_RENDER_PASSES],
}

impl DrawableRecord {
    /// Create a drawable covering `range` of `mesh`.
    pub fn new(
        mesh: GpuMesh,
        material: MaterialId,
        range: ElementRange,
        transform: ModuleInstance,
    ) -> Self {
        Self {
            mesh,
            material,
            range,
            transform,
            pipelines: Default::default(),
        }
    }

    /// Resolve the drawable's pipeline for `pass`.
    ///
    /// The per-drawable slot short-circuits the shared cache while its
    /// version stamp matches the cache's stamp for the material; a stale
    /// stamp falls through to the shared cache, which rebuilds on miss.
    pub fn resolve_pipeline(
        &mut self,
        pass: RenderPassId,
        pipelines: &mut PipelineCache,
        materials: &MaterialRegistry,
        registry: &VertexFormatRegistry,
        compiler: &dyn ShaderCompiler,
    ) -> Result<Arc<Pipeline>, RenderError> {
        if pass >= MAX_RENDER_PASSES {
            return Err(RenderError::InvalidParameter(format!(
                "render pass {pass} out of range"
            )));
        }
        let version = pipelines.material_version(self.material);
        if let Some(cached) = &self.pipelines[pass] {
            if cached.version == version {
                return Ok(cached.pipeline.clone());
            }
        }
        let material = materials
            .get(self.material)
            .ok_or(RenderError::NoPipeline {
                material: self.material.0,
                pass,
            })?;
        let pipeline = pipelines.get_or_build(
            PipelineKey {
                pass,
                format: self.mesh.format,
                material: self.material,
            },
            material,
            registry,
            compiler,
        )?;
        self.pipelines[pass] = Some(CachedPipeline {
            version,
            pipeline: pipeline.clone(),
        });
        Ok(pipeline)
    }

    /// The pipeline cached for `pass`, ignoring staleness.
    fn cached_pipeline_id(&self, pass: RenderPassId) -> Option<PipelineId> {
        self.pipelines[pass].as_ref().map(|c| c.pipeline.id())
    }
}

/// Everything one pass submission needs besides the drawables.
pub struct PassContext<'a> {
    /// Render pass being recorded.
    pub pass: RenderPassId,
    /// Current frame-in-flight index.
    pub frame: u32,
    /// Material storage.
    pub materials: &'a MaterialRegistry,
    /// Shared pipeline cache.
    pub pipelines: &'a mut PipelineCache,
    /// Vertex format registry.
    pub registry: &'a VertexFormatRegistry,
    /// Shader compiler for pipeline rebuilds.
    pub compiler: &'a dyn ShaderCompiler,
    /// Buffer backing the shared vertex arena.
    pub vertex_buffer: Arc<Buffer>,
    /// Buffer backing the shared index arena.
    pub index_buffer: Arc<Buffer>,
    /// Pass-global descriptor set, bound at [`SLOT_PASS`] when present.
    pub pass_set: Option<Arc<DescriptorSet>>,
}

/// Batcher configuration.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Draw calls per command buffer before splitting.
    pub max_draws_per_buffer: u32,
    /// Viewport set at the start of every chunk.
    pub viewport: Viewport,
    /// Whether the first chunk clears the pass attachments.
    pub clear_attachments: bool,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_draws_per_buffer: 128,
            viewport: Viewport::new(1280, 720),
            clear_attachments: true,
        }
    }
}

/// Statistics of one pass submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Draw calls recorded.
    pub draw_calls: u32,
    /// `BindPipeline` commands issued, including the initial bind per chunk.
    pub pipeline_binds: u32,
    /// Material switches, counting the initial material per chunk.
    pub material_binds: u32,
    /// Command buffer chunks produced.
    pub buffers: u32,
}

#[derive(Default)]
struct BoundState {
    pipeline: Option<PipelineId>,
    material: Option<MaterialId>,
    transform: Option<u32>,
    vertex: Option<(BufferId, u64)>,
    index: Option<(BufferId, u64)>,
    pass_set: bool,
}

/// Records draw sequences into command buffer chunks.
#[derive(Debug, Clone, Default)]
pub struct DrawBatcher {
    config: BatcherConfig,
}

impl DrawBatcher {
    /// Create a batcher with `config`.
    pub fn new(config: BatcherConfig) -> Self {
        Self { config }
    }

    /// Sort key grouping drawables by pipeline first, material second.
    pub fn sort_key(pipeline: PipelineId, material: MaterialId) -> u64 {
        debug_assert!(material.0 < 1 << 18);
        (pipeline.0 as u64) << 18 | material.0 as u64
    }

    /// Descending-depth key for a back-to-front transparent pass.
    ///
    /// Keys of non-negative depths sort larger depth first when used
    /// ascending.
    pub fn depth_sort_key(view_depth: f32) -> u32 {
        debug_assert!(view_depth >= 0.0);
        u32::MAX - view_depth.to_bits()
    }

    /// Move transparent drawables out of `drawables`, returning them.
    ///
    /// The opaque remainder keeps its relative order and stays eligible for
    /// [`submit_sorted`](Self::submit_sorted); the returned transparent set
    /// belongs in a separate back-to-front pass.
    pub fn partition_transparent(
        materials: &MaterialRegistry,
        drawables: &mut Vec<DrawableRecord>,
    ) -> Vec<DrawableRecord> {
        let mut transparent = Vec::new();
        let mut i = 0;
        while i < drawables.len() {
            let is_transparent = materials
                .get(drawables[i].material)
                .is_some_and(|m| m.is_transparent);
            if is_transparent {
                transparent.push(drawables.remove(i));
            } else {
                i += 1;
            }
        }
        transparent
    }

    fn open_chunk(&self, index: u32, cmd: &mut Vec<CommandBuffer>) {
        let mut chunk = CommandBuffer::new(format!("pass_chunk_{index}"));
        chunk.set_viewport(self.config.viewport);
        if index == 0 && self.config.clear_attachments {
            chunk.clear_attachments();
        }
        cmd.push(chunk);
    }

    /// Record `drawables` in the given order.
    ///
    /// Binds are issued only when the required state differs from the bound
    /// state; the bound state resets at every chunk boundary.
    pub fn submit_ordered(
        &self,
        ctx: &mut PassContext<'_>,
        drawables: &mut [DrawableRecord],
    ) -> Result<(Vec<CommandBuffer>, PassStats), RenderError> {
        let mut buffers = Vec::new();
        let mut stats = PassStats::default();
        let mut bound = BoundState::default();
        self.open_chunk(0, &mut buffers);
        stats.buffers = 1;

        for drawable in drawables.iter_mut() {
            if buffers
                .last()
                .is_some_and(|c| c.draw_count() >= self.config.max_draws_per_buffer)
            {
                self.open_chunk(stats.buffers, &mut buffers);
                stats.buffers += 1;
                bound = BoundState::default();
            }
            let chunk = buffers.last_mut().expect("chunk opened above");

            let pipeline = drawable.resolve_pipeline(
                ctx.pass,
                ctx.pipelines,
                ctx.materials,
                ctx.registry,
                ctx.compiler,
            )?;
            if bound.pipeline != Some(pipeline.id()) {
                chunk.bind_pipeline(pipeline.id());
                bound.pipeline = Some(pipeline.id());
                stats.pipeline_binds += 1;
            }

            if let Some(pass_set) = &ctx.pass_set {
                if !bound.pass_set {
                    chunk.bind_descriptor_set(SLOT_PASS, pass_set.id());
                    bound.pass_set = true;
                }
            }

            if bound.material != Some(drawable.material) {
                let material =
                    ctx.materials
                        .get(drawable.material)
                        .ok_or(RenderError::NoPipeline {
                            material: drawable.material.0,
                            pass: ctx.pass,
                        })?;
                let (Some(geometry), Some(pattern)) = (&material.geometry, &material.pattern)
                else {
                    return Err(RenderError::NoPipeline {
                        material: drawable.material.0,
                        pass: ctx.pass,
                    });
                };
                chunk.bind_descriptor_set(SLOT_GEOMETRY, geometry.descriptor_set(ctx.frame).id());
                chunk.bind_descriptor_set(SLOT_PATTERN, pattern.descriptor_set(ctx.frame).id());
                bound.material = Some(drawable.material);
                stats.material_binds += 1;
            }

            let transform_set = drawable.transform.descriptor_set(ctx.frame).id();
            if bound.transform != Some(transform_set.0) {
                chunk.bind_descriptor_set(SLOT_TRANSFORM, transform_set);
                bound.transform = Some(transform_set.0);
            }

            let vertex = (ctx.vertex_buffer.id(), drawable.mesh.vertex_allocation.offset);
            if bound.vertex != Some(vertex) {
                chunk.bind_vertex_buffer(vertex.0, vertex.1);
                bound.vertex = Some(vertex);
            }
            let index = (ctx.index_buffer.id(), drawable.mesh.index_allocation.offset);
            if bound.index != Some(index) {
                chunk.bind_index_buffer(index.0, index.1);
                bound.index = Some(index);
            }

            chunk.draw_indexed(drawable.range.start_index, drawable.range.count);
            stats.draw_calls += 1;
        }

        log::trace!(
            "pass {} recorded: {} draws, {} pipeline binds, {} chunks",
            ctx.pass,
            stats.draw_calls,
            stats.pipeline_binds,
            stats.buffers
        );
        Ok((buffers, stats))
    }

    /// Sort `drawables` by pipeline then material, then record them.
    ///
    /// Transparent drawables must be partitioned out first; their ordering is
    /// a back-to-front policy this key would destroy.
    pub fn submit_sorted(
        &self,
        ctx: &mut PassContext<'_>,
        drawables: &mut [DrawableRecord],
    ) -> Result<(Vec<CommandBuffer>, PassStats), RenderError> {
        for drawable in drawables.iter_mut() {
            drawable.resolve_pipeline(
                ctx.pass,
                ctx.pipelines,
                ctx.materials,
                ctx.registry,
                ctx.compiler,
            )?;
        }
        let pass = ctx.pass;
        drawables.sort_unstable_by_key(|d| {
            let pipeline = d
                .cached_pipeline_id(pass)
                .expect("pipeline resolved above");
            Self::sort_key(pipeline, d.material)
        });
        self.submit_ordered(ctx, drawables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, RenderDevice};
    use crate::materials::{MaterialBinder, TextureStore};
    use crate::memory::{ArenaAllocation, DeviceMemoryArena};
    use crate::mesh::{FormatId, VertexFormat};
    use crate::shader::{ModuleLibrary, ShaderModuleBuilder, ATTR_TRANSPARENT};
    use crate::types::BufferUsage;

    struct TestScene {
        materials: MaterialRegistry,
        pipelines: PipelineCache,
        registry: VertexFormatRegistry,
        library: ModuleLibrary,
        vertex_buffer: Arc<Buffer>,
        index_buffer: Arc<Buffer>,
        format: FormatId,
        transform: ModuleInstance,
    }

    impl TestScene {
        fn context(&mut self) -> PassContext<'_> {
            PassContext {
                pass: 0,
                frame: 0,
                materials: &self.materials,
                pipelines: &mut self.pipelines,
                registry: &self.registry,
                compiler: &self.library,
                vertex_buffer: self.vertex_buffer.clone(),
                index_buffer: self.index_buffer.clone(),
                pass_set: None,
            }
        }

        fn drawable(&self, material: MaterialId, mesh_offset: u64) -> DrawableRecord {
            DrawableRecord::new(
                GpuMesh {
                    vertex_allocation: ArenaAllocation {
                        offset: mesh_offset,
                        size: 256,
                    },
                    index_allocation: ArenaAllocation {
                        offset: mesh_offset,
                        size: 256,
                    },
                    vertex_count: 3,
                    index_count: 3,
                    format: self.format,
                },
                material,
                ElementRange {
                    start_index: 0,
                    count: 3,
                },
                self.transform.clone(),
            )
        }
    }

    fn create_test_scene(material_shaders: &[&str]) -> TestScene {
        let device = RenderDevice::new();
        let mut uniform_arena = DeviceMemoryArena::new(
            device.clone(),
            "uniform",
            256 * 1024,
            device.uniform_alignment(),
            BufferUsage::UNIFORM,
        )
        .unwrap();
        let mut textures = TextureStore::new(device.clone());
        let mut library = ModuleLibrary::new();
        library.define(ShaderModuleBuilder::new("OtherPattern").value("Tint", 16).build());
        library.define(ShaderModuleBuilder::new("OtherGeometry").build());
        library.define(
            ShaderModuleBuilder::new("GlassPattern")
                .attribute(ATTR_TRANSPARENT)
                .build(),
        );
        library.define(ShaderModuleBuilder::new("GlassGeometry").build());
        let binder = MaterialBinder::new(device.clone(), 1).unwrap();

        let mut materials = MaterialRegistry::new();
        for (i, shader) in material_shaders.iter().enumerate() {
            let id = materials.create(format!("m{i}"), *shader);
            binder
                .register_material(
                    materials.get_mut(id).unwrap(),
                    &library,
                    &mut uniform_arena,
                    &mut textures,
                )
                .unwrap();
        }

        let mut registry = VertexFormatRegistry::new();
        let format = registry.register(VertexFormat::new(1, 0, false, false));
        let vertex_buffer = device
            .create_buffer(crate::types::BufferDescriptor::new(
                64 * 1024,
                BufferUsage::VERTEX,
            ))
            .unwrap();
        let index_buffer = device
            .create_buffer(crate::types::BufferDescriptor::new(
                64 * 1024,
                BufferUsage::INDEX,
            ))
            .unwrap();
        let transform_set = device.create_descriptor_set("transform", Vec::new()).unwrap();
        let transform = ModuleInstance {
            module: Arc::new(ShaderModuleBuilder::new("Transform").build()),
            uniform: None,
            descriptor_sets: vec![transform_set],
        };
        TestScene {
            pipelines: PipelineCache::new(device),
            materials,
            registry,
            library,
            vertex_buffer,
            index_buffer,
            format,
            transform,
        }
    }

    #[test]
    fn test_fixed_order_rebinds_only_on_transitions() {
        // Materials: A, A, B where A and B link distinct pipelines.
        let mut scene = create_test_scene(&["Default", "Other"]);
        let a = MaterialId(0);
        let b = MaterialId(1);
        let mut drawables = vec![
            scene.drawable(a, 0),
            scene.drawable(a, 0),
            scene.drawable(b, 0),
        ];
        let batcher = DrawBatcher::new(BatcherConfig::default());
        let mut ctx = scene.context();
        let (buffers, stats) = batcher.submit_ordered(&mut ctx, &mut drawables).unwrap();

        assert_eq!(buffers.len(), 1);
        assert_eq!(stats.draw_calls, 3);
        // Initial bind plus exactly one rebind at the A -> B transition.
        assert_eq!(stats.pipeline_binds, 2);
        assert_eq!(stats.material_binds, 2);
        let chunk = &buffers[0];
        assert_eq!(
            chunk.count_matching(|c| matches!(c, Command::BindPipeline(_))),
            2
        );
        assert_eq!(
            chunk.count_matching(
                |c| matches!(c, Command::BindDescriptorSet { slot, .. } if *slot == SLOT_PATTERN)
            ),
            2
        );
    }

    #[test]
    fn test_chunk_splitting_at_draw_limit() {
        let mut scene = create_test_scene(&["Default"]);
        let mut drawables: Vec<_> = (0..300).map(|_| scene.drawable(MaterialId(0), 0)).collect();
        let batcher = DrawBatcher::new(BatcherConfig {
            max_draws_per_buffer: 128,
            ..Default::default()
        });
        let mut ctx = scene.context();
        let (buffers, stats) = batcher.submit_ordered(&mut ctx, &mut drawables).unwrap();

        assert_eq!(stats.buffers, 3);
        let counts: Vec<u32> = buffers.iter().map(|b| b.draw_count()).collect();
        assert_eq!(counts, vec![128, 128, 44]);
        // Each chunk is independently fully bound at its start.
        for chunk in &buffers {
            assert_eq!(
                chunk.count_matching(|c| matches!(c, Command::BindPipeline(_))),
                1
            );
            assert_eq!(
                chunk.count_matching(|c| matches!(c, Command::SetViewport(_))),
                1
            );
            assert_eq!(
                chunk.count_matching(|c| matches!(c, Command::BindVertexBuffer { .. })),
                1
            );
        }
        // Only the first chunk clears.
        assert_eq!(
            buffers[0].count_matching(|c| matches!(c, Command::ClearAttachments)),
            1
        );
        assert_eq!(
            buffers[1].count_matching(|c| matches!(c, Command::ClearAttachments)),
            0
        );
    }

    #[test]
    fn test_sorted_mode_groups_interleaved_materials() {
        let mut scene = create_test_scene(&["Default", "Other"]);
        let a = MaterialId(0);
        let b = MaterialId(1);
        // Worst-case interleaving: A B A B A B.
        let mut drawables: Vec<_> = (0..6)
            .map(|i| scene.drawable(if i % 2 == 0 { a } else { b }, 0))
            .collect();
        let batcher = DrawBatcher::new(BatcherConfig::default());
        let mut ctx = scene.context();
        let (_, stats) = batcher.submit_sorted(&mut ctx, &mut drawables).unwrap();

        assert_eq!(stats.draw_calls, 6);
        // Sorting collapses the interleaving to one transition.
        assert_eq!(stats.pipeline_binds, 2);
        assert_eq!(stats.material_binds, 2);
    }

    #[test]
    fn test_partition_transparent() {
        let mut scene = create_test_scene(&["Default", "Glass"]);
        let mut drawables = vec![
            scene.drawable(MaterialId(0), 0),
            scene.drawable(MaterialId(1), 0),
            scene.drawable(MaterialId(0), 0),
        ];
        let transparent = DrawBatcher::partition_transparent(&scene.materials, &mut drawables);
        assert_eq!(drawables.len(), 2);
        assert_eq!(transparent.len(), 1);
        assert_eq!(transparent[0].material, MaterialId(1));
    }

    #[test]
    fn test_sort_key_groups_by_pipeline_first() {
        let low = DrawBatcher::sort_key(PipelineId(1), MaterialId(200));
        let high = DrawBatcher::sort_key(PipelineId(2), MaterialId(0));
        assert!(low < high);
    }

    #[test]
    fn test_depth_sort_key_orders_back_to_front() {
        let near = DrawBatcher::depth_sort_key(1.0);
        let far = DrawBatcher::depth_sort_key(100.0);
        assert!(far < near);
    }

    #[test]
    fn test_pass_out_of_range_is_an_error_not_a_panic() {
        let mut scene = create_test_scene(&["Default"]);
        let mut drawable = scene.drawable(MaterialId(0), 0);
        let err = drawable
            .resolve_pipeline(
                MAX_RENDER_PASSES,
                &mut scene.pipelines,
                &scene.materials,
                &scene.registry,
                &scene.library,
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidParameter(_)));
    }

    #[test]
    fn test_stale_drawable_cache_revalidates_after_invalidation() {
        let mut scene = create_test_scene(&["Default"]);
        let mut drawable = scene.drawable(MaterialId(0), 0);
        let first = drawable
            .resolve_pipeline(
                0,
                &mut scene.pipelines,
                &scene.materials,
                &scene.registry,
                &scene.library,
            )
            .unwrap();
        scene.pipelines.invalidate_material(MaterialId(0));
        let second = drawable
            .resolve_pipeline(
                0,
                &mut scene.pipelines,
                &scene.materials,
                &scene.registry,
                &scene.library,
            )
            .unwrap();
        assert_ne!(first.id(), second.id());
        // Stable afterwards.
        let third = drawable
            .resolve_pipeline(
                0,
                &mut scene.pipelines,
                &scene.materials,
                &scene.registry,
                &scene.library,
            )
            .unwrap();
        assert_eq!(second.id(), third.id());
    }
}
