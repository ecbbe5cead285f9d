//! Pipeline cache keyed by render pass, vertex format, and material.
//!
//! Drawables keep a one-slot per-pass cache on their own record and fall
//! back to the shared map here. Invalidation is tracked with per-material
//! version stamps: a drawable's cached pipeline is valid only while its
//! stamp matches the cache's current stamp for the material, so invalidating
//! a material never requires walking the drawables.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{Pipeline, RenderDevice};
use crate::error::RenderError;
use crate::materials::{Material, MaterialId};
use crate::mesh::{FormatId, VertexFormatRegistry};
use crate::shader::ShaderCompiler;

/// Maximum number of render passes pipelines are cached for.
pub const MAX_RENDER_PASSES: usize = 8;

/// Index of a render pass.
pub type RenderPassId = usize;

/// Cache key: one pipeline exists per pass, vertex format, and material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// Render pass the pipeline targets.
    pub pass: RenderPassId,
    /// Registered vertex format of the geometry.
    pub format: FormatId,
    /// Material the pipeline's modules and state come from.
    pub material: MaterialId,
}

/// Shared pipeline cache.
#[derive(Debug)]
pub struct PipelineCache {
    device: Arc<RenderDevice>,
    pipelines: HashMap<PipelineKey, Arc<Pipeline>>,
    material_versions: HashMap<MaterialId, u64>,
    builds: u64,
}

impl PipelineCache {
    /// Create an empty cache.
    pub fn new(device: Arc<RenderDevice>) -> Self {
        Self {
            device,
            pipelines: HashMap::new(),
            material_versions: HashMap::new(),
            builds: 0,
        }
    }

    /// Current version stamp for `material`.
    ///
    /// Stamps start at 0 and grow monotonically on invalidation; a drawable's
    /// cached pipeline carries the stamp it was resolved under.
    pub fn material_version(&self, material: MaterialId) -> u64 {
        self.material_versions.get(&material).copied().unwrap_or(0)
    }

    /// Drop all pipelines built for `material` and bump its version stamp.
    pub fn invalidate_material(&mut self, material: MaterialId) {
        *self.material_versions.entry(material).or_insert(0) += 1;
        self.pipelines.retain(|key, _| key.material != material);
        log::trace!(
            "invalidated pipelines for material {:?}, version now {}",
            material,
            self.material_version(material)
        );
    }

    /// Number of pipelines built since creation, for tests and stats.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Resolve the pipeline for `key`, building it on a miss.
    ///
    /// `material` must be the material `key.material` refers to and must be
    /// bound; an unbound material cannot produce a pipeline.
    pub fn get_or_build(
        &mut self,
        key: PipelineKey,
        material: &Material,
        registry: &VertexFormatRegistry,
        compiler: &dyn ShaderCompiler,
    ) -> Result<Arc<Pipeline>, RenderError> {
        debug_assert_eq!(key.material, material.id());
        if key.pass >= MAX_RENDER_PASSES {
            return Err(RenderError::InvalidParameter(format!(
                "render pass {} out of range",
                key.pass
            )));
        }
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let (Some(pattern), Some(geometry)) = (&material.pattern, &material.geometry) else {
            return Err(RenderError::NoPipeline {
                material: material.id().0,
                pass: key.pass,
            });
        };
        let layout = registry.layout(key.format);
        let program = compiler.link(key.pass, layout, &pattern.module, &geometry.module)?;
        let pipeline = self.device.create_pipeline(
            program.label,
            material.is_double_sided,
            material.is_transparent,
        );
        self.builds += 1;
        log::trace!("built pipeline {:?} for {:?}", pipeline.id(), key);
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }
}
