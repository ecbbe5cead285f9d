//! End-to-end scenario: upload a mesh, bind a material with an unresolved
//! texture, and record a full pass through the batcher.

use glam::{Mat4, Vec2, Vec3};

use cinder_render::backend::{BoundResource, Command};
use cinder_render::batch::{BatcherConfig, DrawBatcher, DrawableRecord, SLOT_PATTERN};
use cinder_render::mesh::{ElementRange, MeshData, VertexFormat};
use cinder_render::resources::{SceneConfig, SceneResources};
use cinder_render::shader::ShaderModuleBuilder;
use cinder_render::{ParameterValue, RenderDevice};

fn create_scene() -> SceneResources {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut scene = SceneResources::new(
        RenderDevice::new(),
        SceneConfig {
            vertex_capacity: 4 * 1024 * 1024,
            index_capacity: 1024 * 1024,
            uniform_capacity: 1024 * 1024,
            shadow_slots: 32,
            frames_in_flight: 2,
        },
    )
    .unwrap();
    scene.library.define(
        ShaderModuleBuilder::new("TexturedPattern")
            .value("Tint", 16)
            .texture("AlbedoMap")
            .build(),
    );
    scene
        .library
        .define(ShaderModuleBuilder::new("TexturedGeometry").build());
    scene
}

fn create_quad(vertices: u32) -> MeshData {
    let mut mesh = MeshData::new(VertexFormat::new(2, 0, false, false), vertices);
    for v in 0..vertices {
        mesh.set_position(v, Vec3::new(v as f32, 0.0, 0.0));
        mesh.set_uv(v, 0, Vec2::new(0.0, 1.0));
        mesh.set_uv(v, 1, Vec2::new(1.0, 0.0));
    }
    mesh.indices = (0..vertices).collect();
    mesh
}

#[test]
fn mesh_with_unresolved_texture_still_renders() {
    let mut scene = create_scene();

    // 2 UV channels, no tangent, no skinning: 12 + 2*4 = 20 bytes per vertex.
    let mesh = create_quad(100);
    assert_eq!(mesh.format().stride(), 20);
    let gpu = scene.upload_mesh(&mesh).unwrap();
    assert_eq!(gpu.vertex_allocation.size, 2000);

    // "AlbedoMap" references a texture the store has never seen.
    let material = scene
        .register_material(
            "crate_surface",
            "Textured",
            vec![(
                "AlbedoMap".to_string(),
                ParameterValue::Texture("missing/albedo.tex".to_string()),
            )],
        )
        .unwrap();

    // The binder substituted the fallback texture instead of failing.
    let bound = scene.materials.get(material).unwrap();
    let pattern = bound.pattern.as_ref().unwrap();
    let fallback_id = scene.textures.fallback().id();
    let texture_entry = &pattern.descriptor_set(0).entry(1).unwrap().resource;
    match texture_entry {
        BoundResource::Texture(texture) => assert_eq!(texture.id(), fallback_id),
        other => panic!("binding 1 should be the albedo texture, got {other:?}"),
    }

    // And the material still yields a usable pipeline for a draw.
    scene.begin_frame(0);
    scene.flush_materials();
    let transform = scene.create_transform_module().unwrap();
    scene.set_transform(&transform, Mat4::IDENTITY);
    let mut drawables = vec![DrawableRecord::new(
        gpu,
        material,
        ElementRange {
            start_index: 0,
            count: gpu.index_count,
        },
        transform.clone(),
    )];

    let batcher = DrawBatcher::new(BatcherConfig::default());
    let mut ctx = scene.pass_context(0);
    let (buffers, stats) = batcher.submit_ordered(&mut ctx, &mut drawables).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(buffers.len(), 1);
    assert_eq!(
        buffers[0].count_matching(|c| matches!(c, Command::BindPipeline(_))),
        1
    );
    assert_eq!(
        buffers[0].count_matching(
            |c| matches!(c, Command::BindDescriptorSet { slot, .. } if *slot == SLOT_PATTERN)
        ),
        1
    );

    scene.release_transform_module(transform);
    scene.release_mesh(gpu);
}

#[test]
fn large_scene_splits_into_bounded_chunks() {
    let mut scene = create_scene();
    let gpu = scene.upload_mesh(&create_quad(4)).unwrap();
    let material = scene
        .register_material("plain", "Default", Vec::new())
        .unwrap();

    scene.begin_frame(0);
    scene.flush_materials();
    let transform = scene.create_transform_module().unwrap();
    let mut drawables: Vec<_> = (0..300)
        .map(|_| {
            DrawableRecord::new(
                gpu,
                material,
                ElementRange {
                    start_index: 0,
                    count: gpu.index_count,
                },
                transform.clone(),
            )
        })
        .collect();

    let batcher = DrawBatcher::new(BatcherConfig {
        max_draws_per_buffer: 128,
        ..Default::default()
    });
    let mut ctx = scene.pass_context(0);
    let (buffers, stats) = batcher.submit_sorted(&mut ctx, &mut drawables).unwrap();

    assert_eq!(stats.draw_calls, 300);
    let counts: Vec<u32> = buffers.iter().map(|b| b.draw_count()).collect();
    assert_eq!(counts, vec![128, 128, 44]);
    for chunk in &buffers {
        // Independently bound: each chunk re-establishes pipeline and buffers.
        assert_eq!(
            chunk.count_matching(|c| matches!(c, Command::BindPipeline(_))),
            1
        );
        assert_eq!(
            chunk.count_matching(|c| matches!(c, Command::BindVertexBuffer { .. })),
            1
        );
    }
}

#[test]
fn frame_loop_reuses_arena_space() {
    let mut scene = create_scene();
    let mark_after_warmup = {
        let gpu = scene.upload_mesh(&create_quad(64)).unwrap();
        scene.release_mesh(gpu);
        scene.vertex_arena.high_water_mark()
    };
    for frame in 0..10 {
        scene.begin_frame(frame);
        let gpu = scene.upload_mesh(&create_quad(64)).unwrap();
        scene.release_mesh(gpu);
    }
    assert_eq!(scene.vertex_arena.high_water_mark(), mark_after_warmup);
}
