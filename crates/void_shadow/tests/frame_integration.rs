//! Integration tests for a full shadow frame
//!
//! Drives setup, reservation, render and cleanup through the public API:
//! - Atlas tiling and draw order
//! - Atlas-space matrices against real cascade geometry
//! - Zero-light placeholder path
//! - Call-order violations
//! - Shader globals and keywords

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use void_shadow::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera() -> CullingCamera {
    CullingCamera::look_at(
        Vec3::new(0.0, 4.0, 15.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::Y,
        60f32.to_radians(),
        16.0 / 9.0,
        0.3,
        1000.0,
    )
}

/// Scene with `count` directional lights and a few casters near the origin
fn scene(count: usize) -> (FrustumSceneCulling, Vec<VisibleLight>) {
    let mut culling = FrustumSceneCulling::new(camera(), 100.0);
    let mut lights = Vec::new();
    for i in 0..count {
        let direction = Vec3::new(0.3 * i as f32 - 0.4, -1.0, 0.25).normalize();
        culling.add_directional_light(direction);
        lights.push(VisibleLight::directional(direction).with_shadows(LightShadows::Soft, 1.0));
    }
    culling.add_caster(Vec3::ZERO, 1.0);
    culling.add_caster(Vec3::new(4.0, 1.0, -6.0), 2.0);
    (culling, lights)
}

fn four_cascades() -> ShadowSettings {
    let mut settings = ShadowSettings::default();
    settings.directional.atlas_size = AtlasSize::Size1024;
    settings.directional.cascade_count = 4;
    settings
}

#[test]
fn test_two_lights_four_cascades_tiling() {
    init_logging();
    let (culling, lights) = scene(2);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    for (index, light) in lights.iter().enumerate() {
        let data = pass.reserve(light, index).unwrap();
        assert_eq!(data.base_tile, 4 * index as u32);
    }
    let stats = pass.render(&mut ctx).unwrap();

    assert_eq!(stats.tiles, 8);
    assert_eq!(stats.split, 4);
    assert_eq!(stats.tile_size, 256);

    let viewports = ctx.viewports();
    assert_eq!(viewports.len(), 8);
    for (index, viewport) in viewports.iter().enumerate() {
        let expected = TileRect {
            x: (index as u32 % 4) * 256,
            y: (index as u32 / 4) * 256,
            width: 256,
            height: 256,
        };
        assert_eq!(*viewport, expected);
        for other in viewports.iter().skip(index + 1) {
            assert!(!viewport.overlaps(other));
        }
    }

    // Light-major, cascade-minor
    let draws = ctx.draws();
    assert_eq!(draws.len(), 8);
    for (index, draw) in draws.iter().enumerate() {
        assert_eq!(draw.visible_light_index, index / 4);
    }

    assert_eq!(ctx.allocations(), vec![AtlasDescriptor::shadow_map(1024)]);
}

#[test]
fn test_every_draw_follows_a_flush() {
    init_logging();
    let (culling, lights) = scene(2);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    pass.reserve(&lights[0], 0).unwrap();
    pass.reserve(&lights[1], 1).unwrap();
    pass.render(&mut ctx).unwrap();

    let events = ctx.events();
    for (i, event) in events.iter().enumerate() {
        if let RecordedEvent::Draw(_) = event {
            assert!(matches!(events[i - 1], RecordedEvent::Flush { .. }));
            assert!(matches!(
                events[i - 2],
                RecordedEvent::Command(ShadowCommand::SetDepthBias { constant, .. }) if constant == 0.0
            ));
        }
    }
    assert!(matches!(events.last(), Some(RecordedEvent::Flush { .. })));
}

#[test]
fn test_atlas_matrices_land_in_their_tiles() {
    init_logging();

    for depth in [DepthConvention::Standard, DepthConvention::Reversed] {
        let (culling, lights) = scene(2);
        let mut table = PropertyTable::new();
        let mut pass = DirectionalShadowPass::new(&mut table, depth);
        let mut ctx = RecordingContext::new();

        pass.setup(&culling, &four_cascades());
        pass.reserve(&lights[0], 0).unwrap();
        pass.reserve(&lights[1], 1).unwrap();
        let stats = pass.render(&mut ctx).unwrap();

        for light in 0..2 {
            for cascade in 0..4 {
                let record = pass.cascade_record(light, cascade).unwrap();
                let tile = tile_rect(light * 4 + cascade, stats.split, 1024);
                let low = tile.offset / stats.split as f32;
                let high = (tile.offset + Vec2::ONE) / stats.split as f32;

                // The sphere center is inside the cascade's light frustum
                let center = record.culling_sphere.xyz();
                let clip = record.atlas_matrix * center.extend(1.0);
                let uv = clip.xyz() / clip.w;

                assert!(uv.x >= low.x - 1e-4 && uv.x <= high.x + 1e-4, "{:?} x outside tile", depth);
                assert!(uv.y >= low.y - 1e-4 && uv.y <= high.y + 1e-4, "{:?} y outside tile", depth);
                assert!((0.0..=1.0).contains(&uv.z), "{:?} depth {} outside [0, 1]", depth, uv.z);
            }
        }
    }
}

#[test]
fn test_reversed_depth_mirrors_standard() {
    init_logging();
    let (culling, lights) = scene(1);
    let mut table = PropertyTable::new();
    let mut standard = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut reversed = DirectionalShadowPass::new(&mut table, DepthConvention::Reversed);
    let mut ctx = RecordingContext::new();

    for pass in [&mut standard, &mut reversed] {
        pass.setup(&culling, &four_cascades());
        pass.reserve(&lights[0], 0).unwrap();
        pass.render(&mut ctx).unwrap();
    }

    let point = Vec3::new(1.0, 0.5, -2.0).extend(1.0);
    let a = standard.cascade_record(0, 0).unwrap().atlas_matrix * point;
    let b = reversed.cascade_record(0, 0).unwrap().atlas_matrix * point;

    assert!((a.x / a.w - b.x / b.w).abs() < 1e-5);
    assert!((a.y / a.w - b.y / b.w).abs() < 1e-5);
    assert!((a.z / a.w + b.z / b.w - 1.0).abs() < 1e-4);
}

#[test]
fn test_zero_lights_allocate_placeholder() {
    init_logging();
    let (culling, _) = scene(1);
    let mut table = PropertyTable::new();
    let mut lighting = Lighting::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    let mut settings = four_cascades();
    settings.directional.cascade_count = 3;
    let unshadowed = [VisibleLight::directional(Vec3::NEG_Y)];

    let stats = lighting.setup(&mut ctx, &culling, &settings, &unshadowed).unwrap();
    assert_eq!(stats.tiles, 0);
    assert!(ctx.draws().is_empty());
    assert_eq!(ctx.allocations(), vec![AtlasDescriptor::shadow_map(1)]);

    let shadow_props = *lighting.shadows().properties();
    assert_eq!(ctx.global_int(shadow_props.cascade_count), Some(3));
    assert_eq!(ctx.global_vector(shadow_props.distance_fade), Some(settings.distance_fade_params()));

    let shadow_data = ctx.global_vector_array(lighting.properties().shadow_data).unwrap();
    assert_eq!(shadow_data.len(), MAX_DIRECTIONAL_LIGHTS);
    assert!(shadow_data.iter().all(|data| *data == Vec4::ZERO));

    lighting.cleanup(&mut ctx);
    assert!(ctx.released_atlas());
}

#[test]
fn test_render_twice_does_not_redraw() {
    init_logging();
    let (culling, lights) = scene(2);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    pass.reserve(&lights[0], 0).unwrap();
    pass.render(&mut ctx).unwrap();
    let draws = ctx.draws().len();

    let result = pass.render(&mut ctx);
    assert!(matches!(result, Err(ShadowError::InvalidState { .. })));
    assert_eq!(ctx.draws().len(), draws);

    // A new frame renders again
    pass.cleanup(&mut ctx);
    pass.setup(&culling, &four_cascades());
    pass.reserve(&lights[0], 0).unwrap();
    pass.render(&mut ctx).unwrap();
    assert_eq!(ctx.draws().len(), draws * 2);
}

#[test]
fn test_reserve_after_render_is_rejected() {
    init_logging();
    let (culling, lights) = scene(2);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    pass.render(&mut ctx).unwrap();

    let result = pass.reserve(&lights[1], 1);
    assert!(matches!(
        result,
        Err(ShadowError::InvalidState {
            state: ShadowPassState::Finalized,
            ..
        })
    ));
}

#[test]
fn test_capacity_exhaustion() {
    init_logging();
    let (culling, lights) = scene(6);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    let accepted: Vec<DirectionalShadowData> = lights
        .iter()
        .enumerate()
        .map(|(index, light)| pass.reserve(light, index).unwrap())
        .filter(DirectionalShadowData::is_shadowed)
        .collect();

    assert_eq!(accepted.len(), MAX_SHADOWED_DIRECTIONAL_LIGHTS);
    for (n, data) in accepted.iter().enumerate() {
        assert_eq!(data.base_tile, 4 * n as u32);
    }

    let stats = pass.render(&mut ctx).unwrap();
    assert_eq!(stats.tiles, 16);
    assert_eq!(stats.split, 4);
    assert_eq!(ctx.draws().len(), 16);
}

#[test]
fn test_lights_without_casters_are_skipped() {
    init_logging();
    let mut culling = FrustumSceneCulling::new(camera(), 100.0);
    culling.add_directional_light(Vec3::NEG_Y);
    let light = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Hard, 1.0);

    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    pass.setup(&culling, &four_cascades());

    assert_eq!(pass.reserve(&light, 0).unwrap(), DirectionalShadowData::NONE);
    assert!(pass.reservations().is_empty());
}

#[test]
fn test_shader_globals_and_keywords() {
    init_logging();
    let (culling, lights) = scene(1);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    let mut settings = four_cascades();
    settings.directional.filter = ShadowFilter::Pcf5x5;
    settings.directional.cascade_blend = CascadeBlendMode::Dither;

    pass.setup(&culling, &settings);
    pass.reserve(&lights[0], 0).unwrap();
    pass.render(&mut ctx).unwrap();

    assert_eq!(ctx.keyword_enabled("DIRECTIONAL_PCF3"), Some(false));
    assert_eq!(ctx.keyword_enabled("DIRECTIONAL_PCF5"), Some(true));
    assert_eq!(ctx.keyword_enabled("DIRECTIONAL_PCF7"), Some(false));
    assert_eq!(ctx.keyword_enabled("CASCADE_BLEND_SOFT"), Some(false));
    assert_eq!(ctx.keyword_enabled("CASCADE_BLEND_DITHER"), Some(true));

    let props = *pass.properties();
    assert_eq!(ctx.global_int(props.cascade_count), Some(4));
    assert_eq!(
        ctx.global_vector(props.atlas_size),
        Some(Vec4::new(1024.0, 1.0 / 1024.0, 0.0, 0.0))
    );

    let spheres = ctx.global_vector_array(props.cascade_culling_spheres).unwrap();
    let cascade_data = ctx.global_vector_array(props.cascade_data).unwrap();
    let matrices = ctx.global_matrix_array(props.matrices).unwrap();
    assert_eq!(spheres.len(), MAX_CASCADES);
    assert_eq!(matrices.len(), MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES);

    for cascade in 0..4 {
        let record = pass.cascade_record(0, cascade).unwrap();
        assert_eq!(spheres[cascade], record.culling_sphere);
        assert_eq!(cascade_data[cascade], record.cascade_data);
        assert_eq!(matrices[cascade], record.atlas_matrix);
        assert!((record.cascade_data.x * record.culling_sphere.w - 1.0).abs() < 1e-5);
    }

    // Cascade spheres grow with distance
    for pair in spheres.windows(2) {
        assert!(pair[0].w < pair[1].w);
    }
}

#[test]
fn test_hard_filter_disables_all_keywords() {
    init_logging();
    let (culling, lights) = scene(1);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    pass.setup(&culling, &four_cascades());
    pass.reserve(&lights[0], 0).unwrap();
    pass.render(&mut ctx).unwrap();

    for keyword in ["DIRECTIONAL_PCF3", "DIRECTIONAL_PCF5", "DIRECTIONAL_PCF7", "CASCADE_BLEND_SOFT", "CASCADE_BLEND_DITHER"] {
        assert_eq!(ctx.keyword_enabled(keyword), Some(false), "{} enabled", keyword);
    }
}

#[test]
fn test_cleanup_releases_atlas_once() {
    init_logging();
    let (culling, lights) = scene(1);
    let mut table = PropertyTable::new();
    let mut pass = DirectionalShadowPass::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    // Cleanup before render has nothing to release
    pass.setup(&culling, &four_cascades());
    pass.cleanup(&mut ctx);
    assert!(!ctx.released_atlas());
    assert_eq!(pass.state(), ShadowPassState::Idle);

    pass.setup(&culling, &four_cascades());
    pass.reserve(&lights[0], 0).unwrap();
    pass.render(&mut ctx).unwrap();
    pass.cleanup(&mut ctx);
    pass.cleanup(&mut ctx);

    let releases = ctx
        .commands()
        .filter(|command| matches!(command, ShadowCommand::ReleaseTemporaryRenderTarget { .. }))
        .count();
    assert_eq!(releases, 1);
}

#[test]
fn test_settings_loaded_from_json_drive_the_frame() {
    init_logging();
    let settings = ShadowSettings::from_json(
        r#"{
            "max_distance": 60.0,
            "directional": { "atlas_size": 2048, "cascade_count": 2, "cascade_ratios": [0.2, 0.5, 0.8] }
        }"#,
    )
    .unwrap();

    let (culling, lights) = scene(3);
    let mut table = PropertyTable::new();
    let mut lighting = Lighting::new(&mut table, DepthConvention::Standard);
    let mut ctx = RecordingContext::new();

    let stats = lighting.setup(&mut ctx, &culling, &settings, &lights).unwrap();
    assert_eq!(stats.atlas_size, 2048);
    assert_eq!(stats.tiles, 6);
    assert_eq!(stats.split, 4);
    assert_eq!(stats.tile_size, 512);

    let base_tiles: Vec<f32> = lighting.shadow_data().iter().take(3).map(|data| data.y).collect();
    assert_eq!(base_tiles, vec![0.0, 2.0, 4.0]);
}
