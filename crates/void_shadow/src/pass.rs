//! Directional Shadow Pass
//!
//! Drives one frame of directional shadows:
//!
//! ```text
//! Idle --setup--> Armed --reserve*--> Armed --render--> Finalized --cleanup--> Idle
//! ```
//!
//! `render` allocates the atlas, draws every reserved light's cascades into
//! their tiles in light-major order and uploads the shader globals the
//! lighting pass samples with. With no reserved lights it allocates a 1x1
//! placeholder so the atlas binding stays valid.

use glam::{Mat4, Vec4};

use crate::atlas::AtlasLayout;
use crate::cascade::{CascadeRecord, CascadeRequest, MAX_CASCADES};
use crate::command::{AtlasDescriptor, CommandBuffer, RenderContext, ShadowDrawSettings};
use crate::culling::SceneCulling;
use crate::error::{Result, ShadowError};
use crate::gpu::{GpuShadowUniforms, MAX_SHADOW_TILES};
use crate::hooks::{NoHooks, ShadowHooks};
use crate::lighting::VisibleLight;
use crate::params::{PropertyTable, ShadowProperties, CASCADE_BLEND_KEYWORDS, FILTER_KEYWORDS};
use crate::registry::{DirectionalShadowData, LightReservationRegistry, ShadowedLightReservation};
use crate::remap::{to_atlas_space, DepthConvention};
use crate::settings::ShadowSettings;

const BUFFER_NAME: &str = "Shadows";

/// Frame state of the shadow pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadowPassState {
    /// Waiting for `setup`
    #[default]
    Idle,
    /// Accepting reservations
    Armed,
    /// Atlas drawn, globals uploaded
    Finalized,
}

/// Summary of a `render` call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowPassStats {
    /// Lights drawn
    pub lights: usize,
    /// Tiles drawn (lights * cascades)
    pub tiles: usize,
    /// Tiles per atlas edge
    pub split: u32,
    /// Tile edge in texels
    pub tile_size: u32,
    /// Allocated atlas edge in texels
    pub atlas_size: u32,
}

/// Directional light shadow pass
pub struct DirectionalShadowPass<C> {
    properties: ShadowProperties,
    depth: DepthConvention,
    buffer: CommandBuffer,
    registry: LightReservationRegistry,
    records: [CascadeRecord; MAX_SHADOW_TILES],
    layout: Option<AtlasLayout>,
    culling: Option<C>,
    settings: ShadowSettings,
    state: ShadowPassState,
    atlas_allocated: bool,
    hooks: Box<dyn ShadowHooks>,
}

impl<C: SceneCulling> DirectionalShadowPass<C> {
    /// Create a pass, registering its shader properties in `table`
    pub fn new(table: &mut PropertyTable, depth: DepthConvention) -> Self {
        Self {
            properties: ShadowProperties::register(table),
            depth,
            buffer: CommandBuffer::new(BUFFER_NAME),
            registry: LightReservationRegistry::new(),
            records: [CascadeRecord::default(); MAX_SHADOW_TILES],
            layout: None,
            culling: None,
            settings: ShadowSettings::default(),
            state: ShadowPassState::Idle,
            atlas_allocated: false,
            hooks: Box::new(NoHooks),
        }
    }

    /// Replace the event hooks
    pub fn with_hooks(mut self, hooks: impl ShadowHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Arm the pass for a new frame
    ///
    /// Settings are trusted; validate them when loading configuration.
    pub fn setup(&mut self, culling: C, settings: &ShadowSettings) {
        if self.atlas_allocated {
            log::warn!("Shadow pass set up again before cleanup; previous atlas not released");
        }

        self.registry.setup();
        self.records = [CascadeRecord::default(); MAX_SHADOW_TILES];
        self.layout = None;
        self.culling = Some(culling);
        self.settings = settings.clone();
        self.state = ShadowPassState::Armed;

        log::debug!(
            "Shadow pass armed: {} cascades, {}px atlas",
            settings.directional.cascade_count,
            settings.directional.atlas_size.texels()
        );
    }

    /// Offer a visible light for shadow casting
    ///
    /// Returns the light's shadow data, or [`DirectionalShadowData::NONE`]
    /// when it was rejected.
    pub fn reserve(&mut self, light: &VisibleLight, visible_light_index: usize) -> Result<DirectionalShadowData> {
        let culling = match (self.state, self.culling.as_ref()) {
            (ShadowPassState::Armed, Some(culling)) => culling,
            (state, _) => return Err(self.out_of_order("reserve", state)),
        };

        let cascade_count = self.settings.directional.cascade_count;
        match self.registry.reserve(culling, light, visible_light_index, cascade_count) {
            Ok(data) => {
                log::trace!(
                    "Light {} reserved tiles {}..{}",
                    visible_light_index,
                    data.base_tile,
                    data.base_tile + cascade_count
                );
                self.hooks.on_reserved(visible_light_index, &data);
                Ok(data)
            }
            Err(reason) => {
                log::trace!("Light {} casts no shadow: {:?}", visible_light_index, reason);
                self.hooks.on_rejected(visible_light_index, reason);
                Ok(DirectionalShadowData::NONE)
            }
        }
    }

    /// Draw the atlas and upload shader globals
    ///
    /// Only valid once per `setup`; any other call returns
    /// [`ShadowError::InvalidState`] without recording anything.
    pub fn render<R: RenderContext + ?Sized>(&mut self, ctx: &mut R) -> Result<ShadowPassStats> {
        if self.state != ShadowPassState::Armed {
            return Err(self.out_of_order("render", self.state));
        }

        let stats = if self.registry.is_empty() {
            self.render_placeholder(ctx)
        } else {
            self.render_directional(ctx)
        };

        self.atlas_allocated = true;
        self.state = ShadowPassState::Finalized;
        self.hooks.on_pass_finished(&stats);

        log::debug!(
            "Shadow pass rendered {} lights into {} tiles ({}x{} grid, {}px tiles)",
            stats.lights,
            stats.tiles,
            stats.split,
            stats.split,
            stats.tile_size
        );
        Ok(stats)
    }

    fn render_placeholder<R: RenderContext + ?Sized>(&mut self, ctx: &mut R) -> ShadowPassStats {
        let props = self.properties;
        self.buffer.get_temporary_render_target(props.atlas, AtlasDescriptor::shadow_map(1));
        self.buffer
            .set_global_int(props.cascade_count, self.settings.directional.cascade_count as i32);
        self.buffer
            .set_global_vector(props.distance_fade, self.settings.distance_fade_params());
        flush(&mut self.buffer, ctx);

        ShadowPassStats {
            lights: 0,
            tiles: 0,
            split: 1,
            tile_size: 1,
            atlas_size: 1,
        }
    }

    fn render_directional<R: RenderContext + ?Sized>(&mut self, ctx: &mut R) -> ShadowPassStats {
        let props = self.properties;
        let directional = &self.settings.directional;
        let atlas_size = directional.atlas_size.texels();

        self.buffer
            .get_temporary_render_target(props.atlas, AtlasDescriptor::shadow_map(atlas_size));
        self.buffer.set_render_target(props.atlas);
        self.buffer.clear_render_target(true, false);
        self.buffer
            .set_global_vector(props.distance_fade, self.settings.distance_fade_params());
        self.buffer.begin_sample();
        flush(&mut self.buffer, ctx);

        let cascade_count = directional.cascade_count as usize;
        let layout = AtlasLayout::new(self.registry.count() * cascade_count, atlas_size);

        if let Some(culling) = self.culling.as_ref() {
            let mut frame = FrameTiles {
                culling,
                layout: &layout,
                settings: &self.settings,
                depth: self.depth,
                buffer: &mut self.buffer,
                records: &mut self.records,
                hooks: self.hooks.as_mut(),
            };
            for (slot, reservation) in self.registry.reservations().iter().enumerate() {
                frame.render_light(ctx, slot, reservation);
            }
        }

        let mut spheres = [Vec4::ZERO; MAX_CASCADES];
        let mut cascade_data = [Vec4::ZERO; MAX_CASCADES];
        for (cascade, record) in self.records.iter().take(cascade_count).enumerate() {
            spheres[cascade] = record.culling_sphere;
            cascade_data[cascade] = record.cascade_data;
        }
        let matrices: Vec<Mat4> = self.records.iter().map(|record| record.atlas_matrix).collect();

        let directional = &self.settings.directional;
        self.buffer.set_global_int(props.cascade_count, cascade_count as i32);
        self.buffer.set_global_vector_array(props.cascade_culling_spheres, &spheres);
        self.buffer.set_global_vector_array(props.cascade_data, &cascade_data);
        self.buffer.set_global_matrix_array(props.matrices, &matrices);
        FILTER_KEYWORDS.apply(&mut self.buffer, directional.filter.keyword_index());
        CASCADE_BLEND_KEYWORDS.apply(&mut self.buffer, directional.cascade_blend.keyword_index());
        self.buffer.set_global_vector(
            props.atlas_size,
            Vec4::new(atlas_size as f32, 1.0 / atlas_size as f32, 0.0, 0.0),
        );
        self.buffer.end_sample();
        flush(&mut self.buffer, ctx);

        self.layout = Some(layout);

        ShadowPassStats {
            lights: self.registry.count(),
            tiles: layout.tile_count,
            split: layout.split,
            tile_size: layout.tile_size,
            atlas_size,
        }
    }

    /// Release the atlas and return to idle
    pub fn cleanup<R: RenderContext + ?Sized>(&mut self, ctx: &mut R) {
        if self.atlas_allocated {
            self.buffer.release_temporary_render_target(self.properties.atlas);
            flush(&mut self.buffer, ctx);
            self.atlas_allocated = false;
        }
        self.culling = None;
        self.state = ShadowPassState::Idle;
        log::debug!("Shadow pass cleaned up");
    }

    /// Current frame state
    pub fn state(&self) -> ShadowPassState {
        self.state
    }

    /// Shader property ids this pass writes
    pub fn properties(&self) -> &ShadowProperties {
        &self.properties
    }

    /// Depth convention the atlas matrices are built for
    pub fn depth_convention(&self) -> DepthConvention {
        self.depth
    }

    /// Settings of the current frame
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// This frame's accepted reservations
    pub fn reservations(&self) -> &[ShadowedLightReservation] {
        self.registry.reservations()
    }

    /// Atlas layout of the last `render`, until the next `setup`
    pub fn layout(&self) -> Option<&AtlasLayout> {
        self.layout.as_ref()
    }

    /// Derived data of one cascade of a reserved light
    ///
    /// `None` unless the pass is finalized and both indices are within this
    /// frame's reservations.
    pub fn cascade_record(&self, light_slot: usize, cascade_index: usize) -> Option<&CascadeRecord> {
        let cascade_count = self.settings.directional.cascade_count as usize;
        if self.state != ShadowPassState::Finalized
            || light_slot >= self.registry.count()
            || cascade_index >= cascade_count
        {
            return None;
        }
        self.records.get(light_slot * cascade_count + cascade_index)
    }

    /// Frame uniforms packed for a single buffer upload
    pub fn uniform_block(&self) -> Option<GpuShadowUniforms> {
        let layout = match (self.state, self.layout.as_ref()) {
            (ShadowPassState::Finalized, Some(layout)) => layout,
            _ => return None,
        };
        Some(GpuShadowUniforms::from_records(
            &self.records,
            self.settings.directional.cascade_count as usize,
            layout.atlas_size,
            self.settings.distance_fade_params(),
        ))
    }

    fn out_of_order(&self, operation: &'static str, state: ShadowPassState) -> ShadowError {
        log::warn!("Shadow pass {} called while {:?}", operation, state);
        ShadowError::InvalidState { operation, state }
    }
}

/// Borrowed state for drawing one frame's tiles
struct FrameTiles<'a, C> {
    culling: &'a C,
    layout: &'a AtlasLayout,
    settings: &'a ShadowSettings,
    depth: DepthConvention,
    buffer: &'a mut CommandBuffer,
    records: &'a mut [CascadeRecord; MAX_SHADOW_TILES],
    hooks: &'a mut dyn ShadowHooks,
}

impl<C: SceneCulling> FrameTiles<'_, C> {
    fn render_light<R: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut R,
        slot: usize,
        reservation: &ShadowedLightReservation,
    ) {
        let directional = &self.settings.directional;
        let cascade_count = directional.cascade_count as usize;
        let culling_factor = directional.cascade_fade_culling_factor();

        for cascade in 0..cascade_count {
            let request = CascadeRequest {
                visible_light_index: reservation.visible_light_index,
                cascade_index: cascade,
                cascade_count,
                ratios: directional.cascade_ratios_vec(),
                tile_size: self.layout.tile_size,
                near_plane_offset: reservation.near_plane_offset,
            };
            let mut geometry = self.culling.compute_directional_shadow_geometry(&request);
            geometry.split.cascade_blend_culling_factor = culling_factor;

            let tile = self.layout.tile(slot * cascade_count + cascade);
            let atlas_matrix = to_atlas_space(geometry.view_projection(), tile.offset, self.layout.split, self.depth);
            self.records[tile.index] = CascadeRecord::from_culling_sphere(
                geometry.split.culling_sphere,
                self.layout.tile_size,
                directional.filter,
                atlas_matrix,
            );

            self.buffer.set_viewport(tile.viewport);
            self.buffer.set_view_projection(geometry.view, geometry.projection);
            self.buffer.set_depth_bias(0.0, reservation.slope_bias);
            flush(self.buffer, ctx);

            ctx.draw_shadows(&ShadowDrawSettings {
                visible_light_index: reservation.visible_light_index,
                split: geometry.split,
            });
            self.buffer.set_depth_bias(0.0, 0.0);

            log::trace!(
                "Drew light {} cascade {} into tile {} at ({}, {})",
                reservation.visible_light_index,
                cascade,
                tile.index,
                tile.viewport.x,
                tile.viewport.y
            );
            self.hooks.on_tile_rendered(slot, cascade, &tile);
        }
    }
}

/// Submit and reset the buffer
fn flush<R: RenderContext + ?Sized>(buffer: &mut CommandBuffer, ctx: &mut R) {
    ctx.execute_command_buffer(buffer);
    buffer.clear();
}
