//! Directional Lighting Setup
//!
//! Walks the frame's visible lights, uploads per-light color, direction and
//! shadow data for up to [`MAX_DIRECTIONAL_LIGHTS`] directional lights and
//! drives the shadow pass in between.

use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::command::{CommandBuffer, RenderContext};
use crate::culling::SceneCulling;
use crate::error::Result;
use crate::hooks::ShadowHooks;
use crate::params::{LightingProperties, PropertyTable};
use crate::pass::{DirectionalShadowPass, ShadowPassStats};
use crate::remap::DepthConvention;
use crate::settings::ShadowSettings;

/// Maximum directional lights uploaded per frame
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

const BUFFER_NAME: &str = "Lighting";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    #[default]
    Directional,
    Point,
    Spot,
}

/// Shadow mode of a light
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightShadows {
    #[default]
    None,
    Hard,
    Soft,
}

/// A light that survived camera culling this frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleLight {
    pub light_type: LightType,
    /// Final color (color * intensity)
    pub color: Vec4,
    /// Light transform; +Z is the direction light travels
    pub local_to_world: Mat4,
    pub shadows: LightShadows,
    pub shadow_strength: f32,
    /// Slope-scaled depth bias
    pub shadow_bias: f32,
    pub shadow_normal_bias: f32,
    /// Pulls the shadow near plane back along the light
    pub shadow_near_plane: f32,
}

impl Default for VisibleLight {
    fn default() -> Self {
        Self {
            light_type: LightType::Directional,
            color: Vec4::ONE,
            local_to_world: Mat4::IDENTITY,
            shadows: LightShadows::None,
            shadow_strength: 1.0,
            shadow_bias: 0.05,
            shadow_normal_bias: 0.4,
            shadow_near_plane: 0.2,
        }
    }
}

impl VisibleLight {
    /// Directional light travelling along `direction`
    pub fn directional(direction: Vec3) -> Self {
        let rotation = Quat::from_rotation_arc(Vec3::Z, direction.normalize_or_zero());
        Self {
            light_type: LightType::Directional,
            local_to_world: Mat4::from_quat(rotation),
            ..Default::default()
        }
    }

    /// Point light at `position`
    pub fn point(position: Vec3) -> Self {
        Self {
            light_type: LightType::Point,
            local_to_world: Mat4::from_translation(position),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_shadows(mut self, shadows: LightShadows, strength: f32) -> Self {
        self.shadows = shadows;
        self.shadow_strength = strength;
        self
    }

    /// Direction light travels in
    pub fn forward(&self) -> Vec3 {
        self.local_to_world.z_axis.truncate()
    }
}

/// Per-frame directional lighting and shadow setup
pub struct Lighting<C> {
    properties: LightingProperties,
    buffer: CommandBuffer,
    shadows: DirectionalShadowPass<C>,
    colors: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    directions: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    shadow_data: [Vec4; MAX_DIRECTIONAL_LIGHTS],
    directional_count: usize,
}

impl<C: SceneCulling> Lighting<C> {
    pub fn new(table: &mut PropertyTable, depth: DepthConvention) -> Self {
        Self {
            properties: LightingProperties::register(table),
            buffer: CommandBuffer::new(BUFFER_NAME),
            shadows: DirectionalShadowPass::new(table, depth),
            colors: [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS],
            directions: [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS],
            shadow_data: [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS],
            directional_count: 0,
        }
    }

    /// Install shadow pass hooks
    pub fn with_hooks(mut self, hooks: impl ShadowHooks + 'static) -> Self {
        self.shadows = self.shadows.with_hooks(hooks);
        self
    }

    /// Upload this frame's lights and render their shadows
    pub fn setup<R: RenderContext + ?Sized>(
        &mut self,
        ctx: &mut R,
        culling: C,
        settings: &ShadowSettings,
        visible_lights: &[VisibleLight],
    ) -> Result<ShadowPassStats> {
        self.buffer.begin_sample();
        self.shadows.setup(culling, settings);

        let lights = self.setup_lights(visible_lights);
        let stats = lights.and_then(|()| self.shadows.render(ctx));

        self.buffer.end_sample();
        ctx.execute_command_buffer(&self.buffer);
        self.buffer.clear();

        log::debug!(
            "Lighting set up {} of {} visible lights as directional",
            self.directional_count,
            visible_lights.len()
        );
        stats
    }

    fn setup_lights(&mut self, visible_lights: &[VisibleLight]) -> Result<()> {
        self.colors = [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS];
        self.directions = [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS];
        self.shadow_data = [Vec4::ZERO; MAX_DIRECTIONAL_LIGHTS];
        self.directional_count = 0;

        let directional = visible_lights
            .iter()
            .enumerate()
            .filter(|(_, light)| light.light_type == LightType::Directional)
            .take(MAX_DIRECTIONAL_LIGHTS);

        for (slot, (visible_index, light)) in directional.enumerate() {
            self.colors[slot] = light.color;
            self.directions[slot] = -light.local_to_world.z_axis;
            self.shadow_data[slot] = self.shadows.reserve(light, visible_index)?.to_vec4();
            self.directional_count = slot + 1;
        }

        let props = self.properties;
        self.buffer.set_global_int(props.light_count, self.directional_count as i32);
        self.buffer.set_global_vector_array(props.colors, &self.colors);
        self.buffer.set_global_vector_array(props.directions, &self.directions);
        self.buffer.set_global_vector_array(props.shadow_data, &self.shadow_data);
        Ok(())
    }

    /// Release per-frame resources
    pub fn cleanup<R: RenderContext + ?Sized>(&mut self, ctx: &mut R) {
        self.shadows.cleanup(ctx);
    }

    /// Directional lights uploaded this frame
    pub fn directional_count(&self) -> usize {
        self.directional_count
    }

    /// Shadow data uploaded per directional slot
    pub fn shadow_data(&self) -> &[Vec4; MAX_DIRECTIONAL_LIGHTS] {
        &self.shadow_data
    }

    pub fn properties(&self) -> &LightingProperties {
        &self.properties
    }

    pub fn shadows(&self) -> &DirectionalShadowPass<C> {
        &self.shadows
    }
}
