//! Cascade Split Calculations
//!
//! Cascade shells partition `[0, shadow_distance]` with the configured
//! ratios. The authoritative split geometry (light view, projection and the
//! culling sphere of each slice) comes from the scene culling provider,
//! which owns the visible geometry; this module shapes the requests and
//! turns the returned culling spheres into shader-side cascade records.

use glam::{Mat4, Vec3, Vec4};

use crate::settings::ShadowFilter;

/// Maximum supported cascade count
pub const MAX_CASCADES: usize = 4;

/// Near and far distance of cascade `index` along the camera view
///
/// Ratios are fractions of `distance`; the first shell starts at zero and
/// the last ends at `distance`. A single cascade covers the whole range.
pub fn cascade_shell(index: usize, count: usize, ratios: Vec3, distance: f32) -> (f32, f32) {
    let ratio = |i: usize| -> f32 {
        if i + 1 >= count {
            1.0
        } else {
            ratios[i]
        }
    };

    let near = if index == 0 { 0.0 } else { ratio(index - 1) * distance };
    let far = ratio(index) * distance;
    (near, far)
}

/// Geometry request for one cascade of one light
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeRequest {
    /// Index into the frame's visible-light list
    pub visible_light_index: usize,

    /// Cascade being computed
    pub cascade_index: usize,

    /// Cascades per light
    pub cascade_count: usize,

    /// Shell boundaries as fractions of the shadow distance
    pub ratios: Vec3,

    /// Tile edge length in texels (for texel snapping)
    pub tile_size: u32,

    /// Pulls the light's near plane back to catch tall casters
    pub near_plane_offset: f32,
}

/// Split data handed to the shadow caster draw
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowSplitData {
    /// Bounding sphere of the cascade slice (xyz center, w radius)
    pub culling_sphere: Vec4,

    /// Over-inclusion factor for casters near the cascade boundary
    pub cascade_blend_culling_factor: f32,
}

/// Result of a cascade geometry request
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeShadowGeometry {
    /// Light view matrix
    pub view: Mat4,

    /// Light projection matrix (clip z in [-1, 1])
    pub projection: Mat4,

    /// Culling data for the caster draw
    pub split: ShadowSplitData,
}

impl CascadeShadowGeometry {
    /// Combined view-projection
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Derived per-cascade shader data
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeRecord {
    /// Culling sphere with the radius shrunk by the filter size and squared
    pub culling_sphere: Vec4,

    /// `x`: inverse squared radius, `y`: filter size * sqrt(2)
    pub cascade_data: Vec4,

    /// World to atlas-tile transform
    pub atlas_matrix: Mat4,
}

impl Default for CascadeRecord {
    fn default() -> Self {
        Self {
            culling_sphere: Vec4::ZERO,
            cascade_data: Vec4::ZERO,
            atlas_matrix: Mat4::IDENTITY,
        }
    }
}

impl CascadeRecord {
    /// Build the shader-side record from a culling sphere
    ///
    /// The radius is shrunk by the filter footprint so filtered samples never
    /// reach outside the cascade's tile.
    pub fn from_culling_sphere(
        culling_sphere: Vec4,
        tile_size: u32,
        filter: ShadowFilter,
        atlas_matrix: Mat4,
    ) -> Self {
        let texel_size = 2.0 * culling_sphere.w / tile_size as f32;
        let filter_size = texel_size * (filter as i32 as f32 + 1.0);

        let mut sphere = culling_sphere;
        sphere.w -= filter_size;
        sphere.w *= sphere.w;

        Self {
            culling_sphere: sphere,
            cascade_data: Vec4::new(1.0 / sphere.w, filter_size * std::f32::consts::SQRT_2, 0.0, 0.0),
            atlas_matrix,
        }
    }

    /// Squared radius stored in the culling sphere
    pub fn squared_radius(&self) -> f32 {
        self.culling_sphere.w
    }
}
