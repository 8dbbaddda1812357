//! GPU Shadow Uniform Block
//!
//! Backends that bind one uniform buffer instead of loose shader globals can
//! upload this block directly. Layout follows std140: every member is a
//! 16-byte multiple.

use glam::{Mat4, Vec4};

use crate::cascade::{CascadeRecord, MAX_CASCADES};
use crate::registry::MAX_SHADOWED_DIRECTIONAL_LIGHTS;

/// Atlas matrix slots (light x cascade)
pub const MAX_SHADOW_TILES: usize = MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES;

/// Directional shadow uniforms
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuShadowUniforms {
    /// World to atlas-tile matrix per slot
    pub matrices: [[[f32; 4]; 4]; MAX_SHADOW_TILES],

    /// Culling sphere per cascade (w = squared adjusted radius)
    pub culling_spheres: [[f32; 4]; MAX_CASCADES],

    /// Inverse squared radius and filter size per cascade
    pub cascade_data: [[f32; 4]; MAX_CASCADES],

    /// Atlas size, inverse size
    pub atlas_size: [f32; 4],

    /// Distance fade parameters
    pub distance_fade: [f32; 4],

    pub cascade_count: u32,

    pub _padding: [u32; 3],
}

impl Default for GpuShadowUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl GpuShadowUniforms {
    /// Pack a frame's cascade records
    ///
    /// `records` is the full slot arena; the cascade culling spheres and data
    /// come from the first light's block.
    pub fn from_records(
        records: &[CascadeRecord; MAX_SHADOW_TILES],
        cascade_count: usize,
        atlas_size: u32,
        distance_fade: Vec4,
    ) -> Self {
        let mut uniforms = Self::default();

        for (slot, record) in records.iter().enumerate() {
            uniforms.matrices[slot] = record.atlas_matrix.to_cols_array_2d();
        }
        for (cascade, record) in records.iter().take(cascade_count.min(MAX_CASCADES)).enumerate() {
            uniforms.culling_spheres[cascade] = record.culling_sphere.to_array();
            uniforms.cascade_data[cascade] = record.cascade_data.to_array();
        }

        let size = atlas_size as f32;
        uniforms.atlas_size = [size, 1.0 / size, 0.0, 0.0];
        uniforms.distance_fade = distance_fade.to_array();
        uniforms.cascade_count = cascade_count as u32;
        uniforms
    }

    /// Atlas matrix of a slot
    pub fn matrix(&self, slot: usize) -> Mat4 {
        Mat4::from_cols_array_2d(&self.matrices[slot])
    }

    /// Get as bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
