//! Light Reservation Registry
//!
//! Hands out contiguous atlas blocks to shadow-casting directional lights
//! during the frame's light loop. The registry is a fixed arena reset by
//! [`LightReservationRegistry::setup`]; losing a reservation is a normal
//! outcome and never an error.

use glam::Vec4;

use crate::culling::SceneCulling;
use crate::lighting::{LightShadows, VisibleLight};

/// Maximum directional lights with shadows per frame
pub const MAX_SHADOWED_DIRECTIONAL_LIGHTS: usize = 4;

/// Accepted shadow-casting light, valid for the current frame only
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowedLightReservation {
    /// Index into the frame's visible-light list
    pub visible_light_index: usize,
    pub slope_bias: f32,
    pub normal_bias: f32,
    pub near_plane_offset: f32,
}

/// Per-light shadow data forwarded to the lighting shader
///
/// All zeros means the light casts no shadow.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DirectionalShadowData {
    pub strength: f32,
    /// First atlas tile of the light's cascade block
    pub base_tile: u32,
    pub normal_bias: f32,
}

impl DirectionalShadowData {
    /// No shadow
    pub const NONE: Self = Self {
        strength: 0.0,
        base_tile: 0,
        normal_bias: 0.0,
    };

    pub fn is_shadowed(&self) -> bool {
        self.strength > 0.0
    }

    /// Shader layout: `(strength, base_tile, normal_bias, 0)`
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.strength, self.base_tile as f32, self.normal_bias, 0.0)
    }
}

/// Why a light was not granted a shadow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Every slot is already taken
    CapacityExhausted,
    /// The light's shadow mode is off
    ShadowsDisabled,
    ZeroStrength,
    /// No shadow casters within range
    NoCasters,
}

/// Fixed-capacity reservation arena
#[derive(Clone, Debug, Default)]
pub struct LightReservationRegistry {
    slots: [ShadowedLightReservation; MAX_SHADOWED_DIRECTIONAL_LIGHTS],
    count: usize,
}

impl LightReservationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame
    pub fn setup(&mut self) {
        self.slots = [ShadowedLightReservation::default(); MAX_SHADOWED_DIRECTIONAL_LIGHTS];
        self.count = 0;
    }

    /// Try to reserve an atlas block for `light`
    ///
    /// Accepted lights get `base_tile = cascade_count * n` where `n` is the
    /// number of lights accepted before them.
    pub fn reserve<C: SceneCulling + ?Sized>(
        &mut self,
        culling: &C,
        light: &VisibleLight,
        visible_light_index: usize,
        cascade_count: u32,
    ) -> Result<DirectionalShadowData, RejectReason> {
        if self.count >= MAX_SHADOWED_DIRECTIONAL_LIGHTS {
            return Err(RejectReason::CapacityExhausted);
        }
        if light.shadows == LightShadows::None {
            return Err(RejectReason::ShadowsDisabled);
        }
        if light.shadow_strength <= 0.0 {
            return Err(RejectReason::ZeroStrength);
        }
        if culling.shadow_caster_bounds(visible_light_index).is_none() {
            return Err(RejectReason::NoCasters);
        }

        self.slots[self.count] = ShadowedLightReservation {
            visible_light_index,
            slope_bias: light.shadow_bias,
            normal_bias: light.shadow_normal_bias,
            near_plane_offset: light.shadow_near_plane,
        };
        let data = DirectionalShadowData {
            strength: light.shadow_strength,
            base_tile: cascade_count * self.count as u32,
            normal_bias: light.shadow_normal_bias,
        };
        self.count += 1;
        Ok(data)
    }

    /// This frame's accepted reservations, in acceptance order
    pub fn reservations(&self) -> &[ShadowedLightReservation] {
        &self.slots[..self.count]
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{CascadeRequest, CascadeShadowGeometry};
    use crate::culling::Bounds;
    use glam::{Mat4, Vec3};

    /// Every light except index 9 has casters
    struct StubCulling;

    impl SceneCulling for StubCulling {
        fn shadow_caster_bounds(&self, visible_light_index: usize) -> Option<Bounds> {
            (visible_light_index != 9).then(|| Bounds::from_sphere(Vec3::ZERO, 1.0))
        }

        fn compute_directional_shadow_geometry(&self, _request: &CascadeRequest) -> CascadeShadowGeometry {
            CascadeShadowGeometry {
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
                split: Default::default(),
            }
        }
    }

    #[test]
    fn test_capacity_and_base_tiles() {
        let mut registry = LightReservationRegistry::new();
        registry.setup();
        let light = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Hard, 0.8);

        for n in 0..MAX_SHADOWED_DIRECTIONAL_LIGHTS {
            let data = registry.reserve(&StubCulling, &light, n, 3).unwrap();
            assert_eq!(data.base_tile, 3 * n as u32);
            assert_eq!(data.strength, 0.8);
        }

        assert_eq!(
            registry.reserve(&StubCulling, &light, 4, 3),
            Err(RejectReason::CapacityExhausted)
        );
        assert_eq!(registry.count(), MAX_SHADOWED_DIRECTIONAL_LIGHTS);
    }

    #[test]
    fn test_rejections_do_not_consume_slots() {
        let mut registry = LightReservationRegistry::new();
        registry.setup();

        let off = VisibleLight::directional(Vec3::NEG_Y);
        assert_eq!(registry.reserve(&StubCulling, &off, 0, 4), Err(RejectReason::ShadowsDisabled));

        let faint = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Soft, 0.0);
        assert_eq!(registry.reserve(&StubCulling, &faint, 1, 4), Err(RejectReason::ZeroStrength));

        let lit = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Soft, 1.0);
        assert_eq!(registry.reserve(&StubCulling, &lit, 9, 4), Err(RejectReason::NoCasters));
        assert!(registry.is_empty());

        let data = registry.reserve(&StubCulling, &lit, 2, 4).unwrap();
        assert_eq!(data.base_tile, 0);
        assert_eq!(registry.reservations()[0].visible_light_index, 2);
    }

    #[test]
    fn test_reservation_copies_light_biases() {
        let mut registry = LightReservationRegistry::new();
        registry.setup();

        let mut light = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Hard, 0.5);
        light.shadow_bias = 1.25;
        light.shadow_normal_bias = 0.4;
        light.shadow_near_plane = 3.0;

        let data = registry.reserve(&StubCulling, &light, 5, 2).unwrap();
        assert_eq!(data.to_vec4(), Vec4::new(0.5, 0.0, 0.4, 0.0));

        let reservation = registry.reservations()[0];
        assert_eq!(reservation.visible_light_index, 5);
        assert_eq!(reservation.slope_bias, 1.25);
        assert_eq!(reservation.normal_bias, 0.4);
        assert_eq!(reservation.near_plane_offset, 3.0);
    }

    #[test]
    fn test_setup_resets_arena() {
        let mut registry = LightReservationRegistry::new();
        registry.setup();
        let light = VisibleLight::directional(Vec3::NEG_Y).with_shadows(LightShadows::Hard, 1.0);
        registry.reserve(&StubCulling, &light, 0, 4).unwrap();
        registry.reserve(&StubCulling, &light, 1, 4).unwrap();

        registry.setup();
        assert!(registry.reservations().is_empty());
        assert_eq!(registry.slots, [ShadowedLightReservation::default(); MAX_SHADOWED_DIRECTIONAL_LIGHTS]);

        let data = registry.reserve(&StubCulling, &light, 3, 4).unwrap();
        assert_eq!(data.base_tile, 0);
    }

    #[test]
    fn test_none_is_unshadowed() {
        assert!(!DirectionalShadowData::NONE.is_shadowed());
        assert_eq!(DirectionalShadowData::NONE.to_vec4(), Vec4::ZERO);
    }
}
