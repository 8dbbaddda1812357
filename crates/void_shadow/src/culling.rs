//! Scene Culling Provider
//!
//! The shadow pass never looks at scene geometry itself. It asks a
//! [`SceneCulling`] implementation whether a light has casters in range and
//! for the split geometry of every cascade. Hosts with their own culler
//! implement the trait; [`FrustumSceneCulling`] is a self-contained provider
//! built from a camera frustum, a light list and caster bounding spheres.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::cascade::{cascade_shell, CascadeRequest, CascadeShadowGeometry, ShadowSplitData};

/// Axis-aligned caster bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Bounds {
    /// Bounds enclosing a sphere
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            extents: Vec3::splat(radius),
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Grow to enclose `other`
    pub fn encapsulate(&mut self, other: &Bounds) {
        let min = self.min().min(other.min());
        let max = self.max().max(other.max());
        self.center = (min + max) * 0.5;
        self.extents = (max - min) * 0.5;
    }
}

/// Visible-geometry queries the shadow pass depends on
pub trait SceneCulling {
    /// Bounds of the casters a light can shadow, `None` when there are none
    fn shadow_caster_bounds(&self, visible_light_index: usize) -> Option<Bounds>;

    /// Light view, projection and culling sphere for one cascade
    fn compute_directional_shadow_geometry(&self, request: &CascadeRequest) -> CascadeShadowGeometry;
}

impl<T: SceneCulling + ?Sized> SceneCulling for &T {
    fn shadow_caster_bounds(&self, visible_light_index: usize) -> Option<Bounds> {
        (**self).shadow_caster_bounds(visible_light_index)
    }

    fn compute_directional_shadow_geometry(&self, request: &CascadeRequest) -> CascadeShadowGeometry {
        (**self).compute_directional_shadow_geometry(request)
    }
}

impl<T: SceneCulling + ?Sized> SceneCulling for Arc<T> {
    fn shadow_caster_bounds(&self, visible_light_index: usize) -> Option<Bounds> {
        (**self).shadow_caster_bounds(visible_light_index)
    }

    fn compute_directional_shadow_geometry(&self, request: &CascadeRequest) -> CascadeShadowGeometry {
        (**self).compute_directional_shadow_geometry(request)
    }
}

/// Camera parameters the culler slices into cascades
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullingCamera {
    /// World to camera (view) matrix, right-handed, looking down -Z
    pub world_to_camera: Mat4,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CullingCamera {
    /// Camera at `eye` looking at `target`
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            world_to_camera: Mat4::look_at_rh(eye, target, up),
            fov_y,
            aspect,
            near,
            far,
        }
    }
}

/// A shadow caster's bounding sphere
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CasterSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Frustum-slice culling provider
///
/// Each cascade shell of the camera frustum is wrapped in a bounding sphere;
/// the light looks at the sphere's center along its direction through an
/// orthographic projection that encloses the sphere. The projection's
/// translation is snapped to the tile's texel grid so shadows do not swim as
/// the camera moves.
#[derive(Clone, Debug)]
pub struct FrustumSceneCulling {
    camera: CullingCamera,
    camera_to_world: Mat4,
    shadow_distance: f32,
    /// Direction per visible light, `None` for non-directional lights
    lights: Vec<Option<Vec3>>,
    casters: Vec<CasterSphere>,
}

impl FrustumSceneCulling {
    /// Create a provider; shadows reach at most the camera's far plane
    pub fn new(camera: CullingCamera, max_shadow_distance: f32) -> Self {
        Self {
            camera,
            camera_to_world: camera.world_to_camera.inverse(),
            shadow_distance: max_shadow_distance.min(camera.far),
            lights: Vec::new(),
            casters: Vec::new(),
        }
    }

    /// Effective shadow distance
    pub fn shadow_distance(&self) -> f32 {
        self.shadow_distance
    }

    /// Append a directional light to the visible-light list
    pub fn add_directional_light(&mut self, direction: Vec3) -> usize {
        self.lights.push(Some(direction.normalize_or_zero()));
        self.lights.len() - 1
    }

    /// Append a point or spot light (never shadowed here)
    pub fn add_local_light(&mut self) -> usize {
        self.lights.push(None);
        self.lights.len() - 1
    }

    /// Register a shadow caster
    pub fn add_caster(&mut self, center: Vec3, radius: f32) {
        self.casters.push(CasterSphere { center, radius });
    }

    /// World-space corners of the frustum slice between `near` and `far`
    fn slice_corners(&self, near: f32, far: f32) -> [Vec3; 8] {
        let tan_half = (self.camera.fov_y * 0.5).tan();
        let mut corners = [Vec3::ZERO; 8];
        let mut idx = 0;
        for depth in [near, far] {
            let half_h = tan_half * depth;
            let half_w = half_h * self.camera.aspect;
            for (sx, sy) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
                let view = Vec3::new(sx * half_w, sy * half_h, -depth);
                corners[idx] = self.camera_to_world.transform_point3(view);
                idx += 1;
            }
        }
        corners
    }

    /// Direction of a directional light, straight down for anything else
    fn light_direction(&self, visible_light_index: usize) -> Vec3 {
        match self.lights.get(visible_light_index).copied().flatten() {
            Some(direction) if direction != Vec3::ZERO => direction,
            _ => {
                log::trace!(
                    "Light {} is not a directional light; cascade geometry looks straight down",
                    visible_light_index
                );
                Vec3::NEG_Y
            }
        }
    }
}

impl SceneCulling for FrustumSceneCulling {
    fn shadow_caster_bounds(&self, visible_light_index: usize) -> Option<Bounds> {
        self.lights.get(visible_light_index).copied().flatten()?;

        let eye = self.camera_to_world.w_axis.truncate();
        let mut bounds: Option<Bounds> = None;
        for caster in &self.casters {
            if caster.center.distance(eye) > self.shadow_distance + caster.radius {
                continue;
            }
            let caster_bounds = Bounds::from_sphere(caster.center, caster.radius);
            match bounds.as_mut() {
                Some(b) => b.encapsulate(&caster_bounds),
                None => bounds = Some(caster_bounds),
            }
        }
        bounds
    }

    fn compute_directional_shadow_geometry(&self, request: &CascadeRequest) -> CascadeShadowGeometry {
        let count = request.cascade_count.max(1);
        let (near, far) = cascade_shell(request.cascade_index, count, request.ratios, self.shadow_distance);
        let near = near.max(self.camera.near).min(far);

        let corners = self.slice_corners(near, far);
        let (center, radius) = bounding_sphere(&corners);

        let direction = self.light_direction(request.visible_light_index);
        let up = if direction.y.abs() > 0.9 { Vec3::Z } else { Vec3::Y };

        let pull_back = radius + request.near_plane_offset.max(0.0);
        let eye = center - direction * pull_back;
        let view = Mat4::look_at_rh(eye, center, up);
        let mut projection = Mat4::orthographic_rh_gl(-radius, radius, -radius, radius, 0.0, pull_back + radius);
        snap_to_texel(&mut projection, &view, request.tile_size);

        log::trace!(
            "Cascade {}/{} of light {}: shell [{:.2}, {:.2}], sphere radius {:.2}",
            request.cascade_index + 1,
            count,
            request.visible_light_index,
            near,
            far,
            radius
        );

        CascadeShadowGeometry {
            view,
            projection,
            split: ShadowSplitData {
                culling_sphere: center.extend(radius),
                cascade_blend_culling_factor: 0.0,
            },
        }
    }
}

/// Centroid sphere enclosing `points`
fn bounding_sphere(points: &[Vec3]) -> (Vec3, f32) {
    let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let radius = points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0f32, f32::max);
    (center, radius)
}

/// Snap the clip-space position of the world origin to the texel grid
fn snap_to_texel(projection: &mut Mat4, view: &Mat4, tile_size: u32) {
    let origin = (*projection * *view).w_axis;
    let texel = 2.0 / tile_size.max(1) as f32;

    let snapped_x = (origin.x / texel).round() * texel;
    let snapped_y = (origin.y / texel).round() * texel;

    projection.w_axis.x += snapped_x - origin.x;
    projection.w_axis.y += snapped_y - origin.y;
}
