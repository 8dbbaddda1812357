//! Atlas-Space Matrix Remapping
//!
//! Folds the clip-space to atlas-tile transform into a cascade's
//! view-projection so the lighting shader reaches the right tile with one
//! matrix multiply. A row or sign mistake here never crashes, it just samples
//! the wrong texels, so the tests check the transform against points with
//! known positions.

use glam::{Mat4, Vec2, Vec4};
use serde::{Deserialize, Serialize};

/// Depth-buffer convention of the target platform
///
/// Resolved once when the shadow pass is built and passed in explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthConvention {
    /// Near maps to -1, far to 1
    #[default]
    Standard,
    /// Reversed-Z: the z row is negated before remapping
    Reversed,
}

impl DepthConvention {
    /// Pick the convention from a backend capability flag
    pub fn from_reversed_z(reversed: bool) -> Self {
        if reversed {
            Self::Reversed
        } else {
            Self::Standard
        }
    }

    /// Check for reversed-Z
    pub fn is_reversed(self) -> bool {
        self == Self::Reversed
    }
}

/// Convert a clip-space view-projection into atlas space
///
/// `offset` is the tile's grid cell (see [`crate::atlas::tile_rect`]) and
/// `split` the number of tiles per atlas edge. After the perspective divide
/// the result yields `xy` inside the tile's `[offset/split, (offset+1)/split]`
/// square and `z` in `[0, 1]`.
pub fn to_atlas_space(
    view_projection: Mat4,
    offset: Vec2,
    split: u32,
    depth: DepthConvention,
) -> Mat4 {
    let mut x = view_projection.row(0);
    let mut y = view_projection.row(1);
    let mut z = view_projection.row(2);
    let w = view_projection.row(3);

    if depth.is_reversed() {
        z = -z;
    }

    let scale = 1.0 / split as f32;
    x = (0.5 * (x + w) + offset.x * w) * scale;
    y = (0.5 * (y + w) + offset.y * w) * scale;
    z = 0.5 * (z + w);

    from_rows(x, y, z, w)
}

fn from_rows(x: Vec4, y: Vec4, z: Vec4, w: Vec4) -> Mat4 {
    Mat4::from_cols(x, y, z, w).transpose()
}
