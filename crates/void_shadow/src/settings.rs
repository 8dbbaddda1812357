//! Shadow Settings
//!
//! Externally owned shadow configuration with serde support so it can live
//! next to the rest of the pipeline configuration. The pass treats settings
//! as trusted: `validate` runs at the loading boundary, never per frame.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::cascade::MAX_CASCADES;
use crate::error::{Result, ShadowError};

/// Shadow atlas resolution (square, power of two)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AtlasSize {
    Size256,
    Size512,
    Size1024,
    Size2048,
    Size4096,
    Size8192,
}

impl AtlasSize {
    /// Edge length in texels
    pub const fn texels(self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
            Self::Size1024 => 1024,
            Self::Size2048 => 2048,
            Self::Size4096 => 4096,
            Self::Size8192 => 8192,
        }
    }
}

impl Default for AtlasSize {
    fn default() -> Self {
        Self::Size1024
    }
}

impl TryFrom<u32> for AtlasSize {
    type Error = ShadowError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            256 => Ok(Self::Size256),
            512 => Ok(Self::Size512),
            1024 => Ok(Self::Size1024),
            2048 => Ok(Self::Size2048),
            4096 => Ok(Self::Size4096),
            8192 => Ok(Self::Size8192),
            other => Err(ShadowError::UnsupportedAtlasSize(other)),
        }
    }
}

impl From<AtlasSize> for u32 {
    fn from(size: AtlasSize) -> Self {
        size.texels()
    }
}

/// PCF filter quality for directional shadows
///
/// The discriminant doubles as the filter-size multiplier used when shrinking
/// cascade culling spheres, and `index - 1` selects the shader keyword.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowFilter {
    /// Hardware 2x2 comparison only, no keyword enabled
    #[default]
    Pcf2x2 = 0,
    Pcf3x3 = 1,
    Pcf5x5 = 2,
    Pcf7x7 = 3,
}

impl ShadowFilter {
    /// Keyword index in the filter keyword set (-1 disables all)
    pub fn keyword_index(self) -> i32 {
        self as i32 - 1
    }
}

/// Blending between neighbouring cascades
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadeBlendMode {
    /// Hard cut at the cascade boundary, no keyword enabled
    #[default]
    Hard = 0,
    Soft = 1,
    Dither = 2,
}

impl CascadeBlendMode {
    /// Keyword index in the blend keyword set (-1 disables all)
    pub fn keyword_index(self) -> i32 {
        self as i32 - 1
    }
}

/// Directional light shadow settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalShadowSettings {
    /// Shared atlas resolution
    pub atlas_size: AtlasSize,

    /// PCF filter quality
    pub filter: ShadowFilter,

    /// Cascades per light (1-4)
    pub cascade_count: u32,

    /// Cascade shell boundaries as fractions of the shadow distance
    pub cascade_ratios: [f32; 3],

    /// Fade width of the last cascade (0-1)
    pub cascade_fade: f32,

    /// How neighbouring cascades are blended
    pub cascade_blend: CascadeBlendMode,
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: AtlasSize::Size1024,
            filter: ShadowFilter::Pcf2x2,
            cascade_count: 4,
            cascade_ratios: [0.1, 0.25, 0.5],
            cascade_fade: 0.1,
            cascade_blend: CascadeBlendMode::Hard,
        }
    }
}

impl DirectionalShadowSettings {
    /// Cascade ratios packed for the culling provider
    pub fn cascade_ratios_vec(&self) -> Vec3 {
        Vec3::from_array(self.cascade_ratios)
    }

    /// Culling factor attached to every cascade split
    ///
    /// Lets the scene culler keep casters slightly past the cascade boundary
    /// so blended cascades do not pop.
    pub fn cascade_fade_culling_factor(&self) -> f32 {
        (0.8 - self.cascade_fade).max(0.0)
    }
}

/// Global shadow settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Maximum shadow distance from the camera
    pub max_distance: f32,

    /// Fraction of the max distance over which shadows fade out
    pub distance_fade: f32,

    /// Directional light settings
    pub directional: DirectionalShadowSettings,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            distance_fade: 0.1,
            directional: DirectionalShadowSettings::default(),
        }
    }
}

impl ShadowSettings {
    /// Cheap settings for low-end targets
    pub fn low_quality() -> Self {
        Self {
            max_distance: 50.0,
            directional: DirectionalShadowSettings {
                atlas_size: AtlasSize::Size1024,
                cascade_count: 2,
                cascade_ratios: [0.3, 0.6, 0.9],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Sharp, filtered and blended cascades
    pub fn high_quality() -> Self {
        Self {
            max_distance: 150.0,
            directional: DirectionalShadowSettings {
                atlas_size: AtlasSize::Size4096,
                filter: ShadowFilter::Pcf5x5,
                cascade_count: 4,
                cascade_blend: CascadeBlendMode::Soft,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parse settings from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the invariants the shadow pass relies on
    pub fn validate(&self) -> Result<()> {
        let directional = &self.directional;
        if directional.cascade_count == 0 || directional.cascade_count as usize > MAX_CASCADES {
            return Err(ShadowError::InvalidSettings(format!(
                "cascade_count must be in 1..={}, got {}",
                MAX_CASCADES, directional.cascade_count
            )));
        }

        let ratios = directional.cascade_ratios;
        if ratios.iter().any(|r| !(*r > 0.0 && *r < 1.0)) {
            return Err(ShadowError::InvalidSettings(format!(
                "cascade ratios must lie in (0, 1), got {:?}",
                ratios
            )));
        }
        if ratios.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(ShadowError::InvalidSettings(format!(
                "cascade ratios must be strictly increasing, got {:?}",
                ratios
            )));
        }

        if !(0.0..=1.0).contains(&directional.cascade_fade) {
            return Err(ShadowError::InvalidSettings(format!(
                "cascade_fade must lie in [0, 1], got {}",
                directional.cascade_fade
            )));
        }
        if !(self.max_distance > 0.0) {
            return Err(ShadowError::InvalidSettings(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        if !(self.distance_fade > 0.0) {
            return Err(ShadowError::InvalidSettings(format!(
                "distance_fade must be positive, got {}",
                self.distance_fade
            )));
        }
        Ok(())
    }

    /// Shader-side distance fade parameters
    ///
    /// `x = 1 / max_distance`, `y = 1 / distance_fade`,
    /// `z = 1 / (1 - f^2)` with `f = 1 - cascade_fade`. A zero cascade fade
    /// is a hard cut: the denominator is floored so `z` stays finite.
    pub fn distance_fade_params(&self) -> Vec4 {
        let f = 1.0 - self.directional.cascade_fade;
        Vec4::new(
            1.0 / self.max_distance,
            1.0 / self.distance_fade,
            1.0 / (1.0 - f * f).max(f32::EPSILON),
            0.0,
        )
    }
}
