//! Shader-Global Parameter Table
//!
//! Property names are interned once, when a pass is constructed, into a
//! [`PropertyTable`] the caller owns. Passes keep the resulting
//! [`PropertyId`]s and never hash names per frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::CommandBuffer;

/// Interned shader property handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(u32);

impl PropertyId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Name to id interning table
#[derive(Clone, Debug, Default)]
pub struct PropertyTable {
    ids: HashMap<String, PropertyId>,
    names: Vec<String>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing id if already known
    pub fn id(&mut self, name: &str) -> PropertyId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = PropertyId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Look up an already interned name
    pub fn get(&self, name: &str) -> Option<PropertyId> {
        self.ids.get(name).copied()
    }

    /// Name of an interned id
    pub fn name(&self, id: PropertyId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Property ids written by the directional shadow pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowProperties {
    /// Atlas texture binding
    pub atlas: PropertyId,
    /// Atlas-space matrix per light x cascade slot
    pub matrices: PropertyId,
    pub cascade_count: PropertyId,
    /// Culling sphere per cascade (w = squared adjusted radius)
    pub cascade_culling_spheres: PropertyId,
    /// Inverse squared radius and filter size per cascade
    pub cascade_data: PropertyId,
    /// Atlas size and inverse size
    pub atlas_size: PropertyId,
    pub distance_fade: PropertyId,
}

impl ShadowProperties {
    pub fn register(table: &mut PropertyTable) -> Self {
        Self {
            atlas: table.id("directional_shadow_atlas"),
            matrices: table.id("directional_shadow_matrices"),
            cascade_count: table.id("cascade_count"),
            cascade_culling_spheres: table.id("cascade_culling_spheres"),
            cascade_data: table.id("cascade_data"),
            atlas_size: table.id("shadow_atlas_size"),
            distance_fade: table.id("shadow_distance_fade"),
        }
    }
}

/// Property ids written by the directional lighting setup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightingProperties {
    pub light_count: PropertyId,
    pub colors: PropertyId,
    pub directions: PropertyId,
    /// Strength, base tile and normal bias per light slot
    pub shadow_data: PropertyId,
}

impl LightingProperties {
    pub fn register(table: &mut PropertyTable) -> Self {
        Self {
            light_count: table.id("directional_light_count"),
            colors: table.id("directional_light_colors"),
            directions: table.id("directional_light_directions"),
            shadow_data: table.id("directional_light_shadow_data"),
        }
    }
}

/// PCF filter keywords, indexed by `ShadowFilter::keyword_index`
pub const FILTER_KEYWORDS: KeywordSet = KeywordSet::new(&["DIRECTIONAL_PCF3", "DIRECTIONAL_PCF5", "DIRECTIONAL_PCF7"]);

/// Cascade blend keywords, indexed by `CascadeBlendMode::keyword_index`
pub const CASCADE_BLEND_KEYWORDS: KeywordSet = KeywordSet::new(&["CASCADE_BLEND_SOFT", "CASCADE_BLEND_DITHER"]);

/// Mutually exclusive shader keywords
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: &'static [&'static str],
}

impl KeywordSet {
    pub const fn new(keywords: &'static [&'static str]) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        self.keywords
    }

    /// Enable the keyword at `enabled_index` and disable the rest
    ///
    /// Any index outside the set, `-1` in particular, disables every keyword.
    pub fn apply(&self, buffer: &mut CommandBuffer, enabled_index: i32) {
        for (i, keyword) in self.keywords.iter().copied().enumerate() {
            if i as i32 == enabled_index {
                buffer.enable_keyword(keyword);
            } else {
                buffer.disable_keyword(keyword);
            }
        }
    }
}
