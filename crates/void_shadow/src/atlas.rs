//! Shadow Atlas Tiling
//!
//! Maps a linear tile index (light × cascade) to a square region of the
//! shared atlas texture. Allocation is purely positional: a tile's rectangle
//! depends only on its index, the grid split and the atlas size, so nothing
//! is stored between frames.
//!
//! # Atlas Organization
//!
//! The atlas is a single square depth texture cut into a `split × split`
//! grid. Tiles are laid out row-major starting at the origin, so tile
//! `index` lives at column `index % split`, row `index / split`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Grid split for a tile count
///
/// Escalates in powers of two: one tile fills the atlas, up to four share a
/// 2x2 grid, anything larger uses a 4x4 grid.
pub fn grid_split(tile_count: usize) -> u32 {
    if tile_count <= 1 {
        1
    } else if tile_count <= 4 {
        2
    } else {
        4
    }
}

/// Tile rectangle and normalized grid offset for `index`
pub fn tile_rect(index: usize, split: u32, atlas_size: u32) -> AtlasTile {
    let tile_size = atlas_size / split;
    let column = index as u32 % split;
    let row = index as u32 / split;

    AtlasTile {
        index,
        viewport: TileRect {
            x: column * tile_size,
            y: row * tile_size,
            width: tile_size,
            height: tile_size,
        },
        offset: Vec2::new(column as f32, row as f32),
    }
}

/// Integer viewport rectangle inside the atlas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Area in texels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if two rectangles share any texel
    pub fn overlaps(&self, other: &TileRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// One cascade's region of the atlas
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtlasTile {
    /// Linear tile index (light * cascade_count + cascade)
    pub index: usize,

    /// Viewport rectangle in texels
    pub viewport: TileRect,

    /// Grid cell coordinates, in tile units
    pub offset: Vec2,
}

/// Atlas subdivision for one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasLayout {
    /// Total tiles in use (lights * cascades)
    pub tile_count: usize,

    /// Tiles per atlas edge
    pub split: u32,

    /// Tile edge length in texels
    pub tile_size: u32,

    /// Atlas edge length in texels
    pub atlas_size: u32,
}

impl AtlasLayout {
    /// Lay out `tile_count` tiles in an atlas of `atlas_size` texels
    pub fn new(tile_count: usize, atlas_size: u32) -> Self {
        let split = grid_split(tile_count);
        Self {
            tile_count,
            split,
            tile_size: atlas_size / split,
            atlas_size,
        }
    }

    /// Tile at `index`
    pub fn tile(&self, index: usize) -> AtlasTile {
        tile_rect(index, self.split, self.atlas_size)
    }

    /// All tiles in use, in index order
    pub fn tiles(&self) -> impl Iterator<Item = AtlasTile> + '_ {
        (0..self.tile_count).map(move |index| self.tile(index))
    }

    /// Fraction of the atlas covered by used tiles
    pub fn utilization(&self) -> f32 {
        let capacity = (self.split * self.split) as f32;
        self.tile_count as f32 / capacity
    }
}
