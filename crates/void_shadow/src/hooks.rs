//! Optional callbacks into the shadow pass, for debugging overlays and
//! profilers. Every method defaults to a no-op.

use crate::atlas::AtlasTile;
use crate::pass::ShadowPassStats;
use crate::registry::{DirectionalShadowData, RejectReason};

/// Observer of shadow pass events
pub trait ShadowHooks {
    /// A light was granted an atlas block
    fn on_reserved(&mut self, _visible_light_index: usize, _data: &DirectionalShadowData) {}

    /// A light will cast no shadow this frame
    fn on_rejected(&mut self, _visible_light_index: usize, _reason: RejectReason) {}

    /// A cascade finished drawing into its tile
    fn on_tile_rendered(&mut self, _light_slot: usize, _cascade_index: usize, _tile: &AtlasTile) {}

    /// `render` completed
    fn on_pass_finished(&mut self, _stats: &ShadowPassStats) {}
}

/// Default hooks
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl ShadowHooks for NoHooks {}
