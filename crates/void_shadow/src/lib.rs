//! Void Shadow - Directional Shadow Atlas
//!
//! Backend-agnostic directional shadow mapping for the forward renderer.
//! Decides which lights cast shadows, packs their cascades into one shared
//! atlas, and produces the atlas-space matrices and shader globals the
//! lighting pass samples with.
//!
//! # Architecture
//!
//! ```text
//!  Lighting::setup
//!        │
//!        ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                 DirectionalShadowPass                 │
//! │  ┌──────────────────┐   ┌──────────────────────────┐  │
//! │  │ Reservation      │   │ per light, per cascade:  │  │
//! │  │ Registry         │──▶│  SceneCulling geometry   │  │
//! │  └──────────────────┘   │  AtlasLayout tile        │  │
//! │                         │  to_atlas_space matrix   │  │
//! │                         └──────────────────────────┘  │
//! └───────────────────────────────────────────────────────┘
//!        │ CommandBuffer flushes, caster draws
//!        ▼
//!   RenderContext (backend)
//! ```
//!
//! - **Settings**: serde-loadable shadow configuration and presets
//! - **Registry**: fixed-capacity light reservations per frame
//! - **Cascade**: cascade shells and shader-side cascade records
//! - **Culling**: scene culling seam plus a frustum-slice provider
//! - **Atlas**: positional tile allocation
//! - **Remap**: clip space to atlas space, either depth convention
//! - **Pass**: the frame state machine that records GPU commands
//!
//! # Example
//!
//! ```ignore
//! use void_shadow::prelude::*;
//!
//! let mut table = PropertyTable::new();
//! let mut lighting = Lighting::new(&mut table, DepthConvention::from_reversed_z(backend_reversed_z));
//!
//! // Every frame
//! lighting.setup(&mut ctx, culling, &settings, &visible_lights)?;
//! // ... opaque and transparent passes sample the atlas ...
//! lighting.cleanup(&mut ctx);
//! ```

pub mod atlas;
pub mod cascade;
pub mod command;
pub mod culling;
pub mod error;
pub mod gpu;
pub mod hooks;
pub mod lighting;
pub mod params;
pub mod pass;
pub mod recording;
pub mod registry;
pub mod remap;
pub mod settings;

pub mod prelude {
    //! Common imports for shadow functionality
    pub use crate::atlas::{grid_split, tile_rect, AtlasLayout, AtlasTile, TileRect};
    pub use crate::cascade::{
        cascade_shell, CascadeRecord, CascadeRequest, CascadeShadowGeometry, ShadowSplitData, MAX_CASCADES,
    };
    pub use crate::command::{AtlasDescriptor, CommandBuffer, RenderContext, ShadowCommand, ShadowDrawSettings};
    pub use crate::culling::{Bounds, CullingCamera, FrustumSceneCulling, SceneCulling};
    pub use crate::error::{Result, ShadowError};
    pub use crate::gpu::GpuShadowUniforms;
    pub use crate::hooks::{NoHooks, ShadowHooks};
    pub use crate::lighting::{LightShadows, LightType, Lighting, VisibleLight, MAX_DIRECTIONAL_LIGHTS};
    pub use crate::params::{LightingProperties, PropertyId, PropertyTable, ShadowProperties};
    pub use crate::pass::{DirectionalShadowPass, ShadowPassState, ShadowPassStats};
    pub use crate::recording::{RecordedEvent, RecordingContext};
    pub use crate::registry::{
        DirectionalShadowData, LightReservationRegistry, RejectReason, ShadowedLightReservation,
        MAX_SHADOWED_DIRECTIONAL_LIGHTS,
    };
    pub use crate::remap::{to_atlas_space, DepthConvention};
    pub use crate::settings::{AtlasSize, CascadeBlendMode, DirectionalShadowSettings, ShadowFilter, ShadowSettings};
}

pub use prelude::*;
