//! GPU Command Interface
//!
//! The shadow pass never talks to a graphics API. It records
//! [`ShadowCommand`]s into a named [`CommandBuffer`] and hands the buffer to
//! a [`RenderContext`] whenever the GPU needs to observe the recorded state,
//! which is before every caster draw and at the end of the pass.
//!
//! # Command Types
//!
//! - Resources: temporary atlas allocation and release
//! - Raster state: render target, clear, viewport, view/projection, depth bias
//! - Shader globals: ints, vectors, vector/matrix arrays, keywords
//! - Profiling: begin/end sample markers

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

use crate::atlas::TileRect;
use crate::cascade::ShadowSplitData;
use crate::params::PropertyId;

/// Texture filtering of the atlas when sampled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtlasFilterMode {
    Point,
    #[default]
    Bilinear,
}

/// Atlas texel format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtlasFormat {
    /// Depth texture sampled with hardware comparison
    #[default]
    Shadowmap,
    Depth,
}

/// Temporary render target descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth_bits: u32,
    pub filter: AtlasFilterMode,
    pub format: AtlasFormat,
}

impl AtlasDescriptor {
    /// Square 32-bit bilinear shadow map
    pub fn shadow_map(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            depth_bits: 32,
            filter: AtlasFilterMode::Bilinear,
            format: AtlasFormat::Shadowmap,
        }
    }
}

/// A recorded GPU command
#[derive(Clone, Debug, PartialEq)]
pub enum ShadowCommand {
    /// Allocate a temporary render target bound to a property
    GetTemporaryRenderTarget {
        id: PropertyId,
        descriptor: AtlasDescriptor,
    },

    /// Bind a render target; prior contents are discarded, new ones stored
    SetRenderTarget { id: PropertyId },

    /// Clear the bound target
    ClearRenderTarget { depth: bool, color: bool },

    /// Restrict rasterization to a tile
    SetViewport(TileRect),

    /// Bind camera matrices for the following draw
    SetViewProjection { view: Mat4, projection: Mat4 },

    /// Global rasterizer depth bias
    SetDepthBias { constant: f32, slope: f32 },

    SetGlobalInt { id: PropertyId, value: i32 },

    SetGlobalVector { id: PropertyId, value: Vec4 },

    SetGlobalVectorArray { id: PropertyId, values: Vec<Vec4> },

    SetGlobalMatrixArray { id: PropertyId, values: Vec<Mat4> },

    /// Enable or disable a global shader keyword
    SetKeyword { keyword: &'static str, enabled: bool },

    /// Release a temporary render target
    ReleaseTemporaryRenderTarget { id: PropertyId },

    /// Open a profiling scope
    BeginSample { name: String },

    /// Close a profiling scope
    EndSample { name: String },
}

impl ShadowCommand {
    /// Check if this command writes a shader global
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::SetGlobalInt { .. }
                | Self::SetGlobalVector { .. }
                | Self::SetGlobalVectorArray { .. }
                | Self::SetGlobalMatrixArray { .. }
                | Self::SetKeyword { .. }
        )
    }
}

/// Named, reusable command list
#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    name: String,
    commands: Vec<ShadowCommand>,
}

impl CommandBuffer {
    /// Create an empty buffer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    /// Buffer name, used for profiling scopes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recorded commands in submission order
    pub fn commands(&self) -> &[ShadowCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop recorded commands, keeping the allocation
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn push(&mut self, command: ShadowCommand) {
        self.commands.push(command);
    }

    pub fn get_temporary_render_target(&mut self, id: PropertyId, descriptor: AtlasDescriptor) {
        self.push(ShadowCommand::GetTemporaryRenderTarget { id, descriptor });
    }

    pub fn set_render_target(&mut self, id: PropertyId) {
        self.push(ShadowCommand::SetRenderTarget { id });
    }

    pub fn clear_render_target(&mut self, depth: bool, color: bool) {
        self.push(ShadowCommand::ClearRenderTarget { depth, color });
    }

    pub fn set_viewport(&mut self, rect: TileRect) {
        self.push(ShadowCommand::SetViewport(rect));
    }

    pub fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.push(ShadowCommand::SetViewProjection { view, projection });
    }

    pub fn set_depth_bias(&mut self, constant: f32, slope: f32) {
        self.push(ShadowCommand::SetDepthBias { constant, slope });
    }

    pub fn set_global_int(&mut self, id: PropertyId, value: i32) {
        self.push(ShadowCommand::SetGlobalInt { id, value });
    }

    pub fn set_global_vector(&mut self, id: PropertyId, value: Vec4) {
        self.push(ShadowCommand::SetGlobalVector { id, value });
    }

    pub fn set_global_vector_array(&mut self, id: PropertyId, values: &[Vec4]) {
        self.push(ShadowCommand::SetGlobalVectorArray {
            id,
            values: values.to_vec(),
        });
    }

    pub fn set_global_matrix_array(&mut self, id: PropertyId, values: &[Mat4]) {
        self.push(ShadowCommand::SetGlobalMatrixArray {
            id,
            values: values.to_vec(),
        });
    }

    pub fn enable_keyword(&mut self, keyword: &'static str) {
        self.push(ShadowCommand::SetKeyword { keyword, enabled: true });
    }

    pub fn disable_keyword(&mut self, keyword: &'static str) {
        self.push(ShadowCommand::SetKeyword { keyword, enabled: false });
    }

    pub fn release_temporary_render_target(&mut self, id: PropertyId) {
        self.push(ShadowCommand::ReleaseTemporaryRenderTarget { id });
    }

    /// Open a profiling scope named after this buffer
    pub fn begin_sample(&mut self) {
        let name = self.name.clone();
        self.push(ShadowCommand::BeginSample { name });
    }

    /// Close the profiling scope named after this buffer
    pub fn end_sample(&mut self) {
        let name = self.name.clone();
        self.push(ShadowCommand::EndSample { name });
    }
}

/// Parameters of one depth-only caster draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowDrawSettings {
    /// Light whose casters are drawn
    pub visible_light_index: usize,

    /// Culling split for the cascade being drawn
    pub split: ShadowSplitData,
}

/// Backend sink for recorded commands and caster draws
pub trait RenderContext {
    /// Execute every command in `buffer`, in order
    fn execute_command_buffer(&mut self, buffer: &CommandBuffer);

    /// Draw the shadow casters of a light into the bound tile
    fn draw_shadows(&mut self, settings: &ShadowDrawSettings);
}

impl<T: RenderContext + ?Sized> RenderContext for &mut T {
    fn execute_command_buffer(&mut self, buffer: &CommandBuffer) {
        (**self).execute_command_buffer(buffer);
    }

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings) {
        (**self).draw_shadows(settings);
    }
}
