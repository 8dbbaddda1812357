//! In-memory render context
//!
//! Records every submitted command and caster draw in order. Used by the
//! test suite and handy for frame captures.

use glam::{Mat4, Vec4};

use crate::atlas::TileRect;
use crate::command::{AtlasDescriptor, CommandBuffer, RenderContext, ShadowCommand, ShadowDrawSettings};
use crate::params::PropertyId;

/// One observed event
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A command from a flushed buffer
    Command(ShadowCommand),
    /// A shadow caster draw
    Draw(ShadowDrawSettings),
    /// End of a flushed buffer
    Flush { buffer: String },
}

/// Render context that records instead of rendering
#[derive(Clone, Debug, Default)]
pub struct RecordingContext {
    events: Vec<RecordedEvent>,
}

impl RenderContext for RecordingContext {
    fn execute_command_buffer(&mut self, buffer: &CommandBuffer) {
        self.events
            .extend(buffer.commands().iter().cloned().map(RecordedEvent::Command));
        self.events.push(RecordedEvent::Flush {
            buffer: buffer.name().to_string(),
        });
    }

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings) {
        self.events.push(RecordedEvent::Draw(*settings));
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Executed commands in order
    pub fn commands(&self) -> impl Iterator<Item = &ShadowCommand> + '_ {
        self.events.iter().filter_map(|event| match event {
            RecordedEvent::Command(command) => Some(command),
            _ => None,
        })
    }

    /// Caster draws in order
    pub fn draws(&self) -> Vec<ShadowDrawSettings> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    /// Number of flushed buffers
    pub fn flush_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, RecordedEvent::Flush { .. }))
            .count()
    }

    /// Viewports in the order they were set
    pub fn viewports(&self) -> Vec<TileRect> {
        self.commands()
            .filter_map(|command| match command {
                ShadowCommand::SetViewport(rect) => Some(*rect),
                _ => None,
            })
            .collect()
    }

    /// Temporary render target allocations
    pub fn allocations(&self) -> Vec<AtlasDescriptor> {
        self.commands()
            .filter_map(|command| match command {
                ShadowCommand::GetTemporaryRenderTarget { descriptor, .. } => Some(*descriptor),
                _ => None,
            })
            .collect()
    }

    /// Check if any temporary render target was released
    pub fn released_atlas(&self) -> bool {
        self.commands()
            .any(|command| matches!(command, ShadowCommand::ReleaseTemporaryRenderTarget { .. }))
    }

    /// Last value written to an int global
    pub fn global_int(&self, id: PropertyId) -> Option<i32> {
        self.last_command(|command| match command {
            ShadowCommand::SetGlobalInt { id: target, value } if *target == id => Some(*value),
            _ => None,
        })
    }

    /// Last value written to a vector global
    pub fn global_vector(&self, id: PropertyId) -> Option<Vec4> {
        self.last_command(|command| match command {
            ShadowCommand::SetGlobalVector { id: target, value } if *target == id => Some(*value),
            _ => None,
        })
    }

    /// Last value written to a vector array global
    pub fn global_vector_array(&self, id: PropertyId) -> Option<&[Vec4]> {
        self.last_command(|command| match command {
            ShadowCommand::SetGlobalVectorArray { id: target, values } if *target == id => Some(values.as_slice()),
            _ => None,
        })
    }

    /// Last value written to a matrix array global
    pub fn global_matrix_array(&self, id: PropertyId) -> Option<&[Mat4]> {
        self.last_command(|command| match command {
            ShadowCommand::SetGlobalMatrixArray { id: target, values } if *target == id => Some(values.as_slice()),
            _ => None,
        })
    }

    fn last_command<'a, T>(&'a self, f: impl FnMut(&'a ShadowCommand) -> Option<T>) -> Option<T> {
        self.commands().filter_map(f).last()
    }

    /// Current state of a keyword, `None` if never touched
    pub fn keyword_enabled(&self, keyword: &str) -> Option<bool> {
        self.last_command(|command| match command {
            ShadowCommand::SetKeyword { keyword: name, enabled } if *name == keyword => Some(*enabled),
            _ => None,
        })
    }
}
