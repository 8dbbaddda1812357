//! Error types for the shadow system

use thiserror::Error;

use crate::pass::ShadowPassState;

/// Shadow system errors
///
/// Rejected reservations are not errors: a light that loses the capacity
/// race or has no casters simply casts no shadow this frame.
#[derive(Debug, Error)]
pub enum ShadowError {
    /// Atlas resolution outside the supported power-of-two set
    #[error("Unsupported shadow atlas size: {0}")]
    UnsupportedAtlasSize(u32),

    /// Settings rejected while loading configuration
    #[error("Invalid shadow settings: {0}")]
    InvalidSettings(String),

    /// Settings document could not be parsed
    #[error("Failed to parse shadow settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// Frame operation called out of order
    #[error("Cannot {operation} while the shadow pass is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ShadowPassState,
    },
}

/// Result type for shadow operations
pub type Result<T> = std::result::Result<T, ShadowError>;
