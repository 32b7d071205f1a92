//! Error types for body and shape operations.

use thiserror::Error;

/// Errors that can occur while building or mutating the simulation state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A body's shape list was modified while a step owned it.
    #[error("cannot modify the shapes of body {body} while the world is stepping")]
    ShapesLocked {
        /// Raw id of the locked body.
        body: u32,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid mass.
    #[error("invalid mass: {0} (must be finite and non-negative)")]
    InvalidMass(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Shape geometry that cannot be represented.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Description of what's wrong.
        reason: String,
    },

    /// Body not found in world.
    #[error("body not found: {0}")]
    BodyNotFound(u32),

    /// Shape index out of range for a body.
    #[error("body {body} has no shape at index {index}")]
    ShapeNotFound {
        /// Raw id of the body.
        body: u32,
        /// The requested index.
        index: usize,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Check if this error came from mutating a locked body.
    #[must_use]
    pub fn is_shapes_locked(&self) -> bool {
        matches!(self, Self::ShapesLocked { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidTimestep(_))
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
