//! Error types for collision detection and stepping.

use sim2d_types::{ShapeType, SimError};
use thiserror::Error;

/// Errors raised by the broadphase, the narrowphase, or the world.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CollisionError {
    /// No handler is registered for a shape-type pair.
    #[error("no collision handler for {a} vs {b}")]
    UnsupportedPair {
        /// First shape type of the pair.
        a: ShapeType,
        /// Second shape type of the pair.
        b: ShapeType,
    },

    /// The dispatch table does not cover every shape-type pair.
    #[error("collision dispatch table is missing {} pair(s): {}", .missing.len(), format_pairs(.missing))]
    IncompleteDispatch {
        /// The uncovered pairs, in canonical order.
        missing: Vec<(ShapeType, ShapeType)>,
    },

    /// Grid broadphase parameters that cannot form a grid.
    #[error("invalid grid: {reason}")]
    InvalidGrid {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Error from the body or shape layer.
    #[error(transparent)]
    Sim(#[from] SimError),
}

fn format_pairs(pairs: &[(ShapeType, ShapeType)]) -> String {
    pairs
        .iter()
        .map(|(a, b)| format!("{a}-{b}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl CollisionError {
    /// Create an invalid grid error.
    #[must_use]
    pub fn invalid_grid(reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this error reports a dispatch gap.
    #[must_use]
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPair { .. } | Self::IncompleteDispatch { .. }
        )
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidGrid { .. } | Self::InvalidConfig { .. } => true,
            Self::Sim(inner) => inner.is_config_error(),
            _ => false,
        }
    }

    /// Check if a body's shapes were mutated mid-step.
    #[must_use]
    pub fn is_shapes_locked(&self) -> bool {
        matches!(self, Self::Sim(inner) if inner.is_shapes_locked())
    }
}

/// Result type for collision and stepping operations.
pub type Result<T> = std::result::Result<T, CollisionError>;
