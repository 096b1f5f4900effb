//! Error taxonomy shared by every shadow renderer.
//!
//! Errors are raised before any pixel is read or written, so a failed call
//! never leaves a partially rendered destination behind.

use thiserror::Error;

/// All errors produced by the shadow engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShadowError {
    /// Invalid shadow attributes, kernel definition or approximation table.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source region, destination buffer or in-place margin is too small.
    #[error("bounds error: {0}")]
    Bounds(String),

    /// The renderer does not support the requested call shape.
    #[error("{renderer} does not support {operation}")]
    Unsupported {
        renderer: &'static str,
        operation: &'static str,
    },
}

impl ShadowError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ShadowError::Config(msg.into())
    }

    pub(crate) fn bounds(msg: impl Into<String>) -> Self {
        ShadowError::Bounds(msg.into())
    }

    /// True for [`ShadowError::Bounds`].
    pub fn is_bounds(&self) -> bool {
        matches!(self, ShadowError::Bounds(_))
    }

    /// True for [`ShadowError::Config`].
    pub fn is_config(&self) -> bool {
        matches!(self, ShadowError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ShadowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let err = ShadowError::bounds("dst width 4 < 10");
        assert_eq!(err.to_string(), "bounds error: dst width 4 < 10");
        assert!(err.is_bounds());

        let err = ShadowError::Unsupported {
            renderer: "GaussianShadowRenderer",
            operation: "apply_shadow",
        };
        assert_eq!(
            err.to_string(),
            "GaussianShadowRenderer does not support apply_shadow"
        );
        assert!(!err.is_config());
    }
}
