//! Layer effects built on the shadow engines.
//!
//! Layer effects differ from the raw renderers in that they:
//! - Composite the source image with its shadow
//! - Expand the canvas and report where the source landed

pub mod drop_shadow;

pub use drop_shadow::{blend_over, drop_shadow, DropShadow};
