//! Backend implementations
//!
//! This module contains the drawing-surface trait the server renders through
//! and the null implementation used when no display is attached.

mod r#trait;
pub use r#trait::*;

pub mod null;

