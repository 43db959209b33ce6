//! Long-form text narration over a platform speech engine.

pub mod config;
pub mod logging;
pub mod narration;
