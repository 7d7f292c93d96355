//! Application services: origin access, tree resolution and rendering.

pub mod error;
pub mod fetcher;
pub mod render;
pub mod source;
