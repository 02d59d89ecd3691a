//! Core services: path formatting, the virtual filesystem, and preview
//! rendering.

pub mod filesystem;
pub mod path;
pub mod preview;
