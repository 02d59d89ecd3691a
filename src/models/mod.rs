//! Display-ready data shapes returned by the virtual filesystem.
//!
//! Everything here is a read-through projection of remote bucket state:
//! built per call, serialized to the caller as JSON via `serde`, never
//! persisted or mutated in place. The object store is the sole source of
//! truth.

pub mod entry;
pub mod metadata;
pub mod preview;
