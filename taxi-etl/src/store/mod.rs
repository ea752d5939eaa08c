//! Object storage abstractions.
//!
//! Every component receives the store it works against as an explicit handle, so the same
//! pipeline code runs against the local filesystem in production and an in-memory store in
//! tests.

mod base;
pub mod local;
pub mod memory;

pub use base::ObjectStore;
