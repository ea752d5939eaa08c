//! Tracing setup shared by the pipeline binaries and tests.

pub mod tracing;
