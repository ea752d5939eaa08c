//! Conversions between stored objects and in-memory [`crate::types::Batch`] values.

pub mod csv;
pub mod json;
