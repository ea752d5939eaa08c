//! Two-stage batch pipeline for Chicago taxi trips and hourly weather.
//!
//! The extract stage lands one day of raw JSON per source in the pending area of an
//! [`store::ObjectStore`]. The load stage, driven by [`publish::PublishCoordinator`], turns each
//! pending file into a dated CSV output, keeps the `payment_type` and `company` dimension tables
//! with their surrogate keys up to date and archives the raw file.

pub mod conversions;
pub mod dimension;
pub mod enrich;
pub mod error;
pub mod extract;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod layout;
mod macros;
pub mod policy;
pub mod publish;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
