//! Tabular data types moved between the pipeline stages.

mod batch;
mod cell;

pub use batch::{Batch, TableRow};
pub use cell::{Cell, TIMESTAMP_FORMAT};
