//! Dimension tables: surrogate key assignment and persistence.

mod reconcile;
mod store;
mod table;

pub use reconcile::reconcile;
pub use store::{DimensionSnapshot, DimensionStore};
pub use table::{DimensionEntry, DimensionTable, key_column_for};
