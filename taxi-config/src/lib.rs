//! Configuration loading and shared configuration types for the taxi ETL workspace.

pub mod environment;
mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
