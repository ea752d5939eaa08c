//! Configuration types shared by the extract and transform-load stages.

mod base;
mod extractor;
mod layout;
mod loader;
mod retry;
mod storage;

pub use base::ValidationError;
pub use extractor::ExtractorConfig;
pub use layout::LayoutConfig;
pub use loader::LoaderConfig;
pub use retry::RetryConfig;
pub use storage::StorageConfig;
