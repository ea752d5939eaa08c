mod coordinator;
mod report;

pub use coordinator::PublishCoordinator;
pub use report::{FailedFile, ProcessedFile, PublishStage, RunReport};
