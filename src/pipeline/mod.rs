pub mod extraction;
pub mod intake;
pub mod recognition;
pub mod routing;
pub mod suggestion;

pub use intake::{IntakePipeline, PipelineError, SubmitReport};
