//! The three lesson processing stages, run through the task registry.

pub mod prompts;
pub mod service;
pub mod types;


pub use service::PipelineService;
pub use types::{StageError, StageKey, StageOutput, StageStatus, SummarySource};
