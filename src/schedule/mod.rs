pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

pub use registry::TaskRegistry;
pub use types::{Submission, TaskEvent, TaskRecord, TaskSnapshot, TaskState, TaskStats};
