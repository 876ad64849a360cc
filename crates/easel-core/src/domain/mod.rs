//! Domain model (IDs, tasks, errors).

pub mod errors;
pub mod ids;
pub mod task;

pub use errors::{
    ConfigError, CoordinatorError, ProcessError, RenderError, RepositoryError, TransitionError,
};
pub use ids::{PageId, StoryId, TaskId};
pub use task::{IllustrationTask, TaskPriority, TaskStatus, TaskType};
