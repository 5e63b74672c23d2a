pub mod error;
pub mod project;
pub mod remote;
pub mod task;
pub mod task_meta;

pub use error::CoreError;
pub use project::{Project, TaskSource};
pub use remote::{RemoteBoard, RemoteCard, RemoteCredential, RemoteLabel, RemoteList};
pub use task::{Priority, Status, Task};
pub use task_meta::{RemoteState, TaskMeta};
