pub mod projects;
pub mod task_meta;
pub mod tasks;
