pub mod organization;
pub mod task;
pub mod user;
pub mod workstream;
