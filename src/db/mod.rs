#[cfg(test)]
pub mod mock_db;
pub mod organization_repository;
pub mod postgres_organization_repository;
pub mod postgres_task_repository;
pub mod postgres_user_repository;
pub mod postgres_workstream_repository;
pub mod task_repository;
pub mod user_repository;
pub mod workstream_repository;
