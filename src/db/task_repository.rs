use async_trait::async_trait;
use uuid::Uuid;

use crate::models::task::{NewTask, Task, TaskStatus};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// `None` lists tasks of every tenant, including untagged ones.
    async fn list_tasks(&self, org_ids: Option<&[Uuid]>) -> Result<Vec<Task>, sqlx::Error>;

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, sqlx::Error>;

    async fn create_task(&self, task: &NewTask, created_by: Uuid) -> Result<Task, sqlx::Error>;

    async fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, sqlx::Error>;

    async fn update_task_assignee(
        &self,
        task_id: Uuid,
        assigned_to: Option<Uuid>,
    ) -> Result<Option<Task>, sqlx::Error>;
}
