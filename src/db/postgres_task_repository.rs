use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::task::{NewTask, Task, TaskStatus};

use super::task_repository::TaskRepository;

const TASK_COLUMNS: &str = "id, org_id, workstream_id, title, description, status, created_by, \
                            assigned_to, created_at, updated_at";

pub struct PostgresTaskRepository {
    pub pool: PgPool,
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn list_tasks(&self, org_ids: Option<&[Uuid]>) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE $1::uuid[] IS NULL OR org_id = ANY($1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(org_ids.map(<[Uuid]>::to_vec))
        .fetch_all(&self.pool)
        .await
    }

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_task(&self, task: &NewTask, created_by: Uuid) -> Result<Task, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (org_id, workstream_id, title, description, status, created_by, assigned_to, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'todo', $5, $6, now(), now())
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.org_id)
        .bind(task.workstream_id)
        .bind(task.title.trim())
        .bind(task.description.as_deref())
        .bind(created_by)
        .bind(task.assigned_to)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_task_assignee(
        &self,
        task_id: Uuid,
        assigned_to: Option<Uuid>,
    ) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET assigned_to = $2, updated_at = now()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(assigned_to)
        .fetch_optional(&self.pool)
        .await
    }
}
