use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::workstream::{NewWorkstream, Workstream, WorkstreamCounts};

use super::workstream_repository::WorkstreamRepository;

const WORKSTREAM_COLUMNS: &str = "id, org_id, name, red_count, yellow_count, green_count, \
                                  created_by, created_at, updated_at";

pub struct PostgresWorkstreamRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WorkstreamRepository for PostgresWorkstreamRepository {
    async fn list_workstreams(
        &self,
        org_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Workstream>, sqlx::Error> {
        sqlx::query_as::<_, Workstream>(&format!(
            r#"
            SELECT {WORKSTREAM_COLUMNS}
            FROM workstreams
            WHERE $1::uuid[] IS NULL OR org_id = ANY($1)
            ORDER BY name ASC
            "#
        ))
        .bind(org_ids.map(<[Uuid]>::to_vec))
        .fetch_all(&self.pool)
        .await
    }

    async fn find_workstream(
        &self,
        workstream_id: Uuid,
    ) -> Result<Option<Workstream>, sqlx::Error> {
        sqlx::query_as::<_, Workstream>(&format!(
            "SELECT {WORKSTREAM_COLUMNS} FROM workstreams WHERE id = $1"
        ))
        .bind(workstream_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_workstream(
        &self,
        workstream: &NewWorkstream,
        created_by: Uuid,
    ) -> Result<Workstream, sqlx::Error> {
        sqlx::query_as::<_, Workstream>(&format!(
            r#"
            INSERT INTO workstreams (org_id, name, red_count, yellow_count, green_count, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            RETURNING {WORKSTREAM_COLUMNS}
            "#
        ))
        .bind(workstream.org_id)
        .bind(workstream.name.trim())
        .bind(workstream.red_count)
        .bind(workstream.yellow_count)
        .bind(workstream.green_count)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_counts(
        &self,
        workstream_id: Uuid,
        counts: WorkstreamCounts,
    ) -> Result<Option<Workstream>, sqlx::Error> {
        sqlx::query_as::<_, Workstream>(&format!(
            r#"
            UPDATE workstreams
            SET red_count = $2, yellow_count = $3, green_count = $4, updated_at = now()
            WHERE id = $1
            RETURNING {WORKSTREAM_COLUMNS}
            "#
        ))
        .bind(workstream_id)
        .bind(counts.red_count)
        .bind(counts.yellow_count)
        .bind(counts.green_count)
        .fetch_optional(&self.pool)
        .await
    }
}
