use async_trait::async_trait;
use uuid::Uuid;

use crate::models::workstream::{NewWorkstream, Workstream, WorkstreamCounts};

#[async_trait]
pub trait WorkstreamRepository: Send + Sync {
    /// `None` lists workstreams of every tenant.
    async fn list_workstreams(
        &self,
        org_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Workstream>, sqlx::Error>;

    async fn find_workstream(&self, workstream_id: Uuid)
        -> Result<Option<Workstream>, sqlx::Error>;

    async fn create_workstream(
        &self,
        workstream: &NewWorkstream,
        created_by: Uuid,
    ) -> Result<Workstream, sqlx::Error>;

    async fn update_counts(
        &self,
        workstream_id: Uuid,
        counts: WorkstreamCounts,
    ) -> Result<Option<Workstream>, sqlx::Error>;
}
