use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workstream {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub name: String,
    pub red_count: i32,
    pub yellow_count: i32,
    pub green_count: i32,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkstream {
    pub org_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub red_count: i32,
    #[serde(default)]
    pub yellow_count: i32,
    #[serde(default)]
    pub green_count: i32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WorkstreamCounts {
    pub red_count: i32,
    pub yellow_count: i32,
    pub green_count: i32,
}

impl WorkstreamCounts {
    pub fn is_valid(&self) -> bool {
        self.red_count >= 0 && self.yellow_count >= 0 && self.green_count >= 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RagTotals {
    pub red: i64,
    pub yellow: i64,
    pub green: i64,
    pub total: i64,
}

impl RagTotals {
    fn add(&mut self, stream: &Workstream) {
        let red = i64::from(stream.red_count);
        let yellow = i64::from(stream.yellow_count);
        let green = i64::from(stream.green_count);
        self.red += red;
        self.yellow += yellow;
        self.green += green;
        self.total += red + yellow + green;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkstreamRollup {
    pub overall: RagTotals,
    /// Keyed by organization; untagged workstreams only count toward `overall`.
    pub by_organization: BTreeMap<Uuid, RagTotals>,
    pub workstream_count: usize,
}

impl WorkstreamRollup {
    pub fn from_workstreams<'a, I>(streams: I) -> Self
    where
        I: IntoIterator<Item = &'a Workstream>,
    {
        let mut rollup = WorkstreamRollup::default();
        for stream in streams {
            rollup.overall.add(stream);
            if let Some(org_id) = stream.org_id {
                rollup.by_organization.entry(org_id).or_default().add(stream);
            }
            rollup.workstream_count += 1;
        }
        rollup
    }
}
