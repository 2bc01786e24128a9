use std::borrow::Cow;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::error::{DatabaseError, ErrorKind};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    organization_repository::OrganizationRepository, task_repository::TaskRepository,
    user_repository::UserRepository, workstream_repository::WorkstreamRepository,
};
use crate::models::{
    organization::{Organization, OrganizationMembership},
    task::{NewTask, Task, TaskStatus},
    user::{NewInvitedProfile, Profile, Role},
    workstream::{NewWorkstream, Workstream, WorkstreamCounts},
};

/// In-memory store implementing every repository. Each operation runs under
/// a single lock, which gives the same all-or-nothing behaviour the Postgres
/// transactions provide.
#[derive(Default)]
pub struct MockDb {
    pub should_fail: bool,
    pub profiles: Mutex<Vec<Profile>>,
    pub organizations: Mutex<Vec<Organization>>,
    pub memberships: Mutex<Vec<OrganizationMembership>>,
    pub tasks: Mutex<Vec<Task>>,
    pub workstreams: Mutex<Vec<Workstream>>,
}

fn mock_failure() -> sqlx::Error {
    sqlx::Error::Protocol("Mock DB failure".into())
}

#[derive(Debug)]
struct UniqueViolation(&'static str);

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
    }
}

impl std::error::Error for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.0)
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation(constraint)))
}

impl MockDb {
    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            Err(mock_failure())
        } else {
            Ok(())
        }
    }

    pub fn seed_profile(&self, role: Role, email: &str) -> Profile {
        let now = OffsetDateTime::now_utc();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            role,
            is_active: true,
            is_onboarded: true,
            org_id: None,
            created_at: now,
            updated_at: now,
        };
        self.profiles.lock().unwrap().push(profile.clone());
        profile
    }

    pub fn seed_organization(&self, name: &str) -> Organization {
        let now = OffsetDateTime::now_utc();
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: crate::models::organization::slugify(name),
            logo_url: None,
            created_at: now,
            updated_at: now,
        };
        self.organizations.lock().unwrap().push(org.clone());
        org
    }

    /// Inserts a membership verbatim, without any primary bookkeeping, so
    /// tests can construct inconsistent states.
    pub fn seed_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        is_primary: bool,
    ) -> OrganizationMembership {
        let mut memberships = self.memberships.lock().unwrap();
        // Strictly increasing timestamps keep ordering deterministic.
        let created_at = OffsetDateTime::now_utc()
            + time::Duration::microseconds(memberships.len() as i64);
        let membership = OrganizationMembership {
            id: Uuid::new_v4(),
            user_id,
            org_id,
            is_primary,
            created_at,
        };
        memberships.push(membership.clone());
        membership
    }

    pub fn seed_task(&self, org_id: Option<Uuid>, created_by: Uuid) -> Task {
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: Uuid::new_v4(),
            org_id,
            workstream_id: None,
            title: "Collect signed SOW".into(),
            description: None,
            status: TaskStatus::Todo,
            created_by,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().unwrap().push(task.clone());
        task
    }

    pub fn seed_workstream(
        &self,
        org_id: Option<Uuid>,
        created_by: Uuid,
        counts: (i32, i32, i32),
    ) -> Workstream {
        let now = OffsetDateTime::now_utc();
        let stream = Workstream {
            id: Uuid::new_v4(),
            org_id,
            name: "Implementation".into(),
            red_count: counts.0,
            yellow_count: counts.1,
            green_count: counts.2,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.workstreams.lock().unwrap().push(stream.clone());
        stream
    }

    pub fn memberships_of(&self, user_id: Uuid) -> Vec<OrganizationMembership> {
        let mut list: Vec<_> = self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|m| (m.created_at, m.id));
        list
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == user_id)
            .cloned()
    }

    fn update_profile<F>(&self, user_id: Uuid, apply: F) -> Result<Option<Profile>, sqlx::Error>
    where
        F: FnOnce(&mut Profile),
    {
        self.check()?;
        let mut profiles = self.profiles.lock().unwrap();
        Ok(profiles.iter_mut().find(|p| p.id == user_id).map(|p| {
            apply(p);
            p.updated_at = OffsetDateTime::now_utc();
            p.clone()
        }))
    }
}

fn in_scope(org_id: Option<Uuid>, org_ids: Option<&[Uuid]>) -> bool {
    match org_ids {
        None => true,
        Some(ids) => org_id.is_some_and(|id| ids.contains(&id)),
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        self.check()?;
        Ok(self.profile(user_id))
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, sqlx::Error> {
        self.check()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, sqlx::Error> {
        self.check()?;
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn create_invited_profile(
        &self,
        invite: &NewInvitedProfile,
    ) -> Result<Profile, sqlx::Error> {
        self.check()?;
        let mut profiles = self.profiles.lock().unwrap();
        let email = invite.email.trim();
        if profiles.iter().any(|p| p.email.eq_ignore_ascii_case(email)) {
            return Err(unique_violation("profiles_email_key"));
        }
        let now = OffsetDateTime::now_utc();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: invite.full_name.clone(),
            role: invite.role,
            is_active: true,
            is_onboarded: false,
            org_id: None,
            created_at: now,
            updated_at: now,
        };
        profiles.push(profile.clone());
        drop(profiles);

        if let Some(org_id) = invite.org_id {
            self.seed_membership(profile.id, org_id, true);
        }
        Ok(profile)
    }

    async fn update_role(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<Profile>, sqlx::Error> {
        self.update_profile(user_id, |p| p.role = role)
    }

    async fn set_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Profile>, sqlx::Error> {
        self.update_profile(user_id, |p| p.is_active = is_active)
    }

    async fn update_full_name(
        &self,
        user_id: Uuid,
        full_name: Option<&str>,
    ) -> Result<Option<Profile>, sqlx::Error> {
        let full_name = full_name.map(str::to_string);
        self.update_profile(user_id, |p| p.full_name = full_name)
    }

    async fn mark_onboarded(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        self.update_profile(user_id, |p| p.is_onboarded = true)
    }
}

#[async_trait]
impl OrganizationRepository for MockDb {
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
        logo_url: Option<&str>,
    ) -> Result<Organization, sqlx::Error> {
        self.check()?;
        let mut orgs = self.organizations.lock().unwrap();
        if orgs.iter().any(|o| o.slug == slug) {
            return Err(unique_violation("organizations_slug_key"));
        }
        let now = OffsetDateTime::now_utc();
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
            logo_url: logo_url.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        orgs.push(org.clone());
        Ok(org)
    }

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
        self.check()?;
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == org_id)
            .cloned())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, sqlx::Error> {
        self.check()?;
        let mut orgs = self.organizations.lock().unwrap().clone();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orgs)
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        self.check()?;
        Ok(self.memberships_of(user_id))
    }

    async fn list_memberships_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        self.check()?;
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| user_ids.contains(&m.user_id))
            .cloned()
            .collect())
    }

    async fn list_members(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        self.check()?;
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn add_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<OrganizationMembership, sqlx::Error> {
        self.check()?;
        let mut memberships = self.memberships.lock().unwrap();
        if let Some(existing) = memberships
            .iter()
            .find(|m| m.user_id == user_id && m.org_id == org_id)
        {
            return Ok(existing.clone());
        }
        let has_primary = memberships
            .iter()
            .any(|m| m.user_id == user_id && m.is_primary);
        let membership = OrganizationMembership {
            id: Uuid::new_v4(),
            user_id,
            org_id,
            is_primary: !has_primary,
            created_at: OffsetDateTime::now_utc()
                + time::Duration::microseconds(memberships.len() as i64),
        };
        memberships.push(membership.clone());
        Ok(membership)
    }

    async fn remove_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut memberships = self.memberships.lock().unwrap();
        let Some(pos) = memberships
            .iter()
            .position(|m| m.user_id == user_id && m.org_id == org_id)
        else {
            return Ok(false);
        };
        let removed = memberships.remove(pos);
        if removed.is_primary {
            if let Some(next) = memberships
                .iter_mut()
                .filter(|m| m.user_id == user_id)
                .min_by_key(|m| (m.created_at, m.id))
            {
                next.is_primary = true;
            }
        }
        Ok(true)
    }

    async fn set_primary_membership(
        &self,
        user_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Vec<OrganizationMembership>>, sqlx::Error> {
        self.check()?;
        let mut memberships = self.memberships.lock().unwrap();
        if !memberships
            .iter()
            .any(|m| m.id == membership_id && m.user_id == user_id)
        {
            return Ok(None);
        }
        for m in memberships.iter_mut().filter(|m| m.user_id == user_id) {
            m.is_primary = m.id == membership_id;
        }
        let mut mine: Vec<_> = memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by_key(|m| (m.created_at, m.id));
        Ok(Some(mine))
    }
}

#[async_trait]
impl TaskRepository for MockDb {
    async fn list_tasks(&self, org_ids: Option<&[Uuid]>) -> Result<Vec<Task>, sqlx::Error> {
        self.check()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| in_scope(t.org_id, org_ids))
            .cloned()
            .collect())
    }

    async fn find_task(&self, task_id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        self.check()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned())
    }

    async fn create_task(&self, task: &NewTask, created_by: Uuid) -> Result<Task, sqlx::Error> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let created = Task {
            id: Uuid::new_v4(),
            org_id: task.org_id,
            workstream_id: task.workstream_id,
            title: task.title.trim().to_string(),
            description: task.description.clone(),
            status: TaskStatus::Todo,
            created_by,
            assigned_to: task.assigned_to,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, sqlx::Error> {
        self.check()?;
        let mut tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter_mut().find(|t| t.id == task_id).map(|t| {
            t.status = status;
            t.updated_at = OffsetDateTime::now_utc();
            t.clone()
        }))
    }

    async fn update_task_assignee(
        &self,
        task_id: Uuid,
        assigned_to: Option<Uuid>,
    ) -> Result<Option<Task>, sqlx::Error> {
        self.check()?;
        let mut tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter_mut().find(|t| t.id == task_id).map(|t| {
            t.assigned_to = assigned_to;
            t.updated_at = OffsetDateTime::now_utc();
            t.clone()
        }))
    }
}

#[async_trait]
impl WorkstreamRepository for MockDb {
    async fn list_workstreams(
        &self,
        org_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Workstream>, sqlx::Error> {
        self.check()?;
        Ok(self
            .workstreams
            .lock()
            .unwrap()
            .iter()
            .filter(|w| in_scope(w.org_id, org_ids))
            .cloned()
            .collect())
    }

    async fn find_workstream(
        &self,
        workstream_id: Uuid,
    ) -> Result<Option<Workstream>, sqlx::Error> {
        self.check()?;
        Ok(self
            .workstreams
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.id == workstream_id)
            .cloned())
    }

    async fn create_workstream(
        &self,
        workstream: &NewWorkstream,
        created_by: Uuid,
    ) -> Result<Workstream, sqlx::Error> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let created = Workstream {
            id: Uuid::new_v4(),
            org_id: workstream.org_id,
            name: workstream.name.trim().to_string(),
            red_count: workstream.red_count,
            yellow_count: workstream.yellow_count,
            green_count: workstream.green_count,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.workstreams.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_counts(
        &self,
        workstream_id: Uuid,
        counts: WorkstreamCounts,
    ) -> Result<Option<Workstream>, sqlx::Error> {
        self.check()?;
        let mut streams = self.workstreams.lock().unwrap();
        Ok(streams.iter_mut().find(|w| w.id == workstream_id).map(|w| {
            w.red_count = counts.red_count;
            w.yellow_count = counts.yellow_count;
            w.green_count = counts.green_count;
            w.updated_at = OffsetDateTime::now_utc();
            w.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_membership_becomes_primary() {
        let db = MockDb::default();
        let user = Uuid::new_v4();

        let first = db.add_membership(user, Uuid::new_v4()).await.unwrap();
        let second = db.add_membership(user, Uuid::new_v4()).await.unwrap();

        assert!(first.is_primary);
        assert!(!second.is_primary);
    }

    #[tokio::test]
    async fn duplicate_membership_returns_existing_row() {
        let db = MockDb::default();
        let (user, org) = (Uuid::new_v4(), Uuid::new_v4());

        let first = db.add_membership(user, org).await.unwrap();
        let again = db.add_membership(user, org).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(db.memberships_of(user).len(), 1);
    }

    #[tokio::test]
    async fn removing_primary_promotes_earliest_remaining() {
        let db = MockDb::default();
        let user = Uuid::new_v4();
        let primary = db.add_membership(user, Uuid::new_v4()).await.unwrap();
        let next = db.add_membership(user, Uuid::new_v4()).await.unwrap();
        db.add_membership(user, Uuid::new_v4()).await.unwrap();

        assert!(db.remove_membership(user, primary.org_id).await.unwrap());

        let remaining = db.memberships_of(user);
        assert_eq!(remaining.len(), 2);
        let primaries: Vec<_> = remaining.iter().filter(|m| m.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, next.id);
    }

    #[tokio::test]
    async fn removing_unknown_membership_is_a_noop() {
        let db = MockDb::default();
        assert!(!db
            .remove_membership(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn invited_profile_gets_primary_membership() {
        let db = MockDb::default();
        let org = Uuid::new_v4();
        let profile = db
            .create_invited_profile(&NewInvitedProfile {
                email: "new@client.com".into(),
                full_name: Some("New Client".into()),
                role: Role::Client,
                org_id: Some(org),
            })
            .await
            .unwrap();

        assert!(!profile.is_onboarded);
        let memberships = db.memberships_of(profile.id);
        assert_eq!(memberships.len(), 1);
        assert!(memberships[0].is_primary);
        assert_eq!(memberships[0].org_id, org);
    }

    #[tokio::test]
    async fn failing_db_propagates_errors() {
        let db = MockDb {
            should_fail: true,
            ..Default::default()
        };
        assert!(db.list_profiles().await.is_err());
        assert!(db
            .set_primary_membership(Uuid::new_v4(), Uuid::new_v4())
            .await
            .is_err());
    }
}
