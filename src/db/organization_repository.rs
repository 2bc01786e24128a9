use async_trait::async_trait;
use uuid::Uuid;

use crate::models::organization::{Organization, OrganizationMembership};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
        logo_url: Option<&str>,
    ) -> Result<Organization, sqlx::Error>;

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, sqlx::Error>;

    async fn list_organizations(&self) -> Result<Vec<Organization>, sqlx::Error>;

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error>;

    async fn list_memberships_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error>;

    async fn list_members(&self, org_id: Uuid)
        -> Result<Vec<OrganizationMembership>, sqlx::Error>;

    /// Adds the user to the organization, or returns the existing membership.
    /// The user's first membership is created as primary.
    async fn add_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<OrganizationMembership, sqlx::Error>;

    /// Returns `false` when there was nothing to remove. Removing the primary
    /// membership promotes the user's earliest remaining one.
    async fn remove_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Unsets every other primary flag of the user and sets it on
    /// `membership_id` as one atomic unit. Returns `None`, with nothing
    /// changed, when the membership is not the user's; otherwise the user's
    /// memberships after the change.
    async fn set_primary_membership(
        &self,
        user_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Vec<OrganizationMembership>>, sqlx::Error>;
}
