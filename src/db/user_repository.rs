use async_trait::async_trait;
use uuid::Uuid;

use crate::models::user::{NewInvitedProfile, Profile, Role};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error>;

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, sqlx::Error>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, sqlx::Error>;

    /// Creates the profile and, when `org_id` is set, its first (primary)
    /// membership in the same transaction.
    async fn create_invited_profile(
        &self,
        invite: &NewInvitedProfile,
    ) -> Result<Profile, sqlx::Error>;

    async fn update_role(&self, user_id: Uuid, role: Role)
        -> Result<Option<Profile>, sqlx::Error>;

    async fn set_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Profile>, sqlx::Error>;

    async fn update_full_name(
        &self,
        user_id: Uuid,
        full_name: Option<&str>,
    ) -> Result<Option<Profile>, sqlx::Error>;

    async fn mark_onboarded(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error>;
}
