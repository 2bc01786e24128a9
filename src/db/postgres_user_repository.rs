use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{NewInvitedProfile, Profile, Role};

use super::user_repository::UserRepository;

const PROFILE_COLUMNS: &str =
    "id, email, full_name, role, is_active, is_onboarded, org_id, created_at, updated_at";

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_invited_profile(
        &self,
        invite: &NewInvitedProfile,
    ) -> Result<Profile, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (email, full_name, role, is_active, is_onboarded, created_at, updated_at)
            VALUES ($1, $2, $3, true, false, now(), now())
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(invite.email.trim())
        .bind(invite.full_name.as_deref())
        .bind(invite.role)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(org_id) = invite.org_id {
            sqlx::query(
                r#"
                INSERT INTO organization_memberships (user_id, org_id, is_primary, created_at)
                VALUES ($1, $2, true, now())
                "#,
            )
            .bind(profile.id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(profile)
    }

    async fn update_role(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET role = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET is_active = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_full_name(
        &self,
        user_id: Uuid,
        full_name: Option<&str>,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET full_name = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(full_name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_onboarded(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET is_onboarded = true, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}
