use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::organization::{Organization, OrganizationMembership};

use super::organization_repository::OrganizationRepository;

const MEMBERSHIP_COLUMNS: &str = "id, user_id, org_id, is_primary, created_at";

pub struct PostgresOrganizationRepository {
    pub pool: PgPool,
}

/// Serializes membership changes for one user. Every writer of a user's
/// memberships takes this row lock first, so concurrent primary swaps and
/// removals queue behind each other.
async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(())
}

async fn memberships_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
    sqlx::query_as::<_, OrganizationMembership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM organization_memberships
         WHERE user_id = $1
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    async fn create_organization(
        &self,
        name: &str,
        slug: &str,
        logo_url: Option<&str>,
    ) -> Result<Organization, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug, logo_url, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            RETURNING id, name, slug, logo_url, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(logo_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_organization(&self, org_id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, logo_url, created_at, updated_at FROM organizations WHERE id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, logo_url, created_at, updated_at FROM organizations ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationMembership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM organization_memberships
             WHERE user_id = $1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_memberships_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationMembership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM organization_memberships
             WHERE user_id = ANY($1)
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await
    }

    async fn list_members(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<OrganizationMembership>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationMembership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM organization_memberships
             WHERE org_id = $1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn add_membership(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<OrganizationMembership, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        // The no-op update makes RETURNING yield the existing row on conflict.
        let membership = sqlx::query_as::<_, OrganizationMembership>(&format!(
            r#"
            INSERT INTO organization_memberships (user_id, org_id, is_primary, created_at)
            VALUES (
                $1,
                $2,
                NOT EXISTS (
                    SELECT 1 FROM organization_memberships WHERE user_id = $1 AND is_primary
                ),
                now()
            )
            ON CONFLICT (user_id, org_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    async fn remove_membership(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let removed: Option<(bool,)> = sqlx::query_as(
            r#"
            DELETE FROM organization_memberships
            WHERE user_id = $1 AND org_id = $2
            RETURNING is_primary
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((was_primary,)) = removed else {
            tx.rollback().await?;
            return Ok(false);
        };

        if was_primary {
            sqlx::query(
                r#"
                UPDATE organization_memberships
                SET is_primary = true
                WHERE id = (
                    SELECT id FROM organization_memberships
                    WHERE user_id = $1
                    ORDER BY created_at ASC, id ASC
                    LIMIT 1
                )
                "#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn set_primary_membership(
        &self,
        user_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Vec<OrganizationMembership>>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let owned: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM organization_memberships WHERE id = $1 AND user_id = $2",
        )
        .bind(membership_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        // Unset first: the unique index on primary memberships is not deferrable.
        sqlx::query(
            r#"
            UPDATE organization_memberships
            SET is_primary = false
            WHERE user_id = $1 AND is_primary AND id <> $2
            "#,
        )
        .bind(user_id)
        .bind(membership_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE organization_memberships SET is_primary = true WHERE id = $1")
            .bind(membership_id)
            .execute(&mut *tx)
            .await?;

        let memberships = memberships_in_tx(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(Some(memberships))
    }
}
