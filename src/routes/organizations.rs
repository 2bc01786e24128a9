use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{
        can_manage_organizations, can_view_resource, set_primary_organization, AccessError,
        Scoped,
    },
    models::{
        organization::{NewOrganization, Organization, OrganizationMembership},
        user::Profile,
    },
    responses::JsonResponse,
    routes::{
        auth::session::AuthSession,
        helpers::{find_target_profile, is_unique_violation, load_context, storage_error},
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct AddMemberPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct MemberEntry {
    membership: OrganizationMembership,
    profile: Option<Profile>,
}

async fn find_organization(app_state: &AppState, org_id: Uuid) -> Result<Organization, Response> {
    match app_state.organizations.find_organization(org_id).await {
        Ok(Some(org)) => Ok(org),
        Ok(None) => Err(AccessError::NotFound("Organization").into_response()),
        Err(err) => Err(storage_error("failed to load organization", err)),
    }
}

pub async fn list_organizations(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let organizations: Vec<Organization> = match app_state.organizations.list_organizations().await
    {
        Ok(orgs) => orgs
            .into_iter()
            .filter(|org| can_view_resource(&ctx.actor, &org.scope()))
            .collect(),
        Err(err) => return storage_error("failed to list organizations", err),
    };

    Json(json!({ "success": true, "organizations": organizations })).into_response()
}

pub async fn create_organization(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<NewOrganization>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_manage_organizations(&ctx.actor) {
        return AccessError::forbidden("You are not allowed to create organizations")
            .into_response();
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return JsonResponse::bad_request("Organization name is required").into_response();
    }
    let slug = payload.resolved_slug();
    if slug.is_empty() {
        return JsonResponse::bad_request("Organization slug must contain letters or digits")
            .into_response();
    }
    let logo_url = payload
        .logo_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());

    match app_state
        .organizations
        .create_organization(name, &slug, logo_url)
        .await
    {
        Ok(org) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                org_id = %org.id,
                slug = %org.slug,
                "organization created"
            );
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "organization": org })),
            )
                .into_response()
        }
        Err(err) if is_unique_violation(&err) => {
            JsonResponse::conflict("An organization with this slug already exists").into_response()
        }
        Err(err) => storage_error("failed to create organization", err),
    }
}

pub async fn list_members(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(org_id): Path<Uuid>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let org = match find_organization(&app_state, org_id).await {
        Ok(org) => org,
        Err(resp) => return resp,
    };
    if !can_view_resource(&ctx.actor, &org.scope()) {
        return AccessError::forbidden("You cannot view this organization").into_response();
    }

    let memberships = match app_state.organizations.list_members(org_id).await {
        Ok(memberships) => memberships,
        Err(err) => return storage_error("failed to list members", err),
    };
    let mut profiles: HashMap<Uuid, Profile> = match app_state.users.list_profiles().await {
        Ok(profiles) => profiles.into_iter().map(|p| (p.id, p)).collect(),
        Err(err) => return storage_error("failed to list profiles", err),
    };

    let members: Vec<MemberEntry> = memberships
        .into_iter()
        .map(|membership| MemberEntry {
            profile: profiles.remove(&membership.user_id),
            membership,
        })
        .collect();

    Json(json!({ "success": true, "organization": org, "members": members })).into_response()
}

/// Adds an existing user to an organization.
pub async fn add_member(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<AddMemberPayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_manage_organizations(&ctx.actor) {
        return AccessError::forbidden("You are not allowed to manage organization members")
            .into_response();
    }
    if let Err(resp) = find_organization(&app_state, org_id).await {
        return resp;
    }
    if let Err(resp) = find_target_profile(&app_state, payload.user_id).await {
        return resp;
    }

    match app_state
        .organizations
        .add_membership(payload.user_id, org_id)
        .await
    {
        Ok(membership) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                user_id = %payload.user_id,
                %org_id,
                is_primary = membership.is_primary,
                "member added"
            );
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "membership": membership })),
            )
                .into_response()
        }
        Err(err) => storage_error("failed to add member", err),
    }
}

pub async fn remove_member(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path((org_id, user_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_manage_organizations(&ctx.actor) {
        return AccessError::forbidden("You are not allowed to manage organization members")
            .into_response();
    }

    match app_state
        .organizations
        .remove_membership(user_id, org_id)
        .await
    {
        Ok(true) => {
            tracing::info!(actor = %ctx.actor.user_id, %user_id, %org_id, "member removed");
            JsonResponse::success("Member removed").into_response()
        }
        Ok(false) => JsonResponse::not_found("Membership not found").into_response(),
        Err(err) => storage_error("failed to remove member", err),
    }
}

/// Switches the caller's primary organization.
pub async fn set_primary(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(membership_id): Path<Uuid>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    match set_primary_organization(
        app_state.organizations.as_ref(),
        ctx.actor.user_id,
        membership_id,
    )
    .await
    {
        Ok(membership) => {
            tracing::info!(
                user_id = %ctx.actor.user_id,
                %membership_id,
                org_id = %membership.org_id,
                "primary organization changed"
            );
            Json(json!({ "success": true, "membership": membership })).into_response()
        }
        Err(err) => {
            if matches!(err, AccessError::InvalidMembership { .. }) {
                tracing::warn!(user_id = %ctx.actor.user_id, %membership_id, "{}", err);
            }
            err.into_response()
        }
    }
}
