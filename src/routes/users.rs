use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{
        allowed_invite_roles, can_assign_role, can_create_in, can_invite_users,
        can_mutate_profile, can_view_profile, AccessError,
    },
    models::{
        organization::OrganizationMembership,
        user::{NewInvitedProfile, Profile, Role},
    },
    responses::JsonResponse,
    routes::{
        auth::session::AuthSession,
        helpers::{
            find_target_profile, is_unique_violation, load_context, memberships_of, storage_error,
        },
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
struct UserListEntry {
    #[serde(flatten)]
    profile: Profile,
    memberships: Vec<OrganizationMembership>,
    can_edit: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMePayload {
    /// Absent leaves the name unchanged; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub full_name: Option<Option<String>>,
    #[serde(default)]
    pub mark_onboarded: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRolePayload {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetActivePayload {
    pub is_active: bool,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

fn normalize_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

pub async fn list_users(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let profiles = match app_state.users.list_profiles().await {
        Ok(profiles) => profiles,
        Err(err) => return storage_error("failed to list profiles", err),
    };

    let ids: Vec<Uuid> = profiles.iter().map(|p| p.id).collect();
    let memberships = match app_state.organizations.list_memberships_for_users(&ids).await {
        Ok(memberships) => memberships,
        Err(err) => return storage_error("failed to list memberships", err),
    };

    let mut by_user: HashMap<Uuid, Vec<OrganizationMembership>> = HashMap::new();
    for membership in memberships {
        by_user.entry(membership.user_id).or_default().push(membership);
    }

    let users: Vec<UserListEntry> = profiles
        .into_iter()
        .filter_map(|profile| {
            let memberships = by_user.remove(&profile.id).unwrap_or_default();
            if !can_view_profile(&ctx.actor, &profile, &memberships) {
                return None;
            }
            let can_edit = can_mutate_profile(&ctx.actor, &profile, &memberships);
            Some(UserListEntry {
                profile,
                memberships,
                can_edit,
            })
        })
        .collect();

    Json(json!({ "success": true, "users": users })).into_response()
}

pub async fn invite_roles(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    Json(json!({
        "success": true,
        "roles": allowed_invite_roles(&ctx.actor),
    }))
    .into_response()
}

pub async fn invite_user(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<NewInvitedProfile>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_invite_users(&ctx.actor) {
        return AccessError::forbidden("You are not allowed to invite users").into_response();
    }
    if !allowed_invite_roles(&ctx.actor).contains(&payload.role) {
        tracing::warn!(
            actor = %ctx.actor.user_id,
            actor_role = %ctx.actor.role,
            requested = %payload.role,
            "invite with disallowed role rejected"
        );
        return AccessError::forbidden("You cannot invite users with this role").into_response();
    }
    if !can_create_in(&ctx.actor, payload.org_id) {
        return AccessError::forbidden("You can only invite users into your own organizations")
            .into_response();
    }

    let Some(email) = normalize_email(&payload.email) else {
        return JsonResponse::bad_request("A valid email address is required").into_response();
    };

    if let Some(org_id) = payload.org_id {
        match app_state.organizations.find_organization(org_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return JsonResponse::not_found("Organization not found").into_response(),
            Err(err) => return storage_error("failed to load organization", err),
        }
    }

    match app_state.users.find_profile_by_email(&email).await {
        Ok(Some(_)) => {
            return JsonResponse::conflict("A user with this email already exists").into_response()
        }
        Ok(None) => {}
        Err(err) => return storage_error("failed to look up invitee", err),
    }

    let invite = NewInvitedProfile {
        email,
        full_name: normalize_name(payload.full_name.as_deref()),
        role: payload.role,
        org_id: payload.org_id,
    };

    match app_state.users.create_invited_profile(&invite).await {
        Ok(profile) => {
            tracing::info!(
                invited_by = %ctx.actor.user_id,
                user_id = %profile.id,
                role = %profile.role,
                org_id = ?invite.org_id,
                "user invited"
            );
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "user": profile })),
            )
                .into_response()
        }
        Err(err) if is_unique_violation(&err) => {
            JsonResponse::conflict("A user with this email already exists").into_response()
        }
        Err(err) => storage_error("failed to create invited profile", err),
    }
}

pub async fn update_me(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<UpdateMePayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_mutate_profile(&ctx.actor, &ctx.profile, &ctx.memberships) {
        return AccessError::forbidden("You cannot edit this profile").into_response();
    }

    let mut profile = ctx.profile;
    if let Some(raw) = payload.full_name {
        let full_name = normalize_name(raw.as_deref());
        profile = match app_state
            .users
            .update_full_name(profile.id, full_name.as_deref())
            .await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => return JsonResponse::not_found("User not found").into_response(),
            Err(err) => return storage_error("failed to update profile", err),
        };
    }

    if payload.mark_onboarded && !profile.is_onboarded {
        profile = match app_state.users.mark_onboarded(profile.id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return JsonResponse::not_found("User not found").into_response(),
            Err(err) => return storage_error("failed to mark onboarding", err),
        };
    }

    Json(json!({ "success": true, "user": profile })).into_response()
}

pub async fn update_role(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if user_id == ctx.actor.user_id {
        return AccessError::forbidden("You cannot change your own role").into_response();
    }

    let target = match find_target_profile(&app_state, user_id).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    let target_memberships = match memberships_of(&app_state, user_id).await {
        Ok(memberships) => memberships,
        Err(resp) => return resp,
    };

    if !can_mutate_profile(&ctx.actor, &target, &target_memberships)
        || !can_assign_role(&ctx.actor, Some(target.role), payload.role)
    {
        return AccessError::forbidden("You cannot assign this role").into_response();
    }

    match app_state.users.update_role(user_id, payload.role).await {
        Ok(Some(profile)) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                %user_id,
                from = %target.role,
                to = %profile.role,
                "role changed"
            );
            Json(json!({ "success": true, "user": profile })).into_response()
        }
        Ok(None) => JsonResponse::not_found("User not found").into_response(),
        Err(err) => storage_error("failed to update role", err),
    }
}

/// Profiles are deactivated rather than deleted.
pub async fn set_active(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetActivePayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if user_id == ctx.actor.user_id {
        return AccessError::forbidden("You cannot change your own active status").into_response();
    }

    let target = match find_target_profile(&app_state, user_id).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    let target_memberships = match memberships_of(&app_state, user_id).await {
        Ok(memberships) => memberships,
        Err(resp) => return resp,
    };

    // Managing a user's status requires authority over their current role.
    if !can_mutate_profile(&ctx.actor, &target, &target_memberships)
        || !can_assign_role(&ctx.actor, Some(target.role), target.role)
    {
        return AccessError::forbidden("You cannot manage this user").into_response();
    }

    match app_state.users.set_active(user_id, payload.is_active).await {
        Ok(Some(profile)) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                %user_id,
                is_active = profile.is_active,
                "active status changed"
            );
            Json(json!({ "success": true, "user": profile })).into_response()
        }
        Ok(None) => JsonResponse::not_found("User not found").into_response(),
        Err(err) => storage_error("failed to update active status", err),
    }
}
