pub mod claims;
pub mod session;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    access::{allowed_invite_roles, can_invite_users, resolve_primary_organization},
    routes::{auth::session::AuthSession, helpers::load_context},
    state::AppState,
};

pub async fn handle_me(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let primary = resolve_primary_organization(&ctx.memberships).map(|resolution| {
        if let Some(anomaly) = resolution.inconsistency() {
            tracing::warn!(
                user_id = %ctx.profile.id,
                chosen = %resolution.membership.id,
                "{}",
                anomaly
            );
        }
        resolution.membership.clone()
    });

    Json(json!({
        "success": true,
        "profile": ctx.profile,
        "memberships": ctx.memberships,
        "primary_membership": primary,
        "permissions": {
            "can_invite_users": can_invite_users(&ctx.actor),
            "allowed_invite_roles": allowed_invite_roles(&ctx.actor),
        }
    }))
    .into_response()
}
