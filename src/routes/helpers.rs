use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::{
    access::{view_decision, Actor, Capabilities, Scoped, ViewDecision},
    models::{organization::OrganizationMembership, user::Profile},
    responses::JsonResponse,
    routes::auth::claims::Claims,
    state::AppState,
};

/// The caller as loaded from the database for this request.
pub struct RequestContext {
    pub profile: Profile,
    pub memberships: Vec<OrganizationMembership>,
    pub actor: Actor,
}

pub(crate) fn storage_error(context: &str, err: sqlx::Error) -> Response {
    tracing::error!("{}: {:?}", context, err);
    JsonResponse::server_error("Something went wrong").into_response()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code == "23505";
        }
    }
    false
}

/// Reloads profile and memberships behind the session. Role and tenancy are
/// never taken from the token.
pub async fn load_context(app_state: &AppState, claims: &Claims) -> Result<RequestContext, Response> {
    let user_id = Uuid::parse_str(&claims.id)
        .map_err(|_| JsonResponse::unauthorized("Invalid user ID").into_response())?;

    let profile = match app_state.users.find_profile(user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return Err(JsonResponse::unauthorized("Unknown user").into_response()),
        Err(err) => return Err(storage_error("failed to load profile", err)),
    };

    if !profile.is_active {
        tracing::warn!(%user_id, "request from deactivated profile rejected");
        return Err(
            JsonResponse::forbidden_with_code("Account is deactivated", "INACTIVE").into_response(),
        );
    }

    let memberships = app_state
        .organizations
        .list_memberships_for_user(user_id)
        .await
        .map_err(|err| storage_error("failed to load memberships", err))?;

    let actor = Actor::from_profile(&profile, &memberships);
    Ok(RequestContext {
        profile,
        memberships,
        actor,
    })
}

/// Tenant filter to push down into list queries: `None` for roles that see
/// every tenant.
pub fn tenant_filter(actor: &Actor) -> Option<Vec<Uuid>> {
    if actor
        .capabilities()
        .contains(Capabilities::VIEW_ALL_TENANTS)
    {
        None
    } else {
        Some(actor.org_ids.iter().copied().collect())
    }
}

/// Drops records the actor may not see. Untagged records that stay visible to
/// team roles are reported as an anomaly.
pub fn retain_visible<T: Scoped>(actor: &Actor, records: Vec<T>, kind: &'static str) -> Vec<T> {
    let mut untagged = 0usize;
    let visible: Vec<T> = records
        .into_iter()
        .filter(|record| match view_decision(actor, &record.scope()) {
            ViewDecision::Visible => true,
            ViewDecision::VisibleUntagged => {
                untagged += 1;
                true
            }
            ViewDecision::Hidden => false,
        })
        .collect();
    if untagged > 0 {
        tracing::warn!(kind, untagged, "records without an organization tag");
    }
    visible
}

/// Loads memberships of `user_id` for profile checks, mapping storage errors.
pub async fn memberships_of(
    app_state: &AppState,
    user_id: Uuid,
) -> Result<Vec<OrganizationMembership>, Response> {
    app_state
        .organizations
        .list_memberships_for_user(user_id)
        .await
        .map_err(|err| storage_error("failed to load memberships", err))
}

/// Loads a profile other than the caller's, mapping absence to 404.
pub async fn find_target_profile(app_state: &AppState, user_id: Uuid) -> Result<Profile, Response> {
    match app_state.users.find_profile(user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(JsonResponse::not_found("User not found").into_response()),
        Err(err) => Err(storage_error("failed to load profile", err)),
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{is_unique_violation, tenant_filter};
    use crate::{
        access::Actor,
        db::{mock_db::MockDb, organization_repository::OrganizationRepository},
        models::user::Role,
        routes::{api_router, helpers::test_support::request},
        state::test_support::state_with,
    };
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn duplicate_slug_is_a_unique_violation() {
        let db = MockDb::default();
        db.seed_organization("Acme");
        let err = db
            .create_organization("Acme", "acme", None)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn tenant_filter_is_pushed_down_for_clients_only() {
        let org = Uuid::new_v4();
        assert!(tenant_filter(&Actor::new(Uuid::new_v4(), Role::User, [org])).is_none());
        assert_eq!(
            tenant_filter(&Actor::new(Uuid::new_v4(), Role::Client, [org])),
            Some(vec![org])
        );
        assert_eq!(
            tenant_filter(&Actor::new(Uuid::new_v4(), Role::ClientNoAccess, [])),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn storage_failures_become_server_errors() {
        let db = Arc::new(MockDb {
            should_fail: true,
            ..Default::default()
        });
        let res = api_router(state_with(db))
            .oneshot(request(Method::GET, "/api/tasks", Uuid::new_v4(), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn requests_without_session_are_unauthorized() {
        let db = Arc::new(MockDb::default());
        let res = api_router(state_with(db))
            .oneshot(
                axum::http::Request::get("/api/users")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
