pub mod auth;
pub mod helpers;
pub mod organizations;
pub mod tasks;
pub mod users;
pub mod workstreams;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{state::AppState, utils::csrf::get_csrf_token};

/// Every `/api` route with state applied. Cross-cutting layers (CSRF, rate
/// limiting, tracing, CORS) are added by the binary.
pub fn api_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/me", get(auth::handle_me))
        .route("/csrf-token", get(get_csrf_token));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/invite-roles", get(users::invite_roles))
        .route("/invite", post(users::invite_user))
        .route("/me", put(users::update_me))
        .route("/{user_id}/role", put(users::update_role))
        .route("/{user_id}/active", put(users::set_active));

    let organization_routes = Router::new()
        .route(
            "/",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/{org_id}/members",
            get(organizations::list_members).post(organizations::add_member),
        )
        .route(
            "/{org_id}/members/{user_id}",
            delete(organizations::remove_member),
        )
        .route(
            "/memberships/{membership_id}/primary",
            put(organizations::set_primary),
        );

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route("/{task_id}/status", put(tasks::update_status))
        .route("/{task_id}/assignee", put(tasks::update_assignee));

    let workstream_routes = Router::new()
        .route(
            "/",
            get(workstreams::list_workstreams).post(workstreams::create_workstream),
        )
        .route("/rollup", get(workstreams::rollup))
        .route("/{workstream_id}/counts", put(workstreams::update_counts));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/organizations", organization_routes)
        .nest("/api/tasks", task_routes)
        .nest("/api/workstreams", workstream_routes)
        .with_state(state)
}
