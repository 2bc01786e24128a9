use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{can_create_in, can_mutate_resource, can_view_resource, AccessError, Scoped},
    models::workstream::{NewWorkstream, WorkstreamCounts, WorkstreamRollup},
    responses::JsonResponse,
    routes::{
        auth::session::AuthSession,
        helpers::{load_context, retain_visible, storage_error, tenant_filter},
    },
    state::AppState,
};

pub async fn list_workstreams(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let filter = tenant_filter(&ctx.actor);
    match app_state.workstreams.list_workstreams(filter.as_deref()).await {
        Ok(streams) => {
            let streams = retain_visible(&ctx.actor, streams, "workstream");
            Json(json!({ "success": true, "workstreams": streams })).into_response()
        }
        Err(err) => storage_error("failed to list workstreams", err),
    }
}

pub async fn create_workstream(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<NewWorkstream>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_create_in(&ctx.actor, payload.org_id) {
        return AccessError::forbidden("You cannot create workstreams in this organization")
            .into_response();
    }
    let name = payload.name.trim();
    if name.is_empty() {
        return JsonResponse::bad_request("Workstream name is required").into_response();
    }
    let counts = WorkstreamCounts {
        red_count: payload.red_count,
        yellow_count: payload.yellow_count,
        green_count: payload.green_count,
    };
    if !counts.is_valid() {
        return JsonResponse::bad_request("Counts must not be negative").into_response();
    }

    let new_stream = NewWorkstream {
        name: name.to_string(),
        ..payload
    };
    match app_state
        .workstreams
        .create_workstream(&new_stream, ctx.actor.user_id)
        .await
    {
        Ok(stream) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                workstream_id = %stream.id,
                org_id = ?stream.org_id,
                "workstream created"
            );
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "workstream": stream })),
            )
                .into_response()
        }
        Err(err) => storage_error("failed to create workstream", err),
    }
}

pub async fn update_counts(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workstream_id): Path<Uuid>,
    Json(counts): Json<WorkstreamCounts>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let stream = match app_state.workstreams.find_workstream(workstream_id).await {
        Ok(Some(stream)) => stream,
        Ok(None) => return JsonResponse::not_found("Workstream not found").into_response(),
        Err(err) => return storage_error("failed to load workstream", err),
    };
    let scope = stream.scope();
    if !can_view_resource(&ctx.actor, &scope) || !can_mutate_resource(&ctx.actor, &scope) {
        return AccessError::forbidden("You cannot update this workstream").into_response();
    }
    if !counts.is_valid() {
        return JsonResponse::bad_request("Counts must not be negative").into_response();
    }

    match app_state
        .workstreams
        .update_counts(workstream_id, counts)
        .await
    {
        Ok(Some(updated)) => {
            Json(json!({ "success": true, "workstream": updated })).into_response()
        }
        Ok(None) => JsonResponse::not_found("Workstream not found").into_response(),
        Err(err) => storage_error("failed to update workstream counts", err),
    }
}

/// Red/yellow/green totals over the workstreams the caller can see.
pub async fn rollup(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let filter = tenant_filter(&ctx.actor);
    match app_state.workstreams.list_workstreams(filter.as_deref()).await {
        Ok(streams) => {
            let streams = retain_visible(&ctx.actor, streams, "workstream");
            let rollup = WorkstreamRollup::from_workstreams(&streams);
            Json(json!({ "success": true, "rollup": rollup })).into_response()
        }
        Err(err) => storage_error("failed to load workstreams for rollup", err),
    }
}
