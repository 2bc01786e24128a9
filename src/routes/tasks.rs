use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{
        can_create_in, can_mutate_resource, can_view_profile, can_view_resource, AccessError,
        Actor, Scoped,
    },
    models::task::{NewTask, Task, TaskStatus},
    responses::JsonResponse,
    routes::{
        auth::session::AuthSession,
        helpers::{
            find_target_profile, load_context, memberships_of, retain_visible, storage_error,
            tenant_filter,
        },
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssigneePayload {
    pub assigned_to: Option<Uuid>,
}

/// Loads a task the actor is allowed to see.
async fn find_visible_task(
    app_state: &AppState,
    actor: &Actor,
    task_id: Uuid,
) -> Result<Task, Response> {
    let task = match app_state.tasks.find_task(task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => return Err(AccessError::NotFound("Task").into_response()),
        Err(err) => return Err(storage_error("failed to load task", err)),
    };
    if !can_view_resource(actor, &task.scope()) {
        return Err(AccessError::forbidden("You cannot view this task").into_response());
    }
    Ok(task)
}

/// An assignee must be an active profile the actor can see, and a client
/// assignee must belong to the task's organization.
async fn check_assignee(
    app_state: &AppState,
    actor: &Actor,
    assignee_id: Uuid,
    org_id: Option<Uuid>,
) -> Result<(), Response> {
    let assignee = find_target_profile(app_state, assignee_id).await?;
    let memberships = memberships_of(app_state, assignee_id).await?;

    if !assignee.is_active {
        return Err(JsonResponse::bad_request("Assignee is deactivated").into_response());
    }
    if !can_view_profile(actor, &assignee, &memberships) {
        return Err(AccessError::forbidden("You cannot assign this user").into_response());
    }
    if assignee.role.is_client()
        && !org_id.is_some_and(|org| memberships.iter().any(|m| m.org_id == org))
    {
        return Err(JsonResponse::bad_request(
            "Client assignees must belong to the task's organization",
        )
        .into_response());
    }
    Ok(())
}

pub async fn list_tasks(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let filter = tenant_filter(&ctx.actor);
    let tasks = match app_state.tasks.list_tasks(filter.as_deref()).await {
        Ok(tasks) => retain_visible(&ctx.actor, tasks, "task"),
        Err(err) => return storage_error("failed to list tasks", err),
    };

    Json(json!({ "success": true, "tasks": tasks })).into_response()
}

pub async fn create_task(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<NewTask>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    if !can_create_in(&ctx.actor, payload.org_id) {
        return AccessError::forbidden("You cannot create tasks in this organization")
            .into_response();
    }
    if payload.title.trim().is_empty() {
        return JsonResponse::bad_request("Task title is required").into_response();
    }

    if let Some(workstream_id) = payload.workstream_id {
        let workstream = match app_state.workstreams.find_workstream(workstream_id).await {
            Ok(Some(workstream)) => workstream,
            Ok(None) => return JsonResponse::not_found("Workstream not found").into_response(),
            Err(err) => return storage_error("failed to load workstream", err),
        };
        if !can_view_resource(&ctx.actor, &workstream.scope()) {
            return AccessError::forbidden("You cannot use this workstream").into_response();
        }
        if workstream.org_id != payload.org_id {
            return JsonResponse::bad_request("Workstream belongs to another organization")
                .into_response();
        }
    }

    if let Some(assignee_id) = payload.assigned_to {
        if let Err(resp) = check_assignee(&app_state, &ctx.actor, assignee_id, payload.org_id).await
        {
            return resp;
        }
    }

    match app_state.tasks.create_task(&payload, ctx.actor.user_id).await {
        Ok(task) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                task_id = %task.id,
                org_id = ?task.org_id,
                "task created"
            );
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "task": task })),
            )
                .into_response()
        }
        Err(err) => storage_error("failed to create task", err),
    }
}

/// Moves a task between Kanban columns.
pub async fn update_status(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let task = match find_visible_task(&app_state, &ctx.actor, task_id).await {
        Ok(task) => task,
        Err(resp) => return resp,
    };
    if !can_mutate_resource(&ctx.actor, &task.scope()) {
        return AccessError::forbidden("You cannot update this task").into_response();
    }
    if task.status == payload.status {
        return Json(json!({ "success": true, "task": task })).into_response();
    }

    match app_state
        .tasks
        .update_task_status(task_id, payload.status)
        .await
    {
        Ok(Some(updated)) => {
            tracing::info!(
                actor = %ctx.actor.user_id,
                %task_id,
                from = ?task.status,
                to = ?updated.status,
                "task moved"
            );
            Json(json!({ "success": true, "task": updated })).into_response()
        }
        Ok(None) => JsonResponse::not_found("Task not found").into_response(),
        Err(err) => storage_error("failed to update task status", err),
    }
}

pub async fn update_assignee(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateAssigneePayload>,
) -> Response {
    let ctx = match load_context(&app_state, &claims).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };

    let task = match find_visible_task(&app_state, &ctx.actor, task_id).await {
        Ok(task) => task,
        Err(resp) => return resp,
    };
    if !can_mutate_resource(&ctx.actor, &task.scope()) {
        return AccessError::forbidden("You cannot reassign this task").into_response();
    }
    if let Some(assignee_id) = payload.assigned_to {
        if let Err(resp) = check_assignee(&app_state, &ctx.actor, assignee_id, task.org_id).await {
            return resp;
        }
    }

    match app_state
        .tasks
        .update_task_assignee(task_id, payload.assigned_to)
        .await
    {
        Ok(Some(updated)) => Json(json!({ "success": true, "task": updated })).into_response(),
        Ok(None) => JsonResponse::not_found("Task not found").into_response(),
        Err(err) => storage_error("failed to reassign task", err),
    }
}
