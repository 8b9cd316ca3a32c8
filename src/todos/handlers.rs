use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthSession,
    error::ApiError,
    state::AppState,
    store::{TodoFilter, TodoPatch},
};

use super::dto::{CreateTodoRequest, TodoBody, TodoEnvelope, TodosEnvelope, UpdateTodoRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
}

/// A malformed id gets the same answer as an absent or unowned one.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

#[instrument(skip(state, session, payload))]
async fn create_todo(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<Json<TodoBody>, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("todo text must not be empty"));
    }

    let todo = state.todos.insert_todo(session.user.id, text).await?;
    Ok(Json(todo.into()))
}

#[instrument(skip(state, session))]
async fn list_todos(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<TodosEnvelope>, ApiError> {
    let todos = state
        .todos
        .find_todos(TodoFilter::owned_by(session.user.id))
        .await?;
    Ok(Json(TodosEnvelope {
        todos: todos.into_iter().map(TodoBody::from).collect(),
    }))
}

#[instrument(skip(state, session))]
async fn get_todo(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state
        .todos
        .find_todo(TodoFilter::owned_by(session.user.id).with_id(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TodoEnvelope { todo: todo.into() }))
}

#[instrument(skip(state, session, payload))]
async fn update_todo(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<TodoEnvelope>, ApiError> {
    let id = parse_id(&id)?;

    let text = match payload.text {
        Some(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(ApiError::Validation("todo text must not be empty"));
            }
            Some(text)
        }
        None => None,
    };

    let todo = state
        .todos
        .update_todo(
            TodoFilter::owned_by(session.user.id).with_id(id),
            TodoPatch::new(text, payload.completed),
        )
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TodoEnvelope { todo: todo.into() }))
}

#[instrument(skip(state, session))]
async fn delete_todo(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state
        .todos
        .delete_todo(TodoFilter::owned_by(session.user.id).with_id(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TodoEnvelope { todo: todo.into() }))
}
