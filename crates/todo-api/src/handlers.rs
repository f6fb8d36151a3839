//! `/todos` のハンドラ
//!
//! どの操作も 認証 → パラメータ検証 → 取得と所有者確認 → 更新 の順で判定します。
//! 他ユーザーの Todo は存在しないものとして 404 を返します。

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::{Todo, TodoError, TodoId, UserId};
use infrastructure::TodoRepository;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::params::Params;
use crate::AppState;

/// POST /todos（`body` パラメータ必須）
pub async fn create_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    params: Params,
) -> Result<Json<Todo>, ApiError> {
    let body = params.required("body")?;
    let todo = Todo::new(user, body)?;

    state.repository.save(&todo).await?;
    tracing::info!(todo_id = %todo.id, user_id = %todo.user_id, "Todo created");

    Ok(Json(todo))
}

/// GET /todos?finished=true|false（新しい順）
pub async fn list_todos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    params: Params,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let finished = params.required_bool("finished")?;

    let todos = state
        .repository
        .query_by_owner_and_finished(&user, finished)
        .await?;

    Ok(Json(todos))
}

/// PUT /todos/:id（`finished` パラメータ必須）
pub async fn update_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    params: Params,
) -> Result<Json<Todo>, ApiError> {
    let finished = params.required_bool("finished")?;
    let mut todo = find_owned(state.repository.as_ref(), &id, &user).await?;

    todo.set_finished(finished);
    // 取得後に削除されていれば NotFound
    state.repository.update(&todo).await?;
    tracing::info!(todo_id = %todo.id, finished, "Todo updated");

    Ok(Json(todo))
}

/// DELETE /todos/:id
pub async fn delete_todo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let todo = find_owned(state.repository.as_ref(), &id, &user).await?;

    state.repository.delete(&todo.id).await?;
    tracing::info!(todo_id = %todo.id, "Todo deleted");

    Ok(StatusCode::OK)
}

/// 存在しない・ID が不正・所有者が違う、のいずれも同じ NotFound にまとめる
async fn find_owned(
    repository: &dyn TodoRepository,
    id: &str,
    user: &UserId,
) -> Result<Todo, ApiError> {
    let not_found = || TodoError::NotFound(id.to_string());

    let todo_id = TodoId::parse(id).map_err(|_| not_found())?;
    match repository.get_by_id(&todo_id).await? {
        Some(todo) if todo.is_owned_by(user) => Ok(todo),
        _ => Err(not_found().into()),
    }
}
