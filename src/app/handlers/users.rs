// ==========================================
// 用户导入服务 - 用户管理路由处理
// ==========================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::{ApiResult, CreateUserRequest, DeleteUserResponse};
use crate::app::state::AppState;
use crate::domain::user::User;

/// POST /usuarios
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.user_api.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /usuarios
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.user_api.list_users().await?))
}

/// DELETE /usuarios/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteUserResponse>> {
    Ok(Json(state.user_api.delete_user(id).await?))
}
