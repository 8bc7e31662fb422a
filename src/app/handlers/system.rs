// ==========================================
// 用户导入服务 - 系统路由处理
// ==========================================

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiResult, HealthResponse, LogsResponse, DEFAULT_LOG_LINES};
use crate::app::routes::ROUTE_TABLE;
use crate::app::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsResponse {
    pub endpoints: Vec<EndpointInfo>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.system_api.health())
}

/// GET /api/logs?lines=N
pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogsResponse>> {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    Ok(Json(state.system_api.tail_logs(lines).await?))
}

/// GET /api/endpoints
pub async fn endpoints() -> Json<EndpointsResponse> {
    let endpoints = ROUTE_TABLE
        .iter()
        .map(|(method, path)| EndpointInfo {
            method: method.to_string(),
            path: path.to_string(),
        })
        .collect();
    Json(EndpointsResponse { endpoints })
}
