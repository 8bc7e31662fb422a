// ==========================================
// 用户导入服务 - HTTP 错误响应
// ==========================================
// 职责: 把 ApiError 渲染为统一错误信封
// ==========================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::{ApiEnvelope, ApiError};

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), status = %status, "请求处理失败");
        } else {
            tracing::warn!(error = %self, code = self.code(), status = %status, "请求被拒绝");
        }

        (status, Json(ApiEnvelope::from_error(&self))).into_response()
    }
}
