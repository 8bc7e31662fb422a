// ==========================================
// 用户导入服务 - Excel 导入路由处理
// ==========================================
// 前缀: /api/excel
// ==========================================

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::api::{
    ApiError, ApiResult, CommitResponse, DeleteSessionResponse, RecheckResponse,
    RemoveDuplicatesResponse, SessionDataResponse, UpdateCellRequest, UpdateCellResponse,
    UploadResponse,
};
use crate::app::state::AppState;
use crate::importer::TableStatistics;

/// 上传表单中的文件字段名
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct SaveQuery {
    pub skip_duplicates: Option<bool>,
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::ValidationError(format!("无法读取上传内容: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::ValidationError(format!("无法读取上传文件: {}", e.body_text())))?;

        tracing::debug!(file_name = %file_name, size = bytes.len(), "收到上传文件");
        let response = state
            .excel_api
            .upload_and_validate(&file_name, bytes.to_vec())
            .await?;
        return Ok(Json(response));
    }

    Err(ApiError::ValidationError(format!(
        "缺少上传文件字段: {}",
        UPLOAD_FIELD
    )))
}

/// POST /save-to-db/:upload_id?skip_duplicates=bool
pub async fn save_to_db(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Query(query): Query<SaveQuery>,
) -> ApiResult<Json<CommitResponse>> {
    let skip_duplicates = query.skip_duplicates.unwrap_or(true);
    Ok(Json(
        state.excel_api.commit(&upload_id, skip_duplicates).await?,
    ))
}

/// GET /data/:upload_id
pub async fn get_data(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<SessionDataResponse>> {
    Ok(Json(state.excel_api.get_session(&upload_id).await?))
}

/// POST /remove-duplicates/:upload_id
pub async fn remove_duplicates(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<RemoveDuplicatesResponse>> {
    Ok(Json(state.excel_api.remove_duplicates(&upload_id).await?))
}

/// PUT /update-cell/:upload_id
pub async fn update_cell(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Json(request): Json<UpdateCellRequest>,
) -> ApiResult<Json<UpdateCellResponse>> {
    Ok(Json(state.excel_api.update_cell(&upload_id, request).await?))
}

/// POST /recheck-duplicates/:upload_id
pub async fn recheck_duplicates(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<RecheckResponse>> {
    Ok(Json(state.excel_api.recheck_duplicates(&upload_id).await?))
}

/// GET /statistics/:upload_id
pub async fn statistics(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<TableStatistics>> {
    Ok(Json(state.excel_api.statistics(&upload_id).await?))
}

/// GET /export/:upload_id
pub async fn export(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Response> {
    let file = state.excel_api.export(&upload_id).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// DELETE /session/:upload_id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<DeleteSessionResponse>> {
    Ok(Json(state.excel_api.delete_session(&upload_id)?))
}
