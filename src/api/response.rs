// ==========================================
// 用户导入服务 - 统一响应结构
// ==========================================
// 格式: {status, type, title, message, data, error}
// ==========================================

use crate::api::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 统一响应信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub status: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<JsonValue>,
    pub error: Option<String>,
}

impl ApiEnvelope {
    /// 由 ApiError 构造错误信封
    pub fn from_error(err: &ApiError) -> Self {
        Self {
            status: err.status_code(),
            kind: "error".to_string(),
            title: err.title().to_string(),
            message: err.to_string(),
            data: None,
            error: Some(err.code().to_string()),
        }
    }
}
