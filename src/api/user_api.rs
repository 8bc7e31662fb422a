// ==========================================
// 用户导入服务 - 用户管理 API
// ==========================================
// 职责: 单个用户的创建 / 列表 / 删除
// 约束: 与导入提交写入同一张 users 表
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::table::normalize_email;
use crate::domain::user::{NewUser, User};
use crate::importer::DataCleanerImpl;
use crate::repository::{RepositoryError, UserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 创建用户请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

/// 删除用户响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    pub message: String,
}

pub struct UserApi {
    user_repo: Arc<dyn UserRepository>,
}

impl UserApi {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// 创建用户
    ///
    /// # 返回
    /// - Err(ValidationError): 姓名为空 / 邮箱格式错误
    /// - Err(Conflict): 邮箱已注册
    pub async fn create_user(&self, request: CreateUserRequest) -> ApiResult<User> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);

        if name.is_empty() {
            return Err(ApiError::ValidationError("name 不能为空".to_string()));
        }
        if !DataCleanerImpl.is_valid_email(&email) {
            return Err(ApiError::ValidationError(format!("邮箱格式错误: {}", request.email)));
        }

        let user = self
            .user_repo
            .create_one(&NewUser { name, email })
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => {
                    ApiError::Conflict("该邮箱已注册".to_string())
                }
                other => other.into(),
            })?;

        info!(id = user.id, email = %user.email, "用户已创建");
        Ok(user)
    }

    /// 列出全部用户
    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        Ok(self.user_repo.list_all().await?)
    }

    /// 删除用户
    pub async fn delete_user(&self, id: i64) -> ApiResult<DeleteUserResponse> {
        self.user_repo.delete_by_id(id).await?;
        info!(id = id, "用户已删除");
        Ok(DeleteUserResponse {
            message: format!("用户 {} 已删除", id),
        })
    }
}
