// ==========================================
// 用户导入服务 - 用户领域模型
// ==========================================
// 对齐: users 表 (id, name, email UNIQUE)
// ==========================================

use serde::{Deserialize, Serialize};

/// 已落库用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// 待插入用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// 单行落库失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRowError {
    /// 行标识（邮箱）
    pub email: String,
    pub error: String,
}

/// 提交结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub inserted: usize,
    pub errors: Vec<CommitRowError>,
}
