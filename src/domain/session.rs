// ==========================================
// 用户导入服务 - 导入会话领域模型
// ==========================================
// 职责: 一次上传的工作表 + 派生重复信息
// 约束: 文件内重复集与工作表一起重算；库内重复集只在显式复核时重算
// ==========================================

use crate::domain::table::{Row, Table};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

// ==========================================
// DuplicateReport - 重复检测结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateReport {
    /// 文件内重复行（同一邮箱出现 ≥2 次时，所有副本都计入）
    pub file_duplicates: Vec<Row>,
    /// 数据库中已存在的邮箱
    pub persisted_emails: BTreeSet<String>,
    /// 存在性检查失败时为 true（此时 persisted_emails 为空集）
    pub degraded: bool,
}

// ==========================================
// ImportSession - 导入会话
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportSession {
    pub id: String,
    pub table: Table,
    pub file_duplicate_rows: Vec<Row>,
    pub persisted_duplicate_emails: BTreeSet<String>,
    pub duplicate_check_degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl ImportSession {
    pub fn new(id: String, table: Table, duplicates: DuplicateReport) -> Self {
        Self {
            id,
            table,
            file_duplicate_rows: duplicates.file_duplicates,
            persisted_duplicate_emails: duplicates.persisted_emails,
            duplicate_check_degraded: duplicates.degraded,
            created_at: Utc::now(),
        }
    }
}
