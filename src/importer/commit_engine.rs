// ==========================================
// 用户导入服务 - 提交引擎
// ==========================================
// 职责: 会话工作表 → users 表
// 流程: (可选) 跳过库内已存在邮箱 → 按邮箱去重保留首行 → 逐行插入
// 语义: 单行失败记录到 errors，不中断后续行
// ==========================================

use crate::domain::session::ImportSession;
use crate::domain::table::Table;
use crate::domain::user::{CommitResult, CommitRowError, NewUser};
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::table_importer_trait::ConflictHandler as _;
use crate::repository::UserRepository;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

pub struct CommitEngine {
    conflict_handler: ConflictHandler,
}

impl Default for CommitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitEngine {
    pub fn new() -> Self {
        Self {
            conflict_handler: ConflictHandler,
        }
    }

    /// 计算待插入的行（不访问数据库）
    ///
    /// # 参数
    /// - `persisted`: 库内已存在的邮箱
    /// - `skip_duplicates`: 为 true 时剔除 persisted 中的邮箱
    ///
    /// # 返回
    /// - 待插入用户（保持工作表顺序，每个邮箱至多一行）
    pub fn plan(
        &self,
        table: &Table,
        persisted: &BTreeSet<String>,
        skip_duplicates: bool,
    ) -> Vec<NewUser> {
        let candidates: Vec<_> = table
            .rows
            .iter()
            .filter(|row| !skip_duplicates || !persisted.contains(&table.email_key(row)))
            .cloned()
            .collect();

        self.conflict_handler
            .dedup_keep_first(table, candidates)
            .iter()
            .map(|row| NewUser {
                name: table.name_of(row).trim().to_string(),
                email: table.email_key(row),
            })
            .collect()
    }

    /// 逐行插入
    pub async fn insert_all(&self, users: &[NewUser], repo: &dyn UserRepository) -> CommitResult {
        let mut result = CommitResult::default();

        for user in users {
            match repo.insert_row(user).await {
                Ok(id) => {
                    debug!(id = id, email = %user.email, "用户已插入");
                    result.inserted += 1;
                }
                Err(e) => {
                    warn!(email = %user.email, error = %e, "用户插入失败");
                    result.errors.push(CommitRowError {
                        email: user.email.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            inserted = result.inserted,
            failed = result.errors.len(),
            "导入提交完成"
        );
        result
    }

    /// 将插入成功的邮箱并入会话的库内重复集
    ///
    /// 再次提交（skip_duplicates=true）时不会重复插入
    pub fn mark_persisted(&self, session: &mut ImportSession, users: &[NewUser], result: &CommitResult) {
        let failed: HashSet<&str> = result.errors.iter().map(|e| e.email.as_str()).collect();
        session.persisted_duplicate_emails.extend(
            users
                .iter()
                .filter(|u| !failed.contains(u.email.as_str()))
                .map(|u| u.email.clone()),
        );
    }

    /// 提交会话
    ///
    /// # 参数
    /// - on_insert: 开始插入前以待插入条数回调一次；无可插入行时不回调
    ///
    /// # 返回
    /// - 无可插入行时返回 {0, []}，不调用仓储
    pub async fn commit<F>(
        &self,
        session: &mut ImportSession,
        skip_duplicates: bool,
        repo: &dyn UserRepository,
        on_insert: F,
    ) -> CommitResult
    where
        F: FnOnce(usize) + Send,
    {
        let users = self.plan(&session.table, &session.persisted_duplicate_emails, skip_duplicates);
        if users.is_empty() {
            info!(session_id = %session.id, "没有可插入的新数据");
            return CommitResult::default();
        }
        on_insert(users.len());
        let result = self.insert_all(&users, repo).await;
        self.mark_persisted(session, &users, &result);
        result
    }
}
