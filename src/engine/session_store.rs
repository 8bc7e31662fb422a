// ==========================================
// 用户导入服务 - 导入会话存储
// ==========================================
// 职责: 会话 ID → 工作表 + 重复信息 的进程内缓存
// 并发: 外层 RwLock 保护映射表（不跨 await 持有）
//       每个会话一把 tokio Mutex，同一会话的变更串行执行
// 淘汰: 默认关闭；配置后在 create 与定期清理时执行
// ==========================================

use crate::domain::session::{DuplicateReport, ImportSession};
use crate::domain::table::{normalize_email, CellValue, Table, EMAIL_COLUMN, NAME_COLUMN};
use crate::engine::error::{SessionError, SessionResult};
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::table_importer_trait::ConflictHandler as _;
use crate::repository::UserRepository;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// 会话句柄（持锁期间独占该会话）
pub type SessionHandle = Arc<Mutex<ImportSession>>;

// ==========================================
// EvictionPolicy - 淘汰策略
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// 会话最长存活时间（None = 不限）
    pub max_age: Option<Duration>,
    /// 会话最大数量，超出时淘汰最早创建的（None = 不限）
    pub max_count: Option<usize>,
}

impl EvictionPolicy {
    /// 不淘汰
    pub fn disabled() -> Self {
        Self::default()
    }

    /// 由配置值构造（0 表示关闭对应规则）
    pub fn from_limits(max_age_secs: u64, max_count: usize) -> Self {
        Self {
            max_age: (max_age_secs > 0).then(|| Duration::from_secs(max_age_secs)),
            max_count: (max_count > 0).then_some(max_count),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some() || self.max_count.is_some()
    }
}

/// 去重结果
#[derive(Debug, Clone)]
pub struct RemoveDuplicatesOutcome {
    pub removed_count: usize,
    pub table: Table,
}

/// 单元格修改结果（同一把锁内取得的快照）
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCellOutcome {
    pub updated_value: CellValue,
    pub row: Map<String, JsonValue>,
    pub file_duplicate_count: usize,
}

/// 重复复核结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecheckOutcome {
    pub file_duplicate_count: usize,
    pub persisted_duplicate_count: usize,
    pub degraded: bool,
}

struct SessionEntry {
    created_at: DateTime<Utc>,
    seq: u64,
    session: SessionHandle,
}

// ==========================================
// ImportSessionStore
// ==========================================
pub struct ImportSessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    policy: EvictionPolicy,
    seq: AtomicU64,
    conflict_handler: ConflictHandler,
}

impl Default for ImportSessionStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::disabled())
    }
}

impl ImportSessionStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            seq: AtomicU64::new(0),
            conflict_handler: ConflictHandler,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// 当前会话数量
    pub fn len(&self) -> usize {
        self.read_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 创建会话
    ///
    /// # 返回
    /// - 新会话 ID（upload_{时间戳}_{随机后缀}，进程内唯一）
    pub fn create(&self, table: Table, duplicates: DuplicateReport) -> String {
        let id = generate_session_id();
        let session = ImportSession::new(id.clone(), table, duplicates);
        let entry = SessionEntry {
            created_at: session.created_at,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            session: Arc::new(Mutex::new(session)),
        };

        self.write_sessions().insert(id.clone(), entry);
        info!(session_id = %id, "导入会话已创建");

        if self.policy.is_enabled() {
            self.evict_expired();
        }
        id
    }

    /// 获取会话句柄（用于需要持锁执行的操作，如落库）
    pub fn handle(&self, id: &str) -> SessionResult<SessionHandle> {
        self.read_sessions()
            .get(id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// 获取会话快照
    pub async fn get(&self, id: &str) -> SessionResult<ImportSession> {
        let handle = self.handle(id)?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// 修改单元格
    ///
    /// # 说明
    /// - name 列 TRIM，email 列 TRIM + 小写；规范化后为空 → InvalidValue
    /// - 重算文件内重复集；库内重复集不重算（需显式 recheck）
    ///
    /// # 返回
    /// - 修改后的值、整行与文件内重复数
    pub async fn update_cell(
        &self,
        id: &str,
        row_index: usize,
        column: &str,
        value: CellValue,
    ) -> SessionResult<UpdateCellOutcome> {
        let handle = self.handle(id)?;
        let mut session = handle.lock().await;

        let len = session.table.len();
        if row_index >= len {
            return Err(SessionError::RowIndexOutOfRange {
                index: row_index,
                len,
            });
        }
        let col = session
            .table
            .column_index(column)
            .ok_or_else(|| SessionError::UnknownColumn(column.to_string()))?;

        let value = normalize_cell(column, value)?;
        let row = &mut session.table.rows[row_index];
        if row.cells.len() <= col {
            row.cells.resize(col + 1, CellValue::Null);
        }
        row.cells[col] = value.clone();

        let file_duplicates = self.conflict_handler.detect_file_duplicates(&session.table);
        session.file_duplicate_rows = file_duplicates;
        debug!(session_id = %id, row_index = row_index, column = %column, "单元格已更新");
        Ok(UpdateCellOutcome {
            updated_value: value,
            row: session.table.row_to_json(&session.table.rows[row_index]),
            file_duplicate_count: session.file_duplicate_rows.len(),
        })
    }

    /// 删除文件内重复（保留每个邮箱的首次出现）
    ///
    /// # 说明
    /// - 文件内重复集置空；库内重复集不变
    pub async fn remove_duplicates(&self, id: &str) -> SessionResult<RemoveDuplicatesOutcome> {
        let handle = self.handle(id)?;
        let mut session = handle.lock().await;

        let original = session.table.len();
        let rows = std::mem::take(&mut session.table.rows);
        let kept = self.conflict_handler.dedup_keep_first(&session.table, rows);
        session.table.rows = kept;
        session.file_duplicate_rows.clear();

        let removed_count = original - session.table.len();
        info!(session_id = %id, removed = removed_count, "文件内重复已删除");
        Ok(RemoveDuplicatesOutcome {
            removed_count,
            table: session.table.clone(),
        })
    }

    /// 重新检测文件内与库内重复，并原子替换两个派生集合
    pub async fn recheck_duplicates(
        &self,
        id: &str,
        repo: &dyn UserRepository,
    ) -> SessionResult<RecheckOutcome> {
        let handle = self.handle(id)?;
        let mut session = handle.lock().await;

        let report = self.conflict_handler.detect(&session.table, repo).await;
        session.file_duplicate_rows = report.file_duplicates;
        session.persisted_duplicate_emails = report.persisted_emails;
        session.duplicate_check_degraded = report.degraded;

        Ok(RecheckOutcome {
            file_duplicate_count: session.file_duplicate_rows.len(),
            persisted_duplicate_count: session.persisted_duplicate_emails.len(),
            degraded: session.duplicate_check_degraded,
        })
    }

    /// 删除会话
    pub fn delete(&self, id: &str) -> SessionResult<()> {
        match self.write_sessions().remove(id) {
            Some(_) => {
                info!(session_id = %id, "导入会话已删除");
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// 按淘汰策略清理会话
    ///
    /// # 返回
    /// - 被淘汰的会话数量
    pub fn evict_expired(&self) -> usize {
        if !self.policy.is_enabled() {
            return 0;
        }

        let mut sessions = self.write_sessions();
        let before = sessions.len();

        if let Some(max_age) = self.policy.max_age {
            let max_age = chrono::Duration::from_std(max_age)
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
            let cutoff = Utc::now() - max_age;
            sessions.retain(|_, entry| entry.created_at > cutoff);
        }

        if let Some(max_count) = self.policy.max_count {
            if sessions.len() > max_count {
                let mut by_age: Vec<(u64, String)> = sessions
                    .iter()
                    .map(|(id, entry)| (entry.seq, id.clone()))
                    .collect();
                by_age.sort_unstable();
                let excess = sessions.len() - max_count;
                for (_, id) in by_age.into_iter().take(excess) {
                    sessions.remove(&id);
                }
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted = evicted, remaining = sessions.len(), "导入会话已淘汰");
        }
        evicted
    }

    fn read_sessions(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sessions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn generate_session_id() -> String {
    format!(
        "upload_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        Uuid::new_v4().simple()
    )
}

/// 规范化编辑值（必填列不得为空；空文本存为 Null，整数值浮点存为 Int）
fn normalize_cell(column: &str, value: CellValue) -> SessionResult<CellValue> {
    let normalized = match column {
        NAME_COLUMN => value.as_text().trim().to_string(),
        EMAIL_COLUMN => normalize_email(&value.as_text()),
        _ => {
            return Ok(match value {
                CellValue::Text(s) if s.is_empty() => CellValue::Null,
                CellValue::Float(f) => CellValue::from_f64(f),
                other => other,
            })
        }
    };
    if normalized.is_empty() {
        return Err(SessionError::InvalidValue(format!("{} 不能为空", column)));
    }
    Ok(CellValue::Text(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Row;
    use crate::domain::user::{NewUser, User};
    use crate::repository::RepositoryResult;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    fn table(emails: &[&str]) -> Table {
        Table::new(
            vec!["name".to_string(), "email".to_string()],
            emails
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    Row::new(vec![
                        CellValue::Text(format!("user{}", i + 1)),
                        CellValue::Text(e.to_string()),
                    ])
                })
                .collect(),
        )
    }

    fn create(store: &ImportSessionStore, emails: &[&str]) -> String {
        let t = table(emails);
        let report = DuplicateReport {
            file_duplicates: ConflictHandler.detect_file_duplicates(&t),
            ..Default::default()
        };
        store.create(t, report)
    }

    struct KnownEmails(BTreeSet<String>);

    #[async_trait]
    impl UserRepository for KnownEmails {
        async fn exists_by_email(&self, emails: &BTreeSet<String>) -> RepositoryResult<BTreeSet<String>> {
            Ok(emails.intersection(&self.0).cloned().collect())
        }
        async fn insert_row(&self, _user: &NewUser) -> RepositoryResult<i64> {
            unreachable!()
        }
        async fn list_all(&self) -> RepositoryResult<Vec<User>> {
            unreachable!()
        }
        async fn delete_by_id(&self, _id: i64) -> RepositoryResult<()> {
            unreachable!()
        }
        async fn create_one(&self, _user: &NewUser) -> RepositoryResult<User> {
            unreachable!()
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let store = ImportSessionStore::default();
        let ids: BTreeSet<String> = (0..200).map(|_| create(&store, &["a@x.com"])).collect();
        assert_eq!(ids.len(), 200);
        assert!(ids.iter().all(|id| id.starts_with("upload_")));
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = ImportSessionStore::default();
        let err = store.get("upload_missing").await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("upload_missing".to_string()));
    }

    #[tokio::test]
    async fn test_update_cell_is_reflected_and_normalized() {
        let store = ImportSessionStore::default();
        let id = create(&store, &["a@x.com", "b@x.com"]);

        let outcome = store
            .update_cell(&id, 0, "email", CellValue::Text(" New@X.com ".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.updated_value, CellValue::Text("new@x.com".to_string()));
        assert_eq!(outcome.row["email"], "new@x.com");
        assert_eq!(outcome.row["name"], "user1");

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.table.cell(0, "email"), Some(&CellValue::Text("new@x.com".to_string())));
    }

    #[tokio::test]
    async fn test_update_cell_recomputes_file_duplicates_only() {
        let store = ImportSessionStore::default();
        let t = table(&["a@x.com", "b@x.com"]);
        let id = store.create(
            t,
            DuplicateReport {
                persisted_emails: BTreeSet::from(["b@x.com".to_string()]),
                ..Default::default()
            },
        );

        let outcome = store
            .update_cell(&id, 1, "email", CellValue::Text("a@x.com".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.file_duplicate_count, 2);

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.file_duplicate_rows.len(), 2);
        // 库内重复集保持不变，直到显式复核
        assert!(session.persisted_duplicate_emails.contains("b@x.com"));
    }

    #[tokio::test]
    async fn test_update_cell_empty_text_becomes_null() {
        let store = ImportSessionStore::default();
        let id = store.create(
            Table::new(
                vec!["name".to_string(), "email".to_string(), "city".to_string()],
                vec![Row::new(vec![
                    CellValue::Text("Ana".to_string()),
                    CellValue::Text("a@x.com".to_string()),
                    CellValue::Text("Lima".to_string()),
                ])],
            ),
            DuplicateReport::default(),
        );

        let outcome = store
            .update_cell(&id, 0, "city", CellValue::Text(String::new()))
            .await
            .unwrap();
        assert_eq!(outcome.updated_value, CellValue::Null);
        assert_eq!(outcome.row["city"], serde_json::Value::Null);

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.table.cell(0, "city"), Some(&CellValue::Null));
    }

    #[tokio::test]
    async fn test_update_cell_snapshot_matches_its_own_write() {
        let store = Arc::new(ImportSessionStore::default());
        let id = create(&store, &["a@x.com", "b@x.com"]);

        // 并发修改同一单元格：每个结果都反映自身写入
        let tasks: Vec<_> = ["a@x.com", "c@x.com", "a@x.com", "d@x.com"]
            .into_iter()
            .map(|email| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    let outcome = store
                        .update_cell(&id, 1, "email", CellValue::Text(email.to_string()))
                        .await
                        .unwrap();
                    (email, outcome)
                })
            })
            .collect();

        for task in tasks {
            let (email, outcome) = task.await.unwrap();
            assert_eq!(outcome.row["email"], email);
            let expected = if email == "a@x.com" { 2 } else { 0 };
            assert_eq!(outcome.file_duplicate_count, expected);
        }
    }

    #[tokio::test]
    async fn test_update_cell_rejects_bad_input() {
        let store = ImportSessionStore::default();
        let id = create(&store, &["a@x.com"]);

        let err = store.update_cell(&id, 5, "email", CellValue::Null).await.unwrap_err();
        assert_eq!(err, SessionError::RowIndexOutOfRange { index: 5, len: 1 });

        let err = store.update_cell(&id, 0, "phone", CellValue::Int(1)).await.unwrap_err();
        assert_eq!(err, SessionError::UnknownColumn("phone".to_string()));

        let err = store
            .update_cell(&id, 0, "name", CellValue::Text("   ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidValue(_)));
    }

    #[tokio::test]
    async fn test_remove_duplicates_keeps_first() {
        let store = ImportSessionStore::default();
        let id = create(&store, &["a@x.com", "b@x.com", "a@x.com", "c@x.com", "b@x.com"]);

        let outcome = store.remove_duplicates(&id).await.unwrap();
        assert_eq!(outcome.removed_count, 2);
        assert_eq!(outcome.table.len(), 3);

        let session = store.get(&id).await.unwrap();
        assert!(session.file_duplicate_rows.is_empty());
        let names: Vec<String> = session.table.rows.iter().map(|r| session.table.name_of(r)).collect();
        assert_eq!(names, vec!["user1", "user2", "user4"]);
    }

    #[tokio::test]
    async fn test_recheck_duplicates_replaces_both_sets() {
        let store = ImportSessionStore::default();
        let id = create(&store, &["a@x.com", "a@x.com", "b@x.com"]);
        let repo = KnownEmails(BTreeSet::from(["b@x.com".to_string()]));

        let outcome = store.recheck_duplicates(&id, &repo).await.unwrap();
        assert_eq!(
            outcome,
            RecheckOutcome {
                file_duplicate_count: 2,
                persisted_duplicate_count: 1,
                degraded: false
            }
        );
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = ImportSessionStore::default();
        let id = create(&store, &["a@x.com"]);
        store.delete(&id).unwrap();
        assert!(store.get(&id).await.is_err());
        assert_eq!(store.delete(&id), Err(SessionError::NotFound(id)));
    }

    #[test]
    fn test_eviction_disabled_by_default() {
        let store = ImportSessionStore::default();
        for _ in 0..10 {
            create(&store, &["a@x.com"]);
        }
        assert_eq!(store.evict_expired(), 0);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_max_count_evicts_oldest() {
        let store = ImportSessionStore::new(EvictionPolicy::from_limits(0, 2));
        let first = create(&store, &["a@x.com"]);
        let second = create(&store, &["a@x.com"]);
        let third = create(&store, &["a@x.com"]);

        assert_eq!(store.len(), 2);
        assert!(store.handle(&first).is_err());
        assert!(store.handle(&second).is_ok());
        assert!(store.handle(&third).is_ok());
    }

    #[tokio::test]
    async fn test_max_age_evicts_expired() {
        let store = ImportSessionStore::new(EvictionPolicy {
            max_age: Some(Duration::from_millis(20)),
            max_count: None,
        });
        create(&store, &["a@x.com"]);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.evict_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_sessions_are_independent() {
        let store = Arc::new(ImportSessionStore::default());
        let a = create(&store, &["a@x.com"]);
        let b = create(&store, &["b@x.com"]);

        let handle_a = store.handle(&a).unwrap();
        let _guard = handle_a.lock().await;
        // a 被锁住时 b 仍可修改
        store
            .update_cell(&b, 0, "name", CellValue::Text("Bea".to_string()))
            .await
            .unwrap();
    }
}
