// ==========================================
// 用户导入服务 - 冲突处理器实现
// ==========================================
// 职责: 检测文件内重复邮箱 / 库内已存在邮箱
// 策略: 检测时标记同一邮箱的全部副本（供人工复核）
//       去重时保留首次出现（用于解决冲突）
// ==========================================

use crate::domain::session::DuplicateReport;
use crate::domain::table::{Row, Table};
use crate::importer::table_importer_trait::ConflictHandler as ConflictHandlerTrait;
use crate::repository::UserRepository;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    fn detect_file_duplicates(&self, table: &Table) -> Vec<Row> {
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        for row in &table.rows {
            *occurrences.entry(table.email_key(row)).or_insert(0) += 1;
        }

        table
            .rows
            .iter()
            .filter(|row| occurrences.get(&table.email_key(row)).copied().unwrap_or(0) >= 2)
            .cloned()
            .collect()
    }

    fn collect_emails(&self, table: &Table) -> BTreeSet<String> {
        table
            .rows
            .iter()
            .map(|row| table.email_key(row))
            .filter(|email| !email.is_empty())
            .collect()
    }

    fn dedup_keep_first(&self, table: &Table, rows: Vec<Row>) -> Vec<Row> {
        let mut seen: HashSet<String> = HashSet::new();
        rows.into_iter()
            .filter(|row| seen.insert(table.email_key(row)))
            .collect()
    }
}

impl ConflictHandler {
    /// 完整重复检测（文件内 + 库内）
    ///
    /// # 说明
    /// - 库内检查失败时降级为"无已知重复"，不阻断上传
    /// - 降级时 report.degraded = true
    pub async fn detect(&self, table: &Table, repo: &dyn UserRepository) -> DuplicateReport {
        let file_duplicates = self.detect_file_duplicates(table);
        let emails = self.collect_emails(table);

        let (persisted_emails, degraded) = if emails.is_empty() {
            (BTreeSet::new(), false)
        } else {
            match repo.exists_by_email(&emails).await {
                Ok(existing) => (existing, false),
                Err(e) => {
                    warn!(error = %e, "库内重复检查失败，按无重复处理");
                    (BTreeSet::new(), true)
                }
            }
        };

        debug!(
            file_duplicates = file_duplicates.len(),
            persisted = persisted_emails.len(),
            degraded = degraded,
            "重复检测完成"
        );

        DuplicateReport {
            file_duplicates,
            persisted_emails,
            degraded,
        }
    }
}
