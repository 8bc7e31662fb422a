// ==========================================
// 用户导入服务 - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// ==========================================

use crate::domain::table::{Row, Table};
use crate::importer::error::ImportResult;
use std::collections::BTreeSet;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 1: reading）
// 实现者: ExcelParser, CsvParser
pub trait FileParser: Send + Sync {
    /// 解析字节流为原始工作表
    ///
    /// # 返回
    /// - Ok(Table): 表头 + 非空白数据行（未清洗）
    /// - Err(FormatError): 无法解码
    fn parse_to_table(&self, bytes: &[u8]) -> ImportResult<Table>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 结构校验与清洗接口（阶段 2: validating）
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// 校验必填列并清洗 name / email
    ///
    /// # 规则
    /// - 缺少 name 或 email 列 → MissingColumns
    /// - 无数据行 → EmptyFile
    /// - name: TRIM；email: TRIM + 小写
    /// - 清洗后 name 或 email 为空的行静默丢弃
    /// - 丢弃后无可用行 → EmptyFile
    fn clean_table(&self, table: Table) -> ImportResult<Table>;

    /// 清洗文本字段（TRIM）
    fn clean_text(&self, value: &str) -> String;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 重复检测接口（阶段 3: checking）
// 实现者: ConflictHandler
pub trait ConflictHandler: Send + Sync {
    /// 检测文件内重复邮箱
    ///
    /// # 返回
    /// - 所有出现 ≥2 次的邮箱对应的全部行（保持原顺序）
    fn detect_file_duplicates(&self, table: &Table) -> Vec<Row>;

    /// 收集工作表中全部规范化邮箱
    fn collect_emails(&self, table: &Table) -> BTreeSet<String>;

    /// 按规范化邮箱去重，保留首次出现
    ///
    /// # 返回
    /// - 去重后的行（保持原顺序）
    fn dedup_keep_first(&self, table: &Table, rows: Vec<Row>) -> Vec<Row>;
}
