// ==========================================
// 用户导入服务 - 统计投影
// ==========================================
// 职责: 工作表 → 图表数据
// - 饼图: 邮箱域名 Top 5（同数量按首次出现顺序）
// - 柱状图: 前 10 行姓名 + 序号（从 1 开始）
// ==========================================

use crate::domain::table::Table;
use serde::{Deserialize, Serialize};

/// 域名排行长度
pub const TOP_DOMAIN_LIMIT: usize = 5;

/// 姓名样本长度
pub const NAME_SAMPLE_LIMIT: usize = 10;

/// 图表序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
    pub column: String,
}

impl ChartSeries {
    fn from_pairs(column: &str, pairs: Vec<(String, usize)>) -> Self {
        let (labels, values) = pairs.into_iter().unzip();
        Self {
            labels,
            values,
            column: column.to_string(),
        }
    }
}

/// 会话统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub pie_chart: ChartSeries,
    pub bar_chart: ChartSeries,
    pub total_rows: usize,
    pub total_columns: usize,
}

impl TableStatistics {
    pub fn from_table(table: &Table) -> Self {
        Self {
            pie_chart: ChartSeries::from_pairs("邮箱域名", top_domains(table, TOP_DOMAIN_LIMIT)),
            bar_chart: ChartSeries::from_pairs("用户", name_sample(table, NAME_SAMPLE_LIMIT)),
            total_rows: table.len(),
            total_columns: table.columns.len(),
        }
    }
}

/// 邮箱域名 Top N
///
/// 没有 '@' 的邮箱不计入
pub fn top_domains(table: &Table, limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in &table.rows {
        let email = table.email_key(row);
        let Some((_, domain)) = email.split_once('@') else {
            continue;
        };
        match counts.iter_mut().find(|(d, _)| d == domain) {
            Some((_, count)) => *count += 1,
            None => counts.push((domain.to_string(), 1)),
        }
    }

    // 稳定排序，同数量保持首次出现顺序
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// 前 N 行姓名及序号
pub fn name_sample(table: &Table, limit: usize) -> Vec<(String, usize)> {
    table
        .rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, row)| (table.name_of(row), i + 1))
        .collect()
}
