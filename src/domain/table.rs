// ==========================================
// 用户导入服务 - 工作表领域模型
// ==========================================
// 职责: 定义单元格值 / 行 / 表
// 约束: 同一张表内所有行共享同一列集合，列顺序即原始文件列顺序
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// 必填列: 姓名
pub const NAME_COLUMN: &str = "name";

/// 必填列: 邮箱（去重键）
pub const EMAIL_COLUMN: &str = "email";

/// 导入所需的全部必填列
pub const REQUIRED_COLUMNS: [&str; 2] = [NAME_COLUMN, EMAIL_COLUMN];

/// f64 可精确表示的最大整数（2^53）
pub const MAX_EXACT_F64_INT: u64 = 1 << 53;

// ==========================================
// CellValue - 单元格值
// ==========================================
// 整数与浮点分开保存，保证导出再导入后取值一致
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// 单元格是否为空（Null 或空白文本）
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 按文本读取（数字按显示形式转文本，Null → 空串）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// 由浮点数构造，整值浮点收敛为 Int
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite()
            && value.fract() == 0.0
            && value >= i64::MIN as f64
            && value <= i64::MAX as f64
        {
            CellValue::Int(value as i64)
        } else {
            CellValue::Float(value)
        }
    }

    /// 从 JSON 值转换（用于单元格编辑）
    ///
    /// # 返回
    /// - None: 数组/对象等非标量值
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => Some(CellValue::Null),
            JsonValue::Bool(b) => Some(CellValue::Text(b.to_string())),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(CellValue::Int(i))
                } else {
                    n.as_f64().map(CellValue::from_f64)
                }
            }
            JsonValue::String(s) if s.is_empty() => Some(CellValue::Null),
            JsonValue::String(s) => Some(CellValue::Text(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// 转换为 JSON 值（NaN/Inf 无法表示，输出 null）
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::Null,
            CellValue::Int(i) => JsonValue::Number((*i).into()),
            CellValue::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        CellValue::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("单元格值必须为字符串、数字或 null"))
    }
}

// ==========================================
// Row - 数据行
// ==========================================
// 单元格按所属表的列顺序存放
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// 是否整行空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

// ==========================================
// Table - 工作表
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列名 → 列下标
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// 读取单元格
    pub fn cell(&self, row_index: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row_index).and_then(|r| r.cells.get(col))
    }

    /// 读取某行的规范化邮箱（去重键）
    pub fn email_key(&self, row: &Row) -> String {
        self.column_index(EMAIL_COLUMN)
            .and_then(|col| row.cells.get(col))
            .map(|v| normalize_email(&v.as_text()))
            .unwrap_or_default()
    }

    /// 读取某行的姓名文本
    pub fn name_of(&self, row: &Row) -> String {
        self.column_index(NAME_COLUMN)
            .and_then(|col| row.cells.get(col))
            .map(|v| v.as_text())
            .unwrap_or_default()
    }

    /// 将一行渲染为 JSON 对象（保持列顺序）
    pub fn row_to_json(&self, row: &Row) -> Map<String, JsonValue> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let value = row.cells.get(idx).map(CellValue::to_json).unwrap_or(JsonValue::Null);
                (col.clone(), value)
            })
            .collect()
    }

    /// 将全部行渲染为 JSON 对象列表
    pub fn rows_to_json(&self) -> Vec<Map<String, JsonValue>> {
        self.rows.iter().map(|r| self.row_to_json(r)).collect()
    }

    /// 前 n 行预览
    pub fn preview(&self, n: usize) -> Vec<Map<String, JsonValue>> {
        self.rows.iter().take(n).map(|r| self.row_to_json(r)).collect()
    }
}

/// 规范化邮箱: TRIM + 小写
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
