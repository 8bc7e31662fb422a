// ==========================================
// 用户导入服务 - 会话层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入会话错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("导入会话不存在: {0}")]
    NotFound(String),

    #[error("行号越界: row_index={index}, 当前行数={len}")]
    RowIndexOutOfRange { index: usize, len: usize },

    #[error("列不存在: {0}")]
    UnknownColumn(String),

    #[error("单元格值非法: {0}")]
    InvalidValue(String),
}

/// Result 类型别名
pub type SessionResult<T> = Result<T, SessionError>;
