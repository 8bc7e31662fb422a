// ==========================================
// 用户导入服务 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件解析失败: {0}")]
    FormatError(String),

    // ===== 结构校验错误 =====
    #[error("文件必须包含以下列: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("文件中没有可用的数据行")]
    EmptyFile,

    // ===== 导出错误 =====
    #[error("Excel 导出失败: {0}")]
    ExportError(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::FormatError(format!("CSV: {}", err))
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::FormatError(format!("Excel: {}", err))
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::ExportError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
