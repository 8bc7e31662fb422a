// ==========================================
// 用户导入服务 - 导入层
// ==========================================
// 职责: 上传文件解析 / 清洗 / 重复检测 / 提交 / 统计 / 导出
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

// 模块声明
pub mod commit_engine;
pub mod conflict_handler;
pub mod data_cleaner;
pub mod error;
pub mod exporter;
pub mod file_parser;
pub mod statistics;
pub mod table_importer_trait;

// 重导出核心类型
pub use commit_engine::CommitEngine;
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use error::{ImportError, ImportResult};
pub use exporter::{XlsxExporter, EXPORT_FILE_NAME, EXPORT_SHEET_NAME, XLSX_CONTENT_TYPE};
pub use file_parser::{CsvParser, ExcelParser, SourceFormat, UniversalFileParser};
pub use statistics::{ChartSeries, TableStatistics};

// 重导出 Trait 接口
pub use table_importer_trait::{ConflictHandler, DataCleaner, FileParser};
