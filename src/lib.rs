// ==========================================
// 用户导入服务 - 核心库
// ==========================================
// 技术栈: axum + Rust + SQLite
// 系统定位: 用户管理 + Excel/CSV 批量导入校验
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 会话状态与进度事件
pub mod engine;

// 导入层 - 解析/清洗/重复检测/落库/导出
pub mod importer;

// 配置层 - 运行配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{CellValue, ImportSession, ProgressEvent, ProgressStage, Row, Table, User};

// 引擎
pub use engine::{ImportSessionStore, ProgressBroadcaster};

// API
pub use api::{ExcelImportApi, SystemApi, UserApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "用户导入服务";
