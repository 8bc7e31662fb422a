// ==========================================
// 用户导入服务 - 应用层
// ==========================================
// 职责: HTTP 集成，连接前端与 API 层
// ==========================================

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// 重导出
pub use routes::{create_router, EXCEL_PREFIX, ROUTE_TABLE};
pub use state::AppState;
