// ==========================================
// 用户导入服务 - API 层
// ==========================================
// 职责: 提供与传输无关的业务操作，供 HTTP 路由调用
// ==========================================

pub mod error;
pub mod excel_api;
pub mod response;
pub mod system_api;
pub mod user_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use excel_api::{
    CommitResponse, DeleteSessionResponse, ExcelImportApi, ExportFile, RecheckResponse,
    RemoveDuplicatesResponse, SessionDataResponse, UpdateCellRequest, UpdateCellResponse,
    UploadResponse, UploadStatistics,
};
pub use response::ApiEnvelope;
pub use system_api::{HealthResponse, LogsResponse, SystemApi, DEFAULT_LOG_LINES};
pub use user_api::{CreateUserRequest, DeleteUserResponse, UserApi};
