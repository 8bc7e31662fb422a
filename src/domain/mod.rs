// ==========================================
// 用户导入服务 - 领域模型层
// ==========================================
// 职责: 定义领域实体与值类型
// 红线: 不含数据访问逻辑,不含流程编排
// ==========================================

pub mod progress;
pub mod session;
pub mod table;
pub mod user;

// 重导出核心类型
pub use progress::{ProgressEvent, ProgressStage};
pub use session::{DuplicateReport, ImportSession};
pub use table::{normalize_email, CellValue, Row, Table, EMAIL_COLUMN, NAME_COLUMN, REQUIRED_COLUMNS};
pub use user::{CommitResult, CommitRowError, NewUser, User};
