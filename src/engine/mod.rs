// ==========================================
// 用户导入服务 - 引擎层
// ==========================================
// 职责: 导入会话状态管理 + 进度事件扇出
// 红线: Engine 不拼 SQL, 持久化只经由 Repository trait
// ==========================================

pub mod error;
pub mod events;
pub mod session_store;

// 重导出核心引擎
pub use error::{SessionError, SessionResult};
pub use events::{
    NoOpProgressPublisher, ProgressBroadcaster, ProgressPublisher, ProgressReporter,
    ProgressSubscription,
};
pub use session_store::{
    EvictionPolicy, ImportSessionStore, RecheckOutcome, RemoveDuplicatesOutcome, SessionHandle,
    UpdateCellOutcome,
};
