// ==========================================
// 用户导入服务 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有字段均为 Arc，clone 开销为常数
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ExcelImportApi, SystemApi, UserApi};
use crate::config::Settings;
use crate::engine::{EvictionPolicy, ImportSessionStore, ProgressBroadcaster};
use crate::repository::{RepositoryResult, SqliteUserRepository, UserRepository};

/// 应用状态
///
/// 在 axum Router 中作为共享 State
#[derive(Clone)]
pub struct AppState {
    /// 数据库路径
    pub db_path: PathBuf,

    /// Excel 导入API
    pub excel_api: Arc<ExcelImportApi>,

    /// 用户管理API
    pub user_api: Arc<UserApi>,

    /// 系统API
    pub system_api: Arc<SystemApi>,

    /// 导入会话存储（定期清理任务使用）
    pub sessions: Arc<ImportSessionStore>,

    /// 进度广播器（WebSocket 订阅使用）
    pub broadcaster: Arc<ProgressBroadcaster>,
}

impl AppState {
    /// 按配置创建应用状态（打开数据库并建表）
    pub fn new(settings: &Settings) -> RepositoryResult<Self> {
        let db_path = settings.database_path();
        let repo = SqliteUserRepository::new(&db_path.to_string_lossy())?;
        tracing::info!(db_path = %db_path.display(), "数据库已初始化");

        let mut state = Self::from_parts(
            Arc::new(repo),
            settings.eviction_policy(),
            settings.progress_channel_capacity,
            PathBuf::from(&settings.log_path),
        );
        state.db_path = db_path;
        Ok(state)
    }

    /// 由已构造的组件创建应用状态
    pub fn from_parts(
        user_repo: Arc<dyn UserRepository>,
        eviction: EvictionPolicy,
        progress_capacity: usize,
        log_path: PathBuf,
    ) -> Self {
        let sessions = Arc::new(ImportSessionStore::new(eviction));
        let broadcaster = Arc::new(ProgressBroadcaster::new(progress_capacity));

        Self {
            db_path: PathBuf::new(),
            excel_api: Arc::new(ExcelImportApi::new(
                user_repo.clone(),
                sessions.clone(),
                broadcaster.clone(),
            )),
            user_api: Arc::new(UserApi::new(user_repo)),
            system_api: Arc::new(SystemApi::new(log_path)),
            sessions,
            broadcaster,
        }
    }
}
