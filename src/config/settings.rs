// ==========================================
// 用户导入服务 - 运行配置
// ==========================================
// 来源: 环境变量（全部带默认值）
// 工具: envconfig
// ==========================================

use crate::engine::EvictionPolicy;
use envconfig::Envconfig;
use std::path::PathBuf;
use std::time::Duration;

/// 数据目录下的应用子目录名
const APP_DIR_NAME: &str = "user-import-service";

/// 默认数据库文件名
const DB_FILE_NAME: &str = "users.db";

#[derive(Envconfig, Debug, Clone)]
pub struct Settings {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8000")]
    pub port: u16,

    /// 为空时使用平台数据目录
    #[envconfig(from = "DATABASE_PATH", default = "")]
    pub database_path: String,

    /// 逗号分隔的允许来源
    #[envconfig(
        from = "CORS_ORIGINS",
        default = "http://localhost:4200,http://127.0.0.1:4200"
    )]
    pub cors_origins: String,

    #[envconfig(from = "MAX_UPLOAD_BYTES", default = "20971520")]
    pub max_upload_bytes: usize,

    /// 0 = 不按存活时间淘汰
    #[envconfig(from = "SESSION_MAX_AGE_SECS", default = "0")]
    pub session_max_age_secs: u64,

    /// 0 = 不按数量淘汰
    #[envconfig(from = "SESSION_MAX_COUNT", default = "0")]
    pub session_max_count: usize,

    #[envconfig(from = "SESSION_SWEEP_INTERVAL_SECS", default = "60")]
    pub session_sweep_interval_secs: u64,

    #[envconfig(from = "PROGRESS_CHANNEL_CAPACITY", default = "64")]
    pub progress_channel_capacity: usize,

    #[envconfig(from = "LOG_PATH", default = "logs/app.log")]
    pub log_path: String,
}

impl Settings {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 数据库路径（未配置时: <数据目录>/user-import-service/users.db）
    pub fn database_path(&self) -> PathBuf {
        if !self.database_path.trim().is_empty() {
            return PathBuf::from(self.database_path.trim());
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(DB_FILE_NAME)
    }

    /// 解析 CORS 来源列表（忽略空项）
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy::from_limits(self.session_max_age_secs, self.session_max_count)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }
}
