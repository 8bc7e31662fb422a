// ==========================================
// 用户导入服务 - 主入口
// ==========================================
// 技术栈: axum + Rust + SQLite
// 配置: 环境变量（见 config::Settings）
// ==========================================

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use envconfig::Envconfig;

use user_import_service::app::{create_router, AppState};
use user_import_service::config::Settings;
use user_import_service::engine::ImportSessionStore;
use user_import_service::logging;

async fn listen(app: Router, bind: String) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("监听地址: {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

/// 定期清理过期导入会话
fn spawn_session_sweeper(sessions: Arc<ImportSessionStore>, period: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_expired();
            if evicted > 0 {
                tracing::info!(evicted, remaining = sessions.len(), "已清理过期导入会话");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::init_from_env().context("无法从环境变量加载配置")?;

    logging::init(Some(Path::new(&settings.log_path)));

    tracing::info!("==================================================");
    tracing::info!("{}", user_import_service::APP_NAME);
    tracing::info!("系统版本: {}", user_import_service::VERSION);
    tracing::info!("==================================================");

    let state = AppState::new(&settings).context("无法初始化应用状态")?;

    if settings.eviction_policy().is_enabled() {
        tracing::info!(
            interval_secs = settings.sweep_interval().as_secs(),
            "启用导入会话定期清理"
        );
        spawn_session_sweeper(state.sessions.clone(), settings.sweep_interval());
    }

    let app = create_router(state, &settings);

    if let Err(e) = listen(app, settings.bind()).await {
        tracing::error!("服务器错误: {}", e);
        return Err(e.into());
    }

    Ok(())
}
