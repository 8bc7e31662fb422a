// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// 同时输出到控制台与日志文件（供 /api/logs 读取）
// ==========================================

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志系统
///
/// # 参数
/// - log_file: 日志文件路径；打开失败时只输出到控制台
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=user_import_service=trace
///
/// # 示例
/// ```no_run
/// use user_import_service::logging;
/// logging::init(Some(std::path::Path::new("logs/app.log")));
/// ```
pub fn init(log_file: Option<&Path>) {
    // 从环境变量读取日志级别，默认为 info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .boxed(),
        ),
        Err(e) => {
            file_error = Some(format!("{}: {}", path.display(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    if let Some(err) = file_error {
        tracing::warn!(error = %err, "日志文件打开失败，仅输出到控制台");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
