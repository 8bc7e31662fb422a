// ==========================================
// 用户导入服务 - 路由装配
// ==========================================
// 职责: 组装 axum Router，挂载 CORS / 请求体限制 / 请求追踪
// ==========================================

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::app::handlers::{excel, progress, system, users};
use crate::app::state::AppState;
use crate::config::Settings;

/// Excel 导入路由前缀
pub const EXCEL_PREFIX: &str = "/api/excel";

/// 已注册路由清单（GET /api/endpoints 返回）
pub const ROUTE_TABLE: &[(&str, &str)] = &[
    ("POST", "/api/excel/upload"),
    ("POST", "/api/excel/save-to-db/:upload_id"),
    ("GET", "/api/excel/data/:upload_id"),
    ("POST", "/api/excel/remove-duplicates/:upload_id"),
    ("PUT", "/api/excel/update-cell/:upload_id"),
    ("POST", "/api/excel/recheck-duplicates/:upload_id"),
    ("GET", "/api/excel/statistics/:upload_id"),
    ("GET", "/api/excel/export/:upload_id"),
    ("DELETE", "/api/excel/session/:upload_id"),
    ("GET", "/api/excel/ws/progress"),
    ("POST", "/usuarios"),
    ("GET", "/usuarios"),
    ("DELETE", "/usuarios/:id"),
    ("GET", "/health"),
    ("GET", "/api/logs"),
    ("GET", "/api/endpoints"),
];

/// 创建应用路由
///
/// # 参数
/// - state: 共享应用状态
/// - settings: 运行配置（CORS 来源、上传大小上限）
pub fn create_router(state: AppState, settings: &Settings) -> Router {
    let excel_routes = Router::new()
        .route("/upload", post(excel::upload))
        .route("/save-to-db/:upload_id", post(excel::save_to_db))
        .route("/data/:upload_id", get(excel::get_data))
        .route("/remove-duplicates/:upload_id", post(excel::remove_duplicates))
        .route("/update-cell/:upload_id", put(excel::update_cell))
        .route("/recheck-duplicates/:upload_id", post(excel::recheck_duplicates))
        .route("/statistics/:upload_id", get(excel::statistics))
        .route("/export/:upload_id", get(excel::export))
        .route("/session/:upload_id", delete(excel::delete_session))
        .route("/ws/progress", get(progress::progress_ws));

    let user_routes = Router::new()
        .route("/usuarios", post(users::create_user).get(users::list_users))
        .route("/usuarios/:id", delete(users::delete_user));

    let system_routes = Router::new()
        .route("/health", get(system::health))
        .route("/api/logs", get(system::logs))
        .route("/api/endpoints", get(system::endpoints));

    Router::new()
        .nest(EXCEL_PREFIX, excel_routes)
        .merge(user_routes)
        .merge(system_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origin_list()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 构造 CORS 层（携带凭证，方法与请求头按请求回显）
fn cors_layer(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(origins)))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// 过滤来源列表（通配符与携带凭证不兼容，非法值跳过）
fn allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "忽略无效的 CORS 来源");
                None
            }
        })
        .collect()
}
