// ==========================================
// 用户导入服务 - 配置层
// ==========================================
// 职责: 从环境变量加载运行配置
// ==========================================

pub mod settings;

pub use settings::Settings;
