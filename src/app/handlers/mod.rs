// ==========================================
// 用户导入服务 - HTTP 处理函数
// ==========================================
// 职责: 解析请求参数并转调 API 层
// ==========================================

pub mod excel;
pub mod progress;
pub mod system;
pub mod users;
