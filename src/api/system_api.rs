// ==========================================
// 用户导入服务 - 系统 API
// ==========================================
// 职责: 健康检查 / 日志尾部读取
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// 默认返回的日志行数
pub const DEFAULT_LOG_LINES: usize = 50;

/// 从文件尾部向前读取的块大小
const TAIL_BLOCK_SIZE: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub struct SystemApi {
    log_path: PathBuf,
}

impl SystemApi {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
        }
    }

    /// 读取日志最后 lines 行
    ///
    /// 日志文件不存在时返回空列表并附带说明
    pub async fn tail_logs(&self, lines: usize) -> ApiResult<LogsResponse> {
        if !self.log_path.exists() {
            return Ok(LogsResponse {
                logs: vec![],
                note: Some(format!("{} 不存在", self.log_path.display())),
            });
        }

        let path = self.log_path.clone();
        let logs = tokio::task::spawn_blocking(move || tail_file(&path, lines))
            .await
            .map_err(|e| ApiError::InternalError(format!("日志读取任务异常终止: {}", e)))?
            .map_err(|e| ApiError::InternalError(format!("日志读取失败: {}", e)))?;

        Ok(LogsResponse { logs, note: None })
    }
}

/// 从文件尾部按块向前读取，直到凑够 lines 行
fn tail_file(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    if lines == 0 {
        return Ok(vec![]);
    }

    let mut file = File::open(path)?;
    let mut pos = file.seek(SeekFrom::End(0))?;
    let mut data: Vec<u8> = Vec::new();

    while pos > 0 {
        let step = TAIL_BLOCK_SIZE.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;

        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&data);
        data = chunk;

        // 多读一行，保证最早那行是完整的
        if data.iter().filter(|b| **b == b'\n').count() > lines {
            break;
        }
    }

    let text = String::from_utf8_lossy(&data);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].iter().map(|s| s.to_string()).collect())
}
