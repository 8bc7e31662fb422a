// ==========================================
// 用户导入服务 - 进度事件
// ==========================================
// 职责: 定义推送给前端的导入/落库进度事件
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 进度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Reading,
    Validating,
    Checking,
    Processing,
    Saving,
    Inserting,
    Complete,
    Error,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Reading => "reading",
            ProgressStage::Validating => "validating",
            ProgressStage::Checking => "checking",
            ProgressStage::Processing => "processing",
            ProgressStage::Saving => "saving",
            ProgressStage::Inserting => "inserting",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 进度事件（progress 取值 0-100）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub progress: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
        }
    }
}
