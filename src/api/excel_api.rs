// ==========================================
// 用户导入服务 - Excel 导入 API
// ==========================================
// 职责: 编排 上传 → 解析 → 清洗 → 重复检测 → 会话 → 提交 全流程
// 进度: 上传 reading10 / validating30 / checking50 / processing70 / complete100
//       提交 saving20 / inserting50 / complete100
//       失败时发送 error 事件（携带已达进度）后返回错误
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::progress::ProgressStage;
use crate::domain::table::{CellValue, Row, Table};
use crate::domain::user::CommitRowError;
use crate::engine::{ImportSessionStore, ProgressPublisher, ProgressReporter};
use crate::importer::{
    CommitEngine, ConflictHandlerImpl, DataCleaner, DataCleanerImpl,
    TableStatistics, UniversalFileParser, XlsxExporter, EXPORT_FILE_NAME, XLSX_CONTENT_TYPE,
};
use crate::repository::UserRepository;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, instrument};

/// 上传响应预览行数
pub const PREVIEW_ROWS: usize = 10;

/// JSON 行（保持列顺序）
pub type JsonRow = Map<String, JsonValue>;

// ==========================================
// 请求 / 响应结构
// ==========================================

/// 上传统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatistics {
    pub total_valid: usize,
    /// skip_duplicates=true 提交时将尝试插入的行数
    pub can_insert: usize,
}

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload_id: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub file_duplicate_count: usize,
    pub db_duplicate_count: usize,
    pub file_duplicates: Vec<JsonRow>,
    pub db_duplicates: Vec<String>,
    /// 库内重复检查失败时为 true（db_duplicates 此时为空）
    pub duplicate_check_degraded: bool,
    pub preview: Vec<JsonRow>,
    pub statistics: UploadStatistics,
}

/// 会话数据响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDataResponse {
    pub data: Vec<JsonRow>,
    pub columns: Vec<String>,
    pub total_rows: usize,
}

/// 去重响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDuplicatesResponse {
    pub message: String,
    pub removed_count: usize,
    pub total_rows: usize,
    pub data: Vec<JsonRow>,
}

/// 单元格修改请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCellRequest {
    pub row_index: usize,
    pub column: String,
    #[serde(default)]
    pub value: CellValue,
}

/// 单元格修改响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCellResponse {
    pub message: String,
    pub updated_value: CellValue,
    pub row: JsonRow,
    pub file_duplicate_count: usize,
}

/// 重复复核响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecheckResponse {
    pub file_duplicate_count: usize,
    pub db_duplicate_count: usize,
    pub duplicate_check_degraded: bool,
}

/// 提交响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub message: String,
    pub inserted: usize,
    pub errors: Vec<CommitRowError>,
}

/// 删除会话响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSessionResponse {
    pub message: String,
}

/// 导出文件
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

// ==========================================
// ExcelImportApi
// ==========================================
pub struct ExcelImportApi {
    user_repo: Arc<dyn UserRepository>,
    sessions: Arc<ImportSessionStore>,
    publisher: Arc<dyn ProgressPublisher>,
    commit_engine: CommitEngine,
}

impl ExcelImportApi {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        sessions: Arc<ImportSessionStore>,
        publisher: Arc<dyn ProgressPublisher>,
    ) -> Self {
        Self {
            user_repo,
            sessions,
            publisher,
            commit_engine: CommitEngine::new(),
        }
    }

    /// 上传并校验文件
    ///
    /// # 参数
    /// - file_name: 原始文件名（按扩展名选择解析器）
    /// - bytes: 文件内容
    ///
    /// # 返回
    /// - Ok(UploadResponse): 会话 ID + 行列信息 + 重复信息 + 预览
    /// - Err(ValidationError): 格式不支持 / 无法解析 / 缺列 / 无数据
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_and_validate(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<UploadResponse> {
        let mut reporter = ProgressReporter::new(self.publisher.clone());
        match self.run_upload(&mut reporter, file_name, bytes).await {
            Ok(response) => Ok(response),
            Err(e) => {
                reporter.fail(format!("错误: {}", e));
                Err(e)
            }
        }
    }

    async fn run_upload(
        &self,
        reporter: &mut ProgressReporter,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<UploadResponse> {
        reporter.report(ProgressStage::Reading, 10, "读取文件...");
        let name = file_name.to_string();
        let raw = tokio::task::spawn_blocking(move || UniversalFileParser.parse(&name, &bytes))
            .await
            .map_err(|e| ApiError::InternalError(format!("解析任务异常终止: {}", e)))??;

        reporter.report(ProgressStage::Validating, 30, "校验结构...");
        let table = DataCleanerImpl.clean_table(raw)?;

        reporter.report(ProgressStage::Checking, 50, "检测重复...");
        let report = ConflictHandlerImpl.detect(&table, self.user_repo.as_ref()).await;

        reporter.report(ProgressStage::Processing, 70, "处理数据...");
        let can_insert = self
            .commit_engine
            .plan(&table, &report.persisted_emails, true)
            .len();
        let response = UploadResponse {
            upload_id: String::new(),
            total_rows: table.len(),
            total_columns: table.columns.len(),
            columns: table.columns.clone(),
            file_duplicate_count: report.file_duplicates.len(),
            db_duplicate_count: report.persisted_emails.len(),
            file_duplicates: rows_to_json(&table, &report.file_duplicates),
            db_duplicates: report.persisted_emails.iter().cloned().collect(),
            duplicate_check_degraded: report.degraded,
            preview: table.preview(PREVIEW_ROWS),
            statistics: UploadStatistics {
                total_valid: table.len(),
                can_insert,
            },
        };
        let upload_id = self.sessions.create(table, report);

        reporter.report(ProgressStage::Complete, 100, "上传完成！");
        info!(
            upload_id = %upload_id,
            total_rows = response.total_rows,
            file_duplicates = response.file_duplicate_count,
            db_duplicates = response.db_duplicate_count,
            "文件上传校验完成"
        );
        Ok(UploadResponse {
            upload_id,
            ..response
        })
    }

    /// 提交会话数据到数据库
    ///
    /// # 参数
    /// - skip_duplicates: 为 true 时跳过库内已存在的邮箱
    #[instrument(skip(self))]
    pub async fn commit(&self, upload_id: &str, skip_duplicates: bool) -> ApiResult<CommitResponse> {
        let handle = self.sessions.handle(upload_id)?;
        let mut session = handle.lock().await;
        let mut reporter = ProgressReporter::new(self.publisher.clone());

        reporter.report(ProgressStage::Saving, 20, "准备插入...");
        let mut planned = false;
        let result = self
            .commit_engine
            .commit(&mut session, skip_duplicates, self.user_repo.as_ref(), |count| {
                planned = true;
                reporter.report(
                    ProgressStage::Inserting,
                    50,
                    format!("正在插入 {} 条记录...", count),
                );
            })
            .await;

        if !planned {
            reporter.report(ProgressStage::Complete, 100, "没有可插入的新数据");
            return Ok(CommitResponse {
                message: "没有可插入的新数据".to_string(),
                inserted: 0,
                errors: vec![],
            });
        }

        reporter.report(ProgressStage::Complete, 100, "保存成功！");
        Ok(CommitResponse {
            message: format!("成功插入 {} 条记录", result.inserted),
            inserted: result.inserted,
            errors: result.errors,
        })
    }

    /// 获取会话完整数据
    pub async fn get_session(&self, upload_id: &str) -> ApiResult<SessionDataResponse> {
        let session = self.sessions.get(upload_id).await?;
        Ok(SessionDataResponse {
            data: session.table.rows_to_json(),
            total_rows: session.table.len(),
            columns: session.table.columns,
        })
    }

    /// 删除文件内重复（保留首次出现）
    pub async fn remove_duplicates(&self, upload_id: &str) -> ApiResult<RemoveDuplicatesResponse> {
        let outcome = self.sessions.remove_duplicates(upload_id).await?;
        Ok(RemoveDuplicatesResponse {
            message: format!("已删除文件内 {} 条重复记录", outcome.removed_count),
            removed_count: outcome.removed_count,
            total_rows: outcome.table.len(),
            data: outcome.table.rows_to_json(),
        })
    }

    /// 修改单元格
    ///
    /// # 说明
    /// - 只重算文件内重复；库内重复需调用 recheck_duplicates
    pub async fn update_cell(
        &self,
        upload_id: &str,
        request: UpdateCellRequest,
    ) -> ApiResult<UpdateCellResponse> {
        let outcome = self
            .sessions
            .update_cell(upload_id, request.row_index, &request.column, request.value)
            .await?;
        Ok(UpdateCellResponse {
            message: "已更新".to_string(),
            updated_value: outcome.updated_value,
            row: outcome.row,
            file_duplicate_count: outcome.file_duplicate_count,
        })
    }

    /// 重新检测文件内与库内重复
    pub async fn recheck_duplicates(&self, upload_id: &str) -> ApiResult<RecheckResponse> {
        let outcome = self
            .sessions
            .recheck_duplicates(upload_id, self.user_repo.as_ref())
            .await?;
        Ok(RecheckResponse {
            file_duplicate_count: outcome.file_duplicate_count,
            db_duplicate_count: outcome.persisted_duplicate_count,
            duplicate_check_degraded: outcome.degraded,
        })
    }

    /// 图表统计
    pub async fn statistics(&self, upload_id: &str) -> ApiResult<TableStatistics> {
        let session = self.sessions.get(upload_id).await?;
        Ok(TableStatistics::from_table(&session.table))
    }

    /// 导出当前工作表为 xlsx
    pub async fn export(&self, upload_id: &str) -> ApiResult<ExportFile> {
        let session = self.sessions.get(upload_id).await?;
        let bytes = tokio::task::spawn_blocking(move || XlsxExporter.export(&session.table))
            .await
            .map_err(|e| ApiError::InternalError(format!("导出任务异常终止: {}", e)))??;
        Ok(ExportFile {
            file_name: EXPORT_FILE_NAME.to_string(),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
        })
    }

    /// 删除会话
    pub fn delete_session(&self, upload_id: &str) -> ApiResult<DeleteSessionResponse> {
        self.sessions.delete(upload_id)?;
        Ok(DeleteSessionResponse {
            message: format!("导入会话 {} 已删除", upload_id),
        })
    }
}

fn rows_to_json(table: &Table, rows: &[Row]) -> Vec<JsonRow> {
    rows.iter().map(|r| table.row_to_json(r)).collect()
}
