// ==========================================
// Excel 导入流程集成测试
// ==========================================
// 覆盖: 上传 → 编辑 → 去重 → 落库 → 统计 → 导出
// ==========================================

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use user_import_service::api::{ApiError, ExcelImportApi, UpdateCellRequest};
use user_import_service::domain::{CellValue, NewUser, ProgressEvent, ProgressStage, User};
use user_import_service::engine::{
    ImportSessionStore, NoOpProgressPublisher, ProgressBroadcaster, ProgressPublisher,
};
use user_import_service::importer::{ExcelParser, FileParser};
use user_import_service::repository::{RepositoryError, RepositoryResult, UserRepository};

use test_helpers::{create_test_db, open_repo, seed_users, users_xlsx, xlsx_bytes};

fn excel_api(repo: Arc<dyn UserRepository>) -> ExcelImportApi {
    ExcelImportApi::new(
        repo,
        Arc::new(ImportSessionStore::default()),
        Arc::new(NoOpProgressPublisher),
    )
}

/// 统计 insert 调用次数的仓储
#[derive(Default)]
struct CountingRepo {
    persisted: BTreeSet<String>,
    inserts: AtomicUsize,
}

#[async_trait]
impl UserRepository for CountingRepo {
    async fn exists_by_email(&self, emails: &BTreeSet<String>) -> RepositoryResult<BTreeSet<String>> {
        Ok(emails.intersection(&self.persisted).cloned().collect())
    }

    async fn insert_row(&self, _user: &NewUser) -> RepositoryResult<i64> {
        Ok(self.inserts.fetch_add(1, Ordering::SeqCst) as i64 + 1)
    }

    async fn list_all(&self) -> RepositoryResult<Vec<User>> {
        Ok(vec![])
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()> {
        Err(RepositoryError::NotFound {
            entity: "User".to_string(),
            id: id.to_string(),
        })
    }

    async fn create_one(&self, user: &NewUser) -> RepositoryResult<User> {
        let id = self.insert_row(user).await?;
        Ok(User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
        })
    }
}

#[tokio::test]
async fn test_upload_reports_file_duplicates() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    // 第 2 行与第 4 行邮箱相同
    let bytes = users_xlsx(&[
        ("Ana", "ana@x.com"),
        ("A", "a@x.com"),
        ("Bea", "bea@x.com"),
        ("A2", "A@X.com "),
        ("Cris", "cris@x.com"),
    ]);
    let response = api.upload_and_validate("users.xlsx", bytes).await.unwrap();

    assert_eq!(response.total_rows, 5);
    assert_eq!(response.file_duplicate_count, 2);
    assert_eq!(response.preview.len(), 5);
    assert_eq!(response.db_duplicate_count, 0);
    assert!(!response.duplicate_check_degraded);
    assert_eq!(response.statistics.total_valid, 5);
    assert_eq!(response.statistics.can_insert, 4);
    assert!(response.upload_id.starts_with("upload_"));
    assert!(response
        .file_duplicates
        .iter()
        .all(|row| row["email"] == "a@x.com"));
}

#[tokio::test]
async fn test_upload_drops_blank_rows_and_keeps_extra_columns() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let bytes = xlsx_bytes(
        &["name", "email", "age"],
        &[
            vec![
                CellValue::Text("Ana".into()),
                CellValue::Text("ana@x.com".into()),
                CellValue::Int(30),
            ],
            vec![CellValue::Null, CellValue::Null, CellValue::Null],
            vec![
                CellValue::Text("Bea".into()),
                CellValue::Text("bea@x.com".into()),
                CellValue::Float(41.5),
            ],
        ],
    );
    let response = api.upload_and_validate("users.xlsx", bytes).await.unwrap();

    assert_eq!(response.total_rows, 2);
    assert_eq!(response.columns, vec!["name", "email", "age"]);
    assert_eq!(response.preview[0]["age"], 30);
    assert_eq!(response.preview[1]["age"], 41.5);
}

#[tokio::test]
async fn test_upload_missing_required_column_is_rejected() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let bytes = xlsx_bytes(&["name", "phone"], &[vec![CellValue::Text("Ana".into()), CellValue::Int(5)]]);
    let err = api.upload_and_validate("users.xlsx", bytes).await.unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[tokio::test]
async fn test_update_cell_is_visible_in_session() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("Ana", "ana@x.com"), ("Bea", "bea@x.com")]))
        .await
        .unwrap();

    let response = api
        .update_cell(
            &upload.upload_id,
            UpdateCellRequest {
                row_index: 1,
                column: "name".to_string(),
                value: CellValue::Text("Beatriz".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.updated_value, CellValue::Text("Beatriz".into()));

    let data = api.get_session(&upload.upload_id).await.unwrap();
    assert_eq!(data.data[1]["name"], "Beatriz");
    assert_eq!(data.total_rows, 2);
}

#[tokio::test]
async fn test_update_cell_out_of_range_is_not_found() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("Ana", "ana@x.com")]))
        .await
        .unwrap();

    let err = api
        .update_cell(
            &upload.upload_id,
            UpdateCellRequest {
                row_index: 7,
                column: "name".to_string(),
                value: CellValue::Text("x".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_commit_skips_persisted_emails() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let repo = open_repo(&db_path);
    seed_users(repo.as_ref(), &[("Old", "old@x.com")]).await;
    let api = excel_api(repo.clone());

    let upload = api
        .upload_and_validate(
            "users.xlsx",
            users_xlsx(&[
                ("Ana", "ana@x.com"),
                ("Old again", "old@x.com"),
                ("Bea", "bea@x.com"),
                ("Cris", "cris@x.com"),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(upload.db_duplicate_count, 1);
    assert_eq!(upload.db_duplicates, vec!["old@x.com"]);
    assert_eq!(upload.statistics.can_insert, 3);

    let result = api.commit(&upload.upload_id, true).await.unwrap();
    assert_eq!(result.inserted, 3);
    assert!(result.errors.is_empty());

    let users = repo.list_all().await.unwrap();
    assert_eq!(users.len(), 4);
    assert_eq!(users[0].name, "Old");
}

#[tokio::test]
async fn test_commit_without_skip_reports_row_errors() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let repo = open_repo(&db_path);
    seed_users(repo.as_ref(), &[("Old", "old@x.com")]).await;
    let api = excel_api(repo.clone());

    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("Ana", "ana@x.com"), ("Old", "old@x.com")]))
        .await
        .unwrap();

    let result = api.commit(&upload.upload_id, false).await.unwrap();
    assert_eq!(result.inserted, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].email, "old@x.com");
}

#[tokio::test]
async fn test_all_duplicate_commit_makes_no_insert_calls() {
    let repo = Arc::new(CountingRepo {
        persisted: ["a@x.com", "b@x.com"].iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let api = excel_api(repo.clone());

    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("A", "a@x.com"), ("B", "b@x.com")]))
        .await
        .unwrap();
    assert_eq!(upload.statistics.can_insert, 0);

    let result = api.commit(&upload.upload_id, true).await.unwrap();
    assert_eq!(result.inserted, 0);
    assert!(result.errors.is_empty());
    assert_eq!(repo.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    assert!(matches!(api.get_session("upload_missing").await, Err(ApiError::NotFound(_))));
    assert!(matches!(api.commit("upload_missing", true).await, Err(ApiError::NotFound(_))));
    assert!(matches!(api.export("upload_missing").await, Err(ApiError::NotFound(_))));
    assert!(matches!(api.delete_session("upload_missing"), Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_remove_duplicates_keeps_first_occurrence() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let upload = api
        .upload_and_validate(
            "users.xlsx",
            users_xlsx(&[
                ("A1", "a@x.com"),
                ("B", "b@x.com"),
                ("A2", "a@x.com"),
                ("A3", "a@x.com"),
                ("C", "c@x.com"),
            ]),
        )
        .await
        .unwrap();

    let response = api.remove_duplicates(&upload.upload_id).await.unwrap();
    // 原始 5 行，唯一邮箱 3 个
    assert_eq!(response.removed_count, 2);
    assert_eq!(response.total_rows, 3);
    assert_eq!(response.data[0]["name"], "A1");

    let recheck = api.recheck_duplicates(&upload.upload_id).await.unwrap();
    assert_eq!(recheck.file_duplicate_count, 0);
}

#[tokio::test]
async fn test_recheck_picks_up_rows_persisted_elsewhere() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let repo = open_repo(&db_path);
    let api = excel_api(repo.clone());

    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("Ana", "ana@x.com"), ("Bea", "bea@x.com")]))
        .await
        .unwrap();
    assert_eq!(upload.db_duplicate_count, 0);

    seed_users(repo.as_ref(), &[("Ana", "ana@x.com")]).await;
    let recheck = api.recheck_duplicates(&upload.upload_id).await.unwrap();
    assert_eq!(recheck.db_duplicate_count, 1);

    let result = api.commit(&upload.upload_id, true).await.unwrap();
    assert_eq!(result.inserted, 1);
}

#[tokio::test]
async fn test_statistics_shapes() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let upload = api
        .upload_and_validate(
            "users.xlsx",
            users_xlsx(&[("A", "a@x.com"), ("B", "b@y.com"), ("C", "c@x.com")]),
        )
        .await
        .unwrap();

    let stats = api.statistics(&upload.upload_id).await.unwrap();
    assert_eq!(stats.total_rows, 3);
    assert_eq!(stats.total_columns, 2);
    assert_eq!(stats.pie_chart.labels, vec!["x.com", "y.com"]);
    assert_eq!(stats.pie_chart.values, vec![2, 1]);
    assert_eq!(stats.bar_chart.labels, vec!["A", "B", "C"]);
    assert_eq!(stats.bar_chart.values, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_export_round_trip() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let bytes = xlsx_bytes(
        &["name", "email", "age"],
        &[
            vec![
                CellValue::Text("Ana".into()),
                CellValue::Text("ana@x.com".into()),
                CellValue::Int(30),
            ],
            vec![
                CellValue::Text("Bea".into()),
                CellValue::Text("bea@x.com".into()),
                CellValue::Null,
            ],
        ],
    );
    let upload = api.upload_and_validate("users.xlsx", bytes).await.unwrap();
    let file = api.export(&upload.upload_id).await.unwrap();
    assert_eq!(file.file_name, "usuarios_modificados.xlsx");

    let exported = ExcelParser.parse_to_table(&file.bytes).unwrap();
    let session = api.get_session(&upload.upload_id).await.unwrap();
    assert_eq!(exported.columns, session.columns);
    assert_eq!(exported.rows_to_json(), session.data);
}

#[tokio::test]
async fn test_csv_export_round_trip() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let csv = "name,email,age,score,code,zip,note\n\
               Ana,ana@x.com,30.0,1.5,12345678901234567,007,\n\
               Bea,bea@x.com,41,2.25,-5,0100,hola\n";
    let upload = api.upload_and_validate("users.csv", csv.as_bytes().to_vec()).await.unwrap();

    let file = api.export(&upload.upload_id).await.unwrap();
    let exported = ExcelParser.parse_to_table(&file.bytes).unwrap();
    let session = api.get_session(&upload.upload_id).await.unwrap();
    assert_eq!(exported.columns, session.columns);
    assert_eq!(exported.rows_to_json(), session.data);
    assert_eq!(session.data[0]["age"], 30);
    assert_eq!(session.data[0]["code"], 12345678901234567i64);
    assert_eq!(session.data[0]["zip"], "007");
    assert!(session.data[0]["note"].is_null());
}

#[tokio::test]
async fn test_export_round_trip_after_edits() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = excel_api(open_repo(&db_path));

    let csv = "name,email,code,note\nAna,ana@x.com,1,hola\nBea,bea@x.com,2,chau\n";
    let upload = api.upload_and_validate("users.csv", csv.as_bytes().to_vec()).await.unwrap();

    let edits = [
        (0, "code", CellValue::Int(9_007_199_254_740_993)),
        (0, "note", CellValue::Text(String::new())),
        (1, "code", CellValue::Float(3.0)),
        (1, "note", CellValue::Text("0042".into())),
    ];
    for (row_index, column, value) in edits {
        api.update_cell(
            &upload.upload_id,
            UpdateCellRequest {
                row_index,
                column: column.to_string(),
                value,
            },
        )
        .await
        .unwrap();
    }

    let file = api.export(&upload.upload_id).await.unwrap();
    let exported = ExcelParser.parse_to_table(&file.bytes).unwrap();
    let session = api.get_session(&upload.upload_id).await.unwrap();
    assert_eq!(exported.rows_to_json(), session.data);
    assert!(session.data[0]["note"].is_null());
    assert_eq!(session.data[1]["code"], 3);
    assert_eq!(session.data[1]["note"], "0042");
}

#[tokio::test]
async fn test_progress_without_subscribers_never_blocks() {
    let broadcaster = Arc::new(ProgressBroadcaster::new(1));
    let delivered = broadcaster.publish(ProgressEvent::new(ProgressStage::Reading, 10, "x"));
    assert_eq!(delivered, 0);

    // 订阅后不读取，通道写满后继续发布也不会阻塞
    let _sub = broadcaster.subscribe();
    for p in 0..10u8 {
        broadcaster.publish(ProgressEvent::new(ProgressStage::Inserting, p * 10, "x"));
    }

    let api = ExcelImportApi::new(
        Arc::new(CountingRepo::default()),
        Arc::new(ImportSessionStore::default()),
        broadcaster.clone(),
    );
    let upload = api
        .upload_and_validate("users.xlsx", users_xlsx(&[("A", "a@x.com")]))
        .await
        .unwrap();
    assert_eq!(upload.total_rows, 1);
}
