// ==========================================
// 并发会话测试
// ==========================================
// 测试目标: 多个上传并发执行互不干扰；同一会话的并发提交串行化
// ==========================================


use std::collections::HashSet;
use std::sync::Arc;

use user_import_service::api::ExcelImportApi;
use user_import_service::engine::{EvictionPolicy, ImportSessionStore, ProgressBroadcaster};
use user_import_service::logging;
use user_import_service::repository::UserRepository;

use test_helpers::{create_test_db, open_repo, users_xlsx};

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_sessions() {
    logging::init_test();

    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let sessions = Arc::new(ImportSessionStore::new(EvictionPolicy::disabled()));
    let api = Arc::new(ExcelImportApi::new(
        open_repo(&db_path),
        sessions.clone(),
        Arc::new(ProgressBroadcaster::default()),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let api = api.clone();
        handles.push(tokio::spawn(async move {
            let email = format!("user{}@x.com", i);
            let bytes = users_xlsx(&[("User", email.as_str())]);
            api.upload_and_validate("users.xlsx", bytes).await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.total_rows, 1);
        ids.insert(response.upload_id);
    }
    assert_eq!(ids.len(), 8);
    assert_eq!(sessions.len(), 8);
}

#[tokio::test]
async fn test_concurrent_commits_on_one_session_insert_once() {
    logging::init_test();

    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let repo = open_repo(&db_path);
    let api = Arc::new(ExcelImportApi::new(
        repo.clone(),
        Arc::new(ImportSessionStore::default()),
        Arc::new(ProgressBroadcaster::default()),
    ));

    let upload = api
        .upload_and_validate(
            "users.xlsx",
            users_xlsx(&[("A", "a@x.com"), ("B", "b@x.com"), ("C", "c@x.com")]),
        )
        .await
        .unwrap();

    let first = {
        let api = api.clone();
        let id = upload.upload_id.clone();
        tokio::spawn(async move { api.commit(&id, true).await })
    };
    let second = {
        let api = api.clone();
        let id = upload.upload_id.clone();
        tokio::spawn(async move { api.commit(&id, true).await })
    };

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    // 会话锁保证只有一次真正插入，另一次看到已落库邮箱
    assert_eq!(a.inserted + b.inserted, 3);
    assert!(a.errors.is_empty() && b.errors.is_empty());
    assert_eq!(repo.list_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_eviction_by_count_drops_oldest_sessions() {
    let (_dir, db_path) = create_test_db().expect("创建测试数据库失败");
    let sessions = Arc::new(ImportSessionStore::new(EvictionPolicy::from_limits(0, 2)));
    let api = ExcelImportApi::new(
        open_repo(&db_path),
        sessions.clone(),
        Arc::new(ProgressBroadcaster::default()),
    );

    let mut ids = Vec::new();
    for i in 0..3 {
        let email = format!("u{}@x.com", i);
        let upload = api
            .upload_and_validate("users.xlsx", users_xlsx(&[("U", email.as_str())]))
            .await
            .unwrap();
        ids.push(upload.upload_id);
    }

    assert_eq!(sessions.len(), 2);
    assert!(api.get_session(&ids[0]).await.is_err());
    assert!(api.get_session(&ids[2]).await.is_ok());
}
