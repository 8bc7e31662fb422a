// ==========================================
// 用户导入服务 - 用户数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 对齐: users 表 (id, name, email UNIQUE)
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::user::{NewUser, User};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, Result as SqliteResult};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// 单次 IN 查询的最大参数个数
const EXISTS_CHUNK_SIZE: usize = 500;

// ==========================================
// UserRepository Trait
// ==========================================
// 用途: 导入流程与用户管理共用的持久化能力
// 实现者: SqliteUserRepository
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 查询已存在的邮箱
    ///
    /// # 返回
    /// - Ok(BTreeSet): 入参中已在库内的邮箱子集
    async fn exists_by_email(&self, emails: &BTreeSet<String>)
        -> RepositoryResult<BTreeSet<String>>;

    /// 插入单行（导入提交使用，逐行独立）
    ///
    /// # 返回
    /// - Ok(id): 新用户 ID
    /// - Err(UniqueConstraintViolation): 邮箱重复
    async fn insert_row(&self, user: &NewUser) -> RepositoryResult<i64>;

    /// 查询全部用户（按 id 升序）
    async fn list_all(&self) -> RepositoryResult<Vec<User>>;

    /// 按 ID 删除
    ///
    /// # 返回
    /// - Err(NotFound): 用户不存在
    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()>;

    /// 创建单个用户
    ///
    /// # 返回
    /// - Ok(User): 含新 ID 的用户
    /// - Err(UniqueConstraintViolation): 邮箱重复
    async fn create_one(&self, user: &NewUser) -> RepositoryResult<User>;
}

// ==========================================
// SqliteUserRepository - 用户仓储（SQLite）
// ==========================================
pub struct SqliteUserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserRepository {
    /// 创建新的 SqliteUserRepository 实例（幂等建表）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn insert(conn: &Connection, user: &NewUser) -> RepositoryResult<i64> {
        conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            params![user.name, user.email],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn exists_by_email(
        &self,
        emails: &BTreeSet<String>,
    ) -> RepositoryResult<BTreeSet<String>> {
        let conn = self.get_conn()?;
        let all: Vec<&String> = emails.iter().collect();
        let mut existing = BTreeSet::new();

        for chunk in all.chunks(EXISTS_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT email FROM users WHERE email IN ({})", placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            existing.extend(found);
        }

        Ok(existing)
    }

    async fn insert_row(&self, user: &NewUser) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert(&conn, user)
    }

    async fn list_all(&self) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, email FROM users ORDER BY id ASC")?;
        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(users)
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "User".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn create_one(&self, user: &NewUser) -> RepositoryResult<User> {
        let conn = self.get_conn()?;
        let id = Self::insert(&conn, user)?;
        Ok(User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
        })
    }
}
