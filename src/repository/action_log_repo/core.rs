use crate::domain::action_log::AuditEntry;
use crate::domain::value::DATETIME_FORMAT;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 在给定连接上插入一条日志（供导入事务内复用）
pub(crate) fn insert_entry(conn: &Connection, entry: &AuditEntry) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO action_log (
            action_id, actor, entity, target_id, action_type,
            change_summary, action_ts, payload_json
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            entry.action_id,
            entry.actor,
            entry.entity,
            entry.target_id,
            entry.action.as_str(),
            entry.change_summary,
            entry.action_ts.format(DATETIME_FORMAT).to_string(),
            entry.payload_json.as_ref().map(|v| v.to_string()),
        ],
    )
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入
    pub fn insert(&self, entry: &AuditEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_entry(&conn, entry)?;
        Ok(entry.action_id.clone())
    }

    /// 批量插入操作日志（单事务）
    pub fn batch_insert(&self, entries: &[AuditEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for entry in entries {
            insert_entry(&tx, entry)?;
        }
        tx.commit()?;
        Ok(entries.len())
    }
}
