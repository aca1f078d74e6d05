use super::core::ActionLogRepository;
use crate::domain::action_log::{AuditAction, AuditEntry};
use crate::domain::value::DATETIME_FORMAT;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, actor, entity, target_id, action_type,
           change_summary, action_ts, payload_json
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<AuditEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE action_id = ?", SELECT_COLUMNS);
        let entry = conn
            .query_row(&sql, params![action_id], map_row)
            .optional()?;
        Ok(entry)
    }

    /// 查询某条记录的变更历史（按时间倒序）
    pub fn find_by_target(&self, entity: &str, target_id: &str) -> RepositoryResult<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE entity = ? AND target_id = ? ORDER BY action_ts DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![entity, target_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: u32) -> RepositoryResult<Vec<AuditEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY action_ts DESC, rowid DESC LIMIT ?", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 按实体统计日志数量
    pub fn count_by_entity(&self, entity: &str) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE entity = ?",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn map_row(row: &Row) -> SqliteResult<AuditEntry> {
    let action_type: String = row.get(4)?;
    let action_ts_str: String = row.get(6)?;
    let payload_json_str: Option<String> = row.get(7)?;

    let action = AuditAction::parse(&action_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("未知操作类型: {}", action_type).into(),
        )
    })?;

    // 解析时间戳
    let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(AuditEntry {
        action_id: row.get(0)?,
        actor: row.get(1)?,
        entity: row.get(2)?,
        target_id: row.get(3)?,
        action,
        change_summary: row.get(5)?,
        action_ts,
        payload_json: payload_json_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}
