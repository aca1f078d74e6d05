// ==========================================
// 通用报表引擎 - 用户偏好数据仓储
// ==========================================
// 对齐: user_preference 表
// ==========================================

use crate::domain::preference::UserPreference;
use crate::domain::value::DATE_FORMAT;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct PreferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PreferenceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取用户偏好（不存在时返回 None）
    pub fn find(&self, user_id: &str) -> RepositoryResult<Option<UserPreference>> {
        let conn = self.get_conn()?;
        let pref = conn
            .query_row(
                r#"
                SELECT user_id, buckets, start_date, end_date, csv_delimiter
                FROM user_preference
                WHERE user_id = ?
                "#,
                params![user_id],
                map_row,
            )
            .optional()?;
        Ok(pref)
    }

    /// 读取用户偏好，不存在时返回默认偏好
    pub fn get_or_default(&self, user_id: &str) -> RepositoryResult<UserPreference> {
        Ok(self
            .find(user_id)?
            .unwrap_or_else(|| UserPreference::new(user_id)))
    }

    /// 保存用户偏好（存在则覆盖）
    pub fn upsert(&self, pref: &UserPreference) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO user_preference (user_id, buckets, start_date, end_date, csv_delimiter)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                buckets = excluded.buckets,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                csv_delimiter = excluded.csv_delimiter
            "#,
            params![
                pref.user_id,
                pref.buckets,
                pref.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                pref.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                pref.csv_delimiter,
            ],
        )?;
        Ok(())
    }
}

fn parse_optional_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn map_row(row: &Row) -> rusqlite::Result<UserPreference> {
    Ok(UserPreference {
        user_id: row.get(0)?,
        buckets: row.get(1)?,
        start_date: parse_optional_date(row, 2)?,
        end_date: parse_optional_date(row, 3)?,
        csv_delimiter: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> PreferenceRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        PreferenceRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_default_when_missing() {
        let repo = setup();
        assert!(repo.find("u1").unwrap().is_none());
        let pref = repo.get_or_default("u1").unwrap();
        assert_eq!(pref, UserPreference::new("u1"));
    }

    #[test]
    fn test_upsert_overwrites() {
        let repo = setup();
        let mut pref = UserPreference::new("u1");
        pref.buckets = Some("week".to_string());
        pref.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        repo.upsert(&pref).unwrap();

        pref.csv_delimiter = "semicolon".to_string();
        pref.end_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        repo.upsert(&pref).unwrap();

        assert_eq!(repo.find("u1").unwrap(), Some(pref));
    }
}
