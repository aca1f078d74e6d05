// ==========================================
// 通用报表引擎 - 时间桶数据仓储
// ==========================================
// 对齐: bucket_detail 表（方案 + 起始日期唯一）
// ==========================================

use crate::domain::report::BucketSpec;
use crate::domain::value::DATE_FORMAT;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct BucketRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BucketRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入某方案的时间桶（单事务，重复起始日期覆盖）
    pub fn insert_all(&self, scheme: &str, buckets: &[BucketSpec]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for bucket in buckets {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO bucket_detail (bucket, name, start_date, end_date)
                VALUES (?, ?, ?, ?)
                "#,
                params![
                    scheme,
                    bucket.name,
                    bucket.start_date.format(DATE_FORMAT).to_string(),
                    bucket.end_date.format(DATE_FORMAT).to_string(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(scheme = scheme, count = buckets.len(), "写入时间桶");
        Ok(buckets.len())
    }

    /// 某方案的全部时间桶（按起始日期升序）
    pub fn list_by_scheme(&self, scheme: &str) -> RepositoryResult<Vec<BucketSpec>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT name, start_date, end_date
            FROM bucket_detail
            WHERE bucket = ?
            ORDER BY start_date
            "#,
        )?;
        let buckets = stmt
            .query_map(params![scheme], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(buckets)
    }
}

fn parse_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_row(row: &Row) -> rusqlite::Result<BucketSpec> {
    Ok(BucketSpec {
        name: row.get(0)?,
        start_date: parse_date(row, 1)?,
        end_date: parse_date(row, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_list_ordered_and_scoped_by_scheme() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = BucketRepository::new(Arc::new(Mutex::new(conn)));

        repo.insert_all(
            "month",
            &[
                BucketSpec::new("2024 Feb", day(2, 1), day(3, 1)),
                BucketSpec::new("2024 Jan", day(1, 1), day(2, 1)),
            ],
        )
        .unwrap();
        repo.insert_all("week", &[BucketSpec::new("W01", day(1, 1), day(1, 8))])
            .unwrap();

        let months = repo.list_by_scheme("month").unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].name, "2024 Jan");
        assert!(repo.list_by_scheme("quarter").unwrap().is_empty());
    }
}
