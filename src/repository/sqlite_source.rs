// ==========================================
// 通用报表引擎 - SQLite 记录表
// ==========================================
// 职责: 基于 rusqlite 的 QuerySource + ImportStore 实现
// 约束: 字段白名单来自 PRAGMA table_info；记录流按批次惰性读取
// 红线: 值一律绑定参数，不拼接进 SQL
// ==========================================

use crate::domain::action_log::AuditEntry;
use crate::domain::query::{Predicate, Query};
use crate::domain::value::{parse_datetime, Record, Value, DATETIME_FORMAT, DATE_FORMAT};
use crate::repository::action_log_repo::insert_entry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::query_source::{ImportStore, QuerySource, RecordStream};
use crate::repository::sql_builder::{
    build_order_by_clause, build_where_clause, checked_column, quote_identifier,
};
use chrono::NaiveDate;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

/// 默认每批读取行数
pub const DEFAULT_BATCH_SIZE: usize = 500;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Bool(b) => ToSqlOutput::from(*b as i64),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Number(n) => ToSqlOutput::from(*n),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Date(d) => ToSqlOutput::from(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => ToSqlOutput::from(dt.format(DATETIME_FORMAT).to_string()),
        })
    }
}

/// 声明类型决定的读取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Any,
    Bool,
    Date,
    DateTime,
}

impl ColumnKind {
    /// 由列的声明类型推断
    pub fn from_decl(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            ColumnKind::Bool
        } else if decl.contains("DATETIME") || decl.contains("TIMESTAMP") {
            ColumnKind::DateTime
        } else if decl.contains("DATE") {
            ColumnKind::Date
        } else {
            ColumnKind::Any
        }
    }

    fn read(&self, raw: ValueRef<'_>) -> Value {
        match raw {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) if *self == ColumnKind::Bool => Value::Bool(i != 0),
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Number(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                match self {
                    ColumnKind::Date => NaiveDate::parse_from_str(&text, DATE_FORMAT)
                        .map(Value::Date)
                        .unwrap_or(Value::Text(text)),
                    ColumnKind::DateTime => parse_datetime(&text)
                        .map(Value::DateTime)
                        .unwrap_or(Value::Text(text)),
                    _ => Value::Text(text),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ColumnDef {
    name: String,
    kind: ColumnKind,
}

// ==========================================
// SqliteTable - 单表记录源
// ==========================================
pub struct SqliteTable {
    conn: Arc<Mutex<Connection>>,
    table: String,
    columns: Vec<ColumnDef>,
    column_names: Vec<String>,
    primary_key: String,
    auto_primary_key: bool,
    batch_size: usize,
    in_transaction: bool,
}

impl SqliteTable {
    /// 打开已存在的表（字段白名单由表结构得出）
    ///
    /// # 参数
    /// - `conn`: 共享连接
    /// - `table`: 表名
    /// - `primary_key`: 主键字段
    ///
    /// # 返回
    /// - 表不存在时返回 NotFound；主键不在表中时返回 UnknownColumn
    pub fn open(
        conn: Arc<Mutex<Connection>>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> RepositoryResult<Self> {
        let table = table.into();
        let primary_key = primary_key.into();

        let columns = {
            let guard = lock(&conn)?;
            let sql = format!("PRAGMA table_info({})", quote_identifier(&table));
            let mut stmt = guard.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                let name: String = row.get(1)?;
                let decl: String = row.get(2)?;
                Ok(ColumnDef {
                    name,
                    kind: ColumnKind::from_decl(&decl),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        if columns.is_empty() {
            return Err(RepositoryError::NotFound {
                entity: "table".to_string(),
                id: table,
            });
        }
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        checked_column(&table, &column_names, &primary_key)?;

        debug!(table = %table, columns = column_names.len(), "打开记录表");
        Ok(Self {
            conn,
            table,
            columns,
            column_names,
            primary_key,
            auto_primary_key: false,
            batch_size: DEFAULT_BATCH_SIZE,
            in_transaction: false,
        })
    }

    /// 主键由数据库分配（INTEGER PRIMARY KEY）
    pub fn auto_primary_key(mut self) -> Self {
        self.auto_primary_key = true;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.column_names
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    fn select_list(&self) -> String {
        self.column_names
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn read_record(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let mut record = Record::new();
        for (i, column) in self.columns.iter().enumerate() {
            record.insert(column.name.clone(), column.kind.read(row.get_ref(i)?));
        }
        Ok(record)
    }

    fn require_transaction(&self) -> RepositoryResult<()> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(RepositoryError::DatabaseTransactionError(
                "没有进行中的事务".to_string(),
            ))
        }
    }

    /// 记录中属于本表且非主键的字段
    fn writable_fields<'r>(&self, record: &'r Record) -> RepositoryResult<Vec<(&'r String, &'r Value)>> {
        let mut fields = Vec::with_capacity(record.len());
        for (name, value) in record {
            checked_column(&self.table, &self.column_names, name)?;
            if *name != self.primary_key {
                fields.push((name, value));
            }
        }
        Ok(fields)
    }

    fn update(&self, conn: &Connection, key: &str, record: &Record) -> RepositoryResult<()> {
        let fields = self.writable_fields(record)?;
        if fields.is_empty() {
            return Ok(());
        }
        let assignments = fields
            .iter()
            .map(|(name, _)| format!("{} = ?", quote_identifier(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(&self.table),
            assignments,
            quote_identifier(&self.primary_key)
        );
        let mut bound: Vec<&dyn ToSql> = fields.iter().map(|(_, v)| *v as &dyn ToSql).collect();
        bound.push(&key);
        let changed = conn.execute(&sql, bound.as_slice())?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: self.table.clone(),
                id: key.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&self, conn: &Connection, record: &Record) -> RepositoryResult<String> {
        let key = record.get(&self.primary_key).cloned().unwrap_or(Value::Null);
        if key.is_null() && !self.auto_primary_key {
            return Err(RepositoryError::FieldValueError {
                field: self.primary_key.clone(),
                message: "主键不能为空".to_string(),
            });
        }

        let mut fields = self.writable_fields(record)?;
        if !key.is_null() {
            if let Some((name, value)) = record.get_key_value(&self.primary_key) {
                fields.push((name, value));
            }
        }

        let table = quote_identifier(&self.table);
        if fields.is_empty() {
            conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", table), [])?;
        } else {
            let names = fields
                .iter()
                .map(|(name, _)| quote_identifier(name))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; fields.len()].join(", ");
            let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, names, placeholders);
            let bound: Vec<&dyn ToSql> = fields.iter().map(|(_, v)| *v as &dyn ToSql).collect();
            conn.execute(&sql, bound.as_slice())?;
        }

        if key.is_null() {
            Ok(conn.last_insert_rowid().to_string())
        } else {
            Ok(key.to_string())
        }
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

impl QuerySource for SqliteTable {
    type Item = Record;

    fn count(&self, predicates: &[Predicate]) -> RepositoryResult<u64> {
        let (where_sql, params) = build_where_clause(&self.table, &self.column_names, predicates)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote_identifier(&self.table),
            where_sql
        );
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    #[instrument(skip(self, query), fields(table = %self.table))]
    fn fetch(&self, query: &Query) -> RepositoryResult<RecordStream<'_, Record>> {
        let (where_sql, params) =
            build_where_clause(&self.table, &self.column_names, &query.predicates)?;
        let order_sql = build_order_by_clause(
            &self.table,
            &self.column_names,
            &query.ordering,
            &self.primary_key,
        )?;
        let sql = format!(
            "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
            self.select_list(),
            quote_identifier(&self.table),
            where_sql,
            order_sql
        );
        let (offset, remaining) = match query.window {
            Some((offset, limit)) => (offset, Some(limit)),
            None => (0, None),
        };
        debug!(sql = %sql, "打开记录流");
        Ok(Box::new(BatchedRows {
            table: self,
            sql,
            params,
            next_offset: offset,
            remaining,
            buffer: VecDeque::new(),
            exhausted: false,
            delivered: 0,
        }))
    }
}

// ==========================================
// BatchedRows - 分批惰性记录流
// ==========================================
// 约定: 每批单独加锁；出错后只产出一次错误即结束
struct BatchedRows<'s> {
    table: &'s SqliteTable,
    sql: String,
    params: Vec<String>,
    next_offset: u64,
    remaining: Option<u64>,
    buffer: VecDeque<Record>,
    exhausted: bool,
    delivered: u64,
}

impl BatchedRows<'_> {
    fn load_batch(&mut self) -> RepositoryResult<()> {
        let batch = self.table.batch_size as u64;
        let limit = self.remaining.map_or(batch, |r| r.min(batch));
        if limit == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let conn = self.table.get_conn()?;
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let limit_sql = limit.min(i64::MAX as u64) as i64;
        let offset_sql = self.next_offset.min(i64::MAX as u64) as i64;
        let mut bound: Vec<&dyn ToSql> = self.params.iter().map(|p| p as &dyn ToSql).collect();
        bound.push(&limit_sql);
        bound.push(&offset_sql);

        let table = self.table;
        let rows = stmt
            .query_map(bound.as_slice(), |row| table.read_record(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let fetched = rows.len() as u64;
        self.next_offset += fetched;
        if let Some(r) = self.remaining.as_mut() {
            *r -= fetched;
        }
        if fetched < limit {
            self.exhausted = true;
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl Iterator for BatchedRows<'_> {
    type Item = RepositoryResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.load_batch() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let record = self.buffer.pop_front()?;
        self.delivered += 1;
        Some(Ok(record))
    }
}

impl Drop for BatchedRows<'_> {
    fn drop(&mut self) {
        if self.exhausted && self.buffer.is_empty() {
            debug!(table = %self.table.table, delivered = self.delivered, "记录流读取完毕");
        } else {
            debug!(table = %self.table.table, delivered = self.delivered, "记录流提前释放");
        }
    }
}

impl ImportStore for SqliteTable {
    fn begin(&mut self) -> RepositoryResult<()> {
        if self.in_transaction {
            return Err(RepositoryError::DatabaseTransactionError(
                "事务已开启".to_string(),
            ));
        }
        self.get_conn()?.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> RepositoryResult<()> {
        self.require_transaction()?;
        self.get_conn()?
            .execute_batch("COMMIT")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> RepositoryResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.get_conn()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn lookup(&mut self, key: &str) -> RepositoryResult<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_list(),
            quote_identifier(&self.table),
            quote_identifier(&self.primary_key)
        );
        let conn = self.get_conn()?;
        let record = conn
            .query_row(&sql, params![key], |row| self.read_record(row))
            .optional()?;
        Ok(record)
    }

    fn save(&mut self, record: &Record, existing: bool) -> RepositoryResult<String> {
        self.require_transaction()?;
        let conn = self.get_conn()?;
        if existing {
            let key = record
                .get(&self.primary_key)
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .ok_or_else(|| RepositoryError::FieldValueError {
                    field: self.primary_key.clone(),
                    message: "主键不能为空".to_string(),
                })?;
            self.update(&conn, &key, record)?;
            Ok(key)
        } else {
            self.insert(&conn, record)
        }
    }

    fn log_action(&mut self, entry: &AuditEntry) -> RepositoryResult<()> {
        self.require_transaction()?;
        let conn = self.get_conn()?;
        insert_entry(&conn, entry)?;
        Ok(())
    }
}
