// ==========================================
// 通用报表引擎 - 内存记录表
// ==========================================
// 职责: 进程内的 QuerySource + ImportStore 实现
// 用途: 嵌入式使用与测试；记录每次提交的写入数（提交日志）
// ==========================================

use crate::domain::action_log::AuditEntry;
use crate::domain::query::{Predicate, Query};
use crate::domain::value::{Record, RecordAccess, Value};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::query_source::{ImportStore, QuerySource, RecordStream};
use tracing::debug;

// 回滚用的撤销项：新增总在末尾追加，更新原位替换
#[derive(Debug, Clone)]
enum Undo {
    Restore(usize, Record),
    Truncate(usize),
}

/// 未提交的事务状态
#[derive(Debug, Clone)]
struct OpenTransaction {
    undo: Vec<Undo>,
    next_id: i64,
    writes: usize,
    audit: Vec<AuditEntry>,
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    entity: String,
    primary_key: String,
    auto_primary_key: bool,
    records: Vec<Record>,
    next_id: i64,
    transaction: Option<OpenTransaction>,
    commits: Vec<usize>,
    audit: Vec<AuditEntry>,
}

impl MemoryTable {
    pub fn new(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            primary_key: primary_key.into(),
            auto_primary_key: false,
            records: Vec::new(),
            next_id: 1,
            transaction: None,
            commits: Vec::new(),
            audit: Vec::new(),
        }
    }

    /// 主键自动分配（整数递增）
    pub fn auto_primary_key(mut self) -> Self {
        self.auto_primary_key = true;
        self
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn insert(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 每次提交包含的写入数（空提交不记录）
    pub fn commit_log(&self) -> &[usize] {
        &self.commits
    }

    /// 已提交的操作日志
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn find(&self, key: &str) -> Option<&Record> {
        self.position(key).map(|i| &self.records[i])
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.get_value(&self.primary_key).to_string() == key)
    }

    fn transaction_mut(&mut self) -> RepositoryResult<&mut OpenTransaction> {
        self.transaction
            .as_mut()
            .ok_or_else(|| RepositoryError::DatabaseTransactionError("没有进行中的事务".to_string()))
    }
}

impl QuerySource for MemoryTable {
    type Item = Record;

    fn count(&self, predicates: &[Predicate]) -> RepositoryResult<u64> {
        let count = self
            .records
            .iter()
            .filter(|r| predicates.iter().all(|p| p.evaluate(*r)))
            .count();
        Ok(count as u64)
    }

    fn fetch(&self, query: &Query) -> RepositoryResult<RecordStream<'_, Record>> {
        let mut matched: Vec<&Record> = self.records.iter().filter(|r| query.accepts(*r)).collect();
        // 稳定排序，主键作为最终次序
        matched.sort_by(|a, b| {
            query.ordering.compare(*a, *b).then_with(|| {
                a.get_value(&self.primary_key)
                    .sort_cmp(&b.get_value(&self.primary_key))
            })
        });
        let (offset, limit) = query.window.unwrap_or((0, u64::MAX));
        let iter = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.min(usize::MAX as u64) as usize)
            .map(|r| RepositoryResult::Ok(r.clone()));
        Ok(Box::new(iter))
    }
}

impl ImportStore for MemoryTable {
    fn begin(&mut self) -> RepositoryResult<()> {
        if self.transaction.is_some() {
            return Err(RepositoryError::DatabaseTransactionError(
                "事务已开启".to_string(),
            ));
        }
        self.transaction = Some(OpenTransaction {
            undo: Vec::new(),
            next_id: self.next_id,
            writes: 0,
            audit: Vec::new(),
        });
        Ok(())
    }

    fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self
            .transaction
            .take()
            .ok_or_else(|| RepositoryError::DatabaseTransactionError("没有进行中的事务".to_string()))?;
        if tx.writes > 0 {
            self.commits.push(tx.writes);
        }
        self.audit.extend(tx.audit);
        debug!(entity = %self.entity, writes = tx.writes, "内存表提交");
        Ok(())
    }

    fn rollback(&mut self) -> RepositoryResult<()> {
        if let Some(tx) = self.transaction.take() {
            for undo in tx.undo.into_iter().rev() {
                match undo {
                    Undo::Restore(i, record) => self.records[i] = record,
                    Undo::Truncate(len) => self.records.truncate(len),
                }
            }
            self.next_id = tx.next_id;
            debug!(entity = %self.entity, discarded = tx.writes, "内存表回滚");
        }
        Ok(())
    }

    fn lookup(&mut self, key: &str) -> RepositoryResult<Option<Record>> {
        Ok(self.find(key).cloned())
    }

    fn save(&mut self, record: &Record, existing: bool) -> RepositoryResult<String> {
        self.transaction_mut()?;
        let mut record = record.clone();

        let key = match record.get_value(&self.primary_key) {
            Value::Null if self.auto_primary_key && !existing => {
                let id = self.next_id;
                self.next_id += 1;
                record.insert(self.primary_key.clone(), Value::Integer(id));
                id.to_string()
            }
            Value::Null => {
                return Err(RepositoryError::FieldValueError {
                    field: self.primary_key.clone(),
                    message: "主键不能为空".to_string(),
                })
            }
            key => key.to_string(),
        };

        let undo = match (existing, self.position(&key)) {
            (true, Some(i)) => Undo::Restore(i, std::mem::replace(&mut self.records[i], record)),
            (true, None) => {
                return Err(RepositoryError::NotFound {
                    entity: self.entity.clone(),
                    id: key,
                })
            }
            (false, Some(_)) => {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "{}.{} = {}",
                    self.entity, self.primary_key, key
                )))
            }
            (false, None) => {
                self.records.push(record);
                Undo::Truncate(self.records.len() - 1)
            }
        };
        let tx = self.transaction_mut()?;
        tx.undo.push(undo);
        tx.writes += 1;
        Ok(key)
    }

    fn log_action(&mut self, entry: &AuditEntry) -> RepositoryResult<()> {
        self.transaction_mut()?.audit.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::OrderDescriptor;
    use crate::domain::types::{FilterOperator, SortDirection};

    fn rec(name: &str, qty: i64) -> Record {
        let mut r = Record::new();
        r.insert("name".to_string(), Value::text(name));
        r.insert("qty".to_string(), Value::Integer(qty));
        r
    }

    fn table() -> MemoryTable {
        MemoryTable::new("demand", "name").with_records(vec![
            rec("c", 5),
            rec("a", 20),
            rec("b", 5),
            rec("d", 1),
        ])
    }

    #[test]
    fn test_fetch_filters_sorts_and_slices() {
        let t = table();
        let mut ordering = OrderDescriptor::default();
        ordering.push("qty", SortDirection::Asc);
        let query = Query::new(
            vec![Predicate::new("qty", FilterOperator::Gte, "5")],
            ordering,
        );
        assert_eq!(t.count(&query.predicates).unwrap(), 3);

        let names: Vec<String> = t
            .fetch(&query)
            .unwrap()
            .map(|r| r.unwrap().get_value("name").to_string())
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        let names: Vec<String> = t
            .fetch(&query.clone().window(1, 1))
            .unwrap()
            .map(|r| r.unwrap().get_value("name").to_string())
            .collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn test_commit_log_and_rollback() {
        let mut t = MemoryTable::new("demand", "name");
        t.begin().unwrap();
        t.save(&rec("x", 1), false).unwrap();
        t.save(&rec("y", 2), false).unwrap();
        t.commit().unwrap();

        t.begin().unwrap();
        t.save(&rec("z", 3), false).unwrap();
        t.rollback().unwrap();

        assert_eq!(t.commit_log(), &[2]);
        assert_eq!(t.len(), 2);
        assert!(t.find("z").is_none());
    }

    #[test]
    fn test_rollback_undoes_updates_and_inserts_of_chunk() {
        let mut t = table();
        let before = t.records().to_vec();
        t.begin().unwrap();
        t.save(&rec("a", 100), true).unwrap();
        t.save(&rec("n1", 1), false).unwrap();
        t.save(&rec("a", 200), true).unwrap();
        t.save(&rec("n2", 2), false).unwrap();
        t.rollback().unwrap();

        assert_eq!(t.records(), before.as_slice());
        assert!(t.commit_log().is_empty());
    }

    #[test]
    fn test_save_requires_transaction_and_assigns_ids() {
        let mut t = MemoryTable::new("location", "id").auto_primary_key();
        assert!(t.save(&Record::new(), false).is_err());

        t.begin().unwrap();
        assert_eq!(t.save(&Record::new(), false).unwrap(), "1");
        assert_eq!(t.save(&Record::new(), false).unwrap(), "2");
        t.commit().unwrap();
        assert!(t.find("2").is_some());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut t = table();
        t.begin().unwrap();
        assert!(matches!(
            t.save(&rec("a", 1), false),
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
    }
}
