// ==========================================
// 通用报表引擎 - 记录源接口
// ==========================================
// 职责: 定义报表读取（QuerySource）与导入写入（ImportStore）两类数据访问接口
// 实现者: SqliteTable, MemoryTable
// ==========================================

use crate::domain::action_log::AuditEntry;
use crate::domain::query::{Predicate, Query};
use crate::domain::value::{Record, RecordAccess};
use crate::repository::error::RepositoryResult;

/// 惰性记录流
pub type RecordStream<'s, T> = Box<dyn Iterator<Item = RepositoryResult<T>> + 's>;

// ==========================================
// QuerySource Trait
// ==========================================
// 用途: 报表读取（过滤、排序、切片、计数）
pub trait QuerySource {
    type Item: RecordAccess;

    /// 满足谓词的记录数
    ///
    /// # 参数
    /// - predicates: 过滤谓词（AND）；为空时返回全部记录数
    fn count(&self, predicates: &[Predicate]) -> RepositoryResult<u64>;

    /// 按查询描述读取记录
    ///
    /// # 返回
    /// - 惰性记录流；首次拉取时才真正访问底层存储
    fn fetch(&self, query: &Query) -> RepositoryResult<RecordStream<'_, Self::Item>>;
}

// ==========================================
// ImportStore Trait
// ==========================================
// 用途: 批量导入的事务化写入
// 约定: begin/commit 成对出现；rollback 只撤销当前未提交的分块
pub trait ImportStore {
    fn begin(&mut self) -> RepositoryResult<()>;

    fn commit(&mut self) -> RepositoryResult<()>;

    fn rollback(&mut self) -> RepositoryResult<()>;

    /// 按主键查找已有记录
    fn lookup(&mut self, key: &str) -> RepositoryResult<Option<Record>>;

    /// 保存记录
    ///
    /// # 参数
    /// - record: 完整记录（已合并原值）
    /// - existing: true 为更新，false 为新增
    ///
    /// # 返回
    /// - 目标记录主键（自动分配主键时为新分配的值）
    fn save(&mut self, record: &Record, existing: bool) -> RepositoryResult<String>;

    /// 写入操作日志
    fn log_action(&mut self, entry: &AuditEntry) -> RepositoryResult<()>;
}
