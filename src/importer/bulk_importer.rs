// ==========================================
// 通用报表引擎 - 批量导入器
// ==========================================
// 职责: 分隔文本 → 新增/更新记录 + 操作日志
// 流程: 表头映射 → 逐行解析校验 → 查找主键 → 保存 → 记录日志 → 分块提交
// 红线: 表头错误在任何写入之前中止；行级问题不中止导入
// ==========================================

use crate::domain::action_log::{AuditAction, AuditEntry};
use crate::domain::import::{ImportFailure, ImportOutcome, ImportSchema, ImportWarning};
use crate::domain::types::CsvDelimiter;
use crate::domain::value::{Record, RecordAccess, Value};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_validator::{same_value, FieldValidator, REQUIRED_MESSAGE};
use crate::importer::file_parser::UploadParser;
use crate::importer::header_mapper::HeaderMap;
use crate::repository::error::RepositoryResult;
use crate::repository::query_source::ImportStore;
use csv::StringRecord;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

/// 默认分块大小（每块一个事务）
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// 单行处理结果
#[derive(Debug)]
enum RowOutcome {
    Added,
    Changed,
    Unchanged,
    Invalid(Vec<ImportWarning>),
}

// ==========================================
// BulkImporter
// ==========================================
pub struct BulkImporter<'s> {
    schema: &'s ImportSchema,
    actor: String,
    chunk_size: usize,
    delimiter: CsvDelimiter,
}

impl<'s> BulkImporter<'s> {
    pub fn new(schema: &'s ImportSchema, actor: impl Into<String>) -> Self {
        Self {
            schema,
            actor: actor.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter: CsvDelimiter::Comma,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_delimiter(mut self, delimiter: CsvDelimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// 执行导入
    ///
    /// # 参数
    /// - `raw`: 上传的分隔文本
    /// - `store`: 目标记录存储
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 计数 + 告警 + 错误（表头错误时计数为 0 且无写入）
    /// - Err(ImportError): 逃逸出行处理的错误（解析/事务），当前未提交分块已回滚
    #[instrument(skip(self, raw, store), fields(entity = %self.schema.entity, actor = %self.actor))]
    pub fn import<S: ImportStore + ?Sized>(
        &self,
        raw: &str,
        store: &mut S,
    ) -> ImportResult<ImportOutcome> {
        if !self.schema.auto_primary_key && self.schema.primary_key_field().is_none() {
            return Err(ImportError::InvalidSchema(format!(
                "主键字段 {} 不在导入字段中",
                self.schema.primary_key
            )));
        }

        let mut parser = UploadParser::new(raw, self.delimiter.as_byte());
        let tokens = match parser.header()? {
            Some(tokens) => tokens,
            None => {
                info!("上传内容为空");
                return Ok(ImportOutcome::default());
            }
        };

        let header = match HeaderMap::build(self.schema, &tokens) {
            Ok(header) => header,
            Err(errors) => {
                warn!(errors = errors.len(), "表头错误，导入中止");
                return Ok(ImportOutcome::aborted(errors));
            }
        };
        debug!(columns = tokens.len(), "表头映射完成");

        let mut outcome = ImportOutcome::default();
        let mut open = false;
        match self.process_rows(&header, parser, store, &mut outcome, &mut open) {
            Ok(()) => {
                if open {
                    if let Err(e) = store.commit() {
                        return Err(self.abort(store, e.into()));
                    }
                }
                info!(
                    added = outcome.added,
                    changed = outcome.changed,
                    warnings = outcome.warnings.len(),
                    errors = outcome.errors.len(),
                    "导入完成"
                );
                Ok(outcome)
            }
            Err(e) if open => Err(self.abort(store, e)),
            Err(e) => {
                error!(error = %e, "导入中止");
                Err(e)
            }
        }
    }

    /// 回滚当前未提交分块并返回原错误
    fn abort<S: ImportStore + ?Sized>(&self, store: &mut S, err: ImportError) -> ImportError {
        error!(error = %err, "导入中止，回滚未提交分块");
        if let Err(rollback_err) = store.rollback() {
            error!(error = %rollback_err, "回滚失败");
        }
        err
    }

    fn process_rows<S: ImportStore + ?Sized>(
        &self,
        header: &HeaderMap,
        parser: UploadParser<'_>,
        store: &mut S,
        outcome: &mut ImportOutcome,
        open: &mut bool,
    ) -> ImportResult<()> {
        for (idx, row) in parser.enumerate() {
            let row_number = idx + 1;
            let row = row?;

            if !*open {
                store.begin()?;
                *open = true;
            }

            match self.import_row(row_number, header, &row, store) {
                Ok(RowOutcome::Added) => outcome.added += 1,
                Ok(RowOutcome::Changed) => outcome.changed += 1,
                Ok(RowOutcome::Unchanged) => debug!(row = row_number, "记录未变化"),
                Ok(RowOutcome::Invalid(warnings)) => {
                    warn!(row = row_number, count = warnings.len(), "行校验失败，已跳过");
                    outcome.warnings.extend(warnings);
                }
                Err(e) => {
                    warn!(row = row_number, error = %e, "行导入异常");
                    outcome.errors.push(ImportFailure::row(row_number, e.to_string()));
                }
            }

            if row_number % self.chunk_size == 0 {
                store.commit()?;
                *open = false;
                debug!(row = row_number, "分块已提交");
            }
        }
        Ok(())
    }

    fn import_row<S: ImportStore + ?Sized>(
        &self,
        row_number: usize,
        header: &HeaderMap,
        row: &StringRecord,
        store: &mut S,
    ) -> RepositoryResult<RowOutcome> {
        let fields = &self.schema.fields;
        let mut warnings = Vec::new();
        let mut parsed: Vec<(usize, Value)> = Vec::new();
        let mut supplied: Vec<usize> = Vec::new();

        for (i, raw) in header.values(row) {
            supplied.push(i);
            match FieldValidator::parse(&fields[i], raw) {
                Ok(value) => parsed.push((i, value)),
                Err(message) => warnings.push(ImportWarning {
                    row: row_number,
                    field: Some(fields[i].name.clone()),
                    value: Some(raw.to_string()),
                    message,
                }),
            }
        }

        let pk = &self.schema.primary_key;
        let key = parsed
            .iter()
            .find(|(i, _)| fields[*i].name == *pk)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
            .map(|v| v.to_string());

        let pk_warned = warnings.iter().any(|w| w.field.as_deref() == Some(pk.as_str()));
        if key.is_none() && !self.schema.auto_primary_key && !pk_warned {
            warnings.push(self.required_warning(row_number, pk, Some("")));
        }

        let existing = match &key {
            Some(k) => store.lookup(k)?,
            None => None,
        };

        match existing {
            Some(existing) => self.update_row(row_number, existing, parsed, warnings, store),
            None => {
                for field in FieldValidator::missing_required(fields, &supplied) {
                    if field.name == *pk && self.schema.auto_primary_key {
                        continue;
                    }
                    warnings.push(self.required_warning(row_number, &field.name, None));
                }
                self.insert_row(row_number, parsed, &supplied, warnings, store)
            }
        }
    }

    fn update_row<S: ImportStore + ?Sized>(
        &self,
        row_number: usize,
        existing: Record,
        parsed: Vec<(usize, Value)>,
        warnings: Vec<ImportWarning>,
        store: &mut S,
    ) -> RepositoryResult<RowOutcome> {
        if !warnings.is_empty() {
            return Ok(RowOutcome::Invalid(warnings));
        }

        let fields = &self.schema.fields;
        let changes: BTreeMap<String, Value> = parsed
            .into_iter()
            .filter(|(i, v)| !same_value(v, &existing.get_value(&fields[*i].name)))
            .map(|(i, v)| (fields[i].name.clone(), v))
            .collect();
        if changes.is_empty() {
            return Ok(RowOutcome::Unchanged);
        }

        let mut record = existing;
        record.extend(changes.clone());
        let target_id = store.save(&record, true)?;
        self.log(store, &target_id, AuditAction::Changed, &changes)?;
        debug!(row = row_number, target = %target_id, fields = changes.len(), "记录已更新");
        Ok(RowOutcome::Changed)
    }

    fn insert_row<S: ImportStore + ?Sized>(
        &self,
        row_number: usize,
        parsed: Vec<(usize, Value)>,
        supplied: &[usize],
        warnings: Vec<ImportWarning>,
        store: &mut S,
    ) -> RepositoryResult<RowOutcome> {
        if !warnings.is_empty() {
            return Ok(RowOutcome::Invalid(warnings));
        }

        let fields = &self.schema.fields;
        let mut record = Record::new();
        for (i, field) in fields.iter().enumerate() {
            if let (Some(default), false) = (&field.default, supplied.contains(&i)) {
                record.insert(field.name.clone(), default.clone());
            }
        }

        let mut changes = BTreeMap::new();
        for (i, value) in parsed {
            if !value.is_null() {
                changes.insert(fields[i].name.clone(), value.clone());
            }
            record.insert(fields[i].name.clone(), value);
        }
        if changes.is_empty() {
            return Ok(RowOutcome::Unchanged);
        }

        let target_id = store.save(&record, false)?;
        self.log(store, &target_id, AuditAction::Added, &changes)?;
        debug!(row = row_number, target = %target_id, "记录已新增");
        Ok(RowOutcome::Added)
    }

    fn log<S: ImportStore + ?Sized>(
        &self,
        store: &mut S,
        target_id: &str,
        action: AuditAction,
        changes: &BTreeMap<String, Value>,
    ) -> RepositoryResult<()> {
        let names: Vec<String> = changes.keys().cloned().collect();
        let entry = AuditEntry::new(&self.actor, &self.schema.entity, target_id, action, &names)
            .with_payload(changes);
        store.log_action(&entry)
    }

    fn required_warning(&self, row: usize, field: &str, value: Option<&str>) -> ImportWarning {
        ImportWarning {
            row,
            field: Some(field.to_string()),
            value: value.map(str::to_string),
            message: REQUIRED_MESSAGE.to_string(),
        }
    }
}
