// ==========================================
// 通用报表引擎 - 报表 API
// ==========================================
// 职责: 编排一次报表请求（分页渲染 / CSV 导出 / 数据上传）
// 约束: 只组合引擎与仓储，不直接拼 SQL
// 红线: 单实体视图忽略全部过滤参数
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, EngineConfig};
use crate::domain::import::{FailureKind, ImportOutcome};
use crate::domain::preference::UserPreference;
use crate::domain::query::{OrderDescriptor, OrderTerm, Predicate, Query};
use crate::domain::report::{BucketSpec, ReportDefinition, SortKey};
use crate::domain::request::{RequestContext, PAGE_PARAM, REPORT_TYPE_PARAM, SORT_PARAM};
use crate::domain::types::{CsvDelimiter, OutputFormat, ReportKind, SortDirection};
use crate::engine::buckets::{select_buckets, BucketSelection};
use crate::engine::csv_stream::{CsvOptions, CsvShape, CsvStream};
use crate::engine::filter::{active_filters, filter_editor, FilterChain, FilterEditorEntry, FilterSummary};
use crate::engine::header::{column_header, cross_header, row_header, ColumnHeader, CrossHeader, RowHeader};
use crate::engine::paginator::{PageLink, PageWindow, Paginator};
use crate::engine::sort_codec::SortCodec;
use crate::importer::BulkImporter;
use crate::repository::{BucketRepository, ImportStore, PreferenceRepository, QuerySource, RecordStream};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info, instrument, warn};

/// 未登录请求使用的偏好归属
pub const ANONYMOUS_USER: &str = "anonymous";

// ==========================================
// 响应结构
// ==========================================

/// 分页渲染结果
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage<R> {
    pub title: String,
    pub kind: ReportKind,
    /// 规范化后的排序令牌
    pub sort: String,
    /// 请求的排序令牌无效，已回退到默认排序
    pub sort_fallback: bool,
    /// 位置式排序（"3 desc, 1 asc"），供手写报表查询使用
    pub positional_sort: String,
    pub row_header: RowHeader,
    pub cross_header: Vec<CrossHeader>,
    pub column_header: Vec<ColumnHeader>,
    /// 透视报表的时间桶选择
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckets: Option<BucketSelection>,
    pub rows: Vec<R>,
    pub window: PageWindow,
    pub links: Vec<PageLink>,
    /// 过滤后的记录数
    pub hits: u64,
    /// 未过滤的记录数
    pub full_hits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterSummary>,
    pub filter_editor: Vec<FilterEditorEntry>,
    pub editable: bool,
    pub is_popup: bool,
}

/// 上传结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// 表头错误，未写入任何数据
    Aborted,
    /// 部分行导入异常；其余行已处理，已提交的分块保留
    CompletedWithErrors,
    /// 已处理，但部分行存在告警
    CompletedWithWarnings,
    Succeeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub status: UploadStatus,
    pub message: String,
    pub outcome: ImportOutcome,
}

impl UploadResponse {
    fn from_outcome(outcome: ImportOutcome) -> Self {
        let details = || {
            outcome
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        };
        let counts = format!(
            "修改 {} 条，新增 {} 条记录",
            outcome.changed, outcome.added
        );
        let header_failed = outcome.errors.iter().any(|e| e.kind != FailureKind::Row);

        let (status, message) = if header_failed {
            (
                UploadStatus::Aborted,
                format!("上传失败，未写入任何数据: {}", details()),
            )
        } else if !outcome.errors.is_empty() {
            (
                UploadStatus::CompletedWithErrors,
                format!(
                    "上传部分完成（{} 行异常，{} 条告警）: {}; {}",
                    outcome.errors.len(),
                    outcome.warnings.len(),
                    counts,
                    details()
                ),
            )
        } else if !outcome.warnings.is_empty() {
            (
                UploadStatus::CompletedWithWarnings,
                format!("上传完成（{} 条告警）: {}", outcome.warnings.len(), counts),
            )
        } else {
            (UploadStatus::Succeeded, format!("上传成功: {}", counts))
        };
        Self {
            status,
            message,
            outcome,
        }
    }
}

/// 渲染或导出
#[derive(Debug)]
pub enum ReportOutput<R> {
    Page(ReportPage<R>),
    Export(ExportPlan),
}

// ==========================================
// ExportPlan - 已解析的导出请求
// ==========================================
// 不持有数据源；stream() 时才开始读取
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub filename: String,
    pub shape: CsvShape,
    options: CsvOptions,
    query: Query,
    buckets: Vec<BucketSpec>,
}

impl ExportPlan {
    pub fn delimiter(&self) -> CsvDelimiter {
        self.options.delimiter
    }

    pub fn buckets(&self) -> &[BucketSpec] {
        &self.buckets
    }

    /// 惰性 CSV 行流（首行为表头）
    pub fn stream<'a, S: QuerySource>(
        &'a self,
        definition: &'a ReportDefinition,
        source: &'a S,
    ) -> ApiResult<CsvStream<'a, RecordStream<'a, S::Item>, S::Item>> {
        let records = source.fetch(&self.query)?;
        Ok(CsvStream::new(
            definition,
            self.shape,
            self.options.clone(),
            &self.buckets,
            records,
        ))
    }

    /// 逐行写出到 out
    ///
    /// # 返回
    /// - Ok(u64): 写出的字节数
    #[instrument(skip_all, fields(report = %definition.title(), file = %self.filename))]
    pub fn write_to<S: QuerySource, W: Write>(
        &self,
        definition: &ReportDefinition,
        source: &S,
        out: &mut W,
    ) -> ApiResult<u64> {
        let mut written = 0u64;
        for line in self.stream(definition, source)? {
            let line = line?;
            out.write_all(&line)
                .map_err(|e| ApiError::Internal(format!("写出 CSV 失败: {}", e)))?;
            written += line.len() as u64;
        }
        out.flush()
            .map_err(|e| ApiError::Internal(format!("写出 CSV 失败: {}", e)))?;
        Ok(written)
    }
}

// ==========================================
// ReportApi
// ==========================================
pub struct ReportApi {
    config: EngineConfig,
    current_date: NaiveDate,
    preferences: Option<PreferenceRepository>,
    buckets: Option<BucketRepository>,
}

impl ReportApi {
    /// 创建不带持久化偏好/时间桶的实例
    pub fn new(config: EngineConfig, current_date: NaiveDate) -> Self {
        Self {
            config,
            current_date,
            preferences: None,
            buckets: None,
        }
    }

    /// 从配置管理器创建（共享其数据库连接）
    pub fn from_config_manager(manager: &ConfigManager) -> ApiResult<Self> {
        let config = manager.load_engine_config()?;
        let current_date = manager.current_date()?;
        let conn = manager.connection();
        Ok(Self::new(config, current_date)
            .with_preferences(PreferenceRepository::new(conn.clone()))
            .with_buckets(BucketRepository::new(conn)))
    }

    pub fn with_preferences(mut self, repo: PreferenceRepository) -> Self {
        self.preferences = Some(repo);
        self
    }

    pub fn with_buckets(mut self, repo: BucketRepository) -> Self {
        self.buckets = Some(repo);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 按 reporttype 分派到渲染或导出
    pub fn respond<S: QuerySource>(
        &self,
        definition: &ReportDefinition,
        source: &S,
        ctx: &RequestContext,
        entity: Option<&str>,
    ) -> ApiResult<ReportOutput<S::Item>> {
        let format = OutputFormat::from_param(ctx.params.get(REPORT_TYPE_PARAM));
        if format.is_csv() {
            self.prepare_export(definition, ctx, entity)
                .map(ReportOutput::Export)
        } else {
            self.render_page(definition, source, ctx, entity)
                .map(ReportOutput::Page)
        }
    }

    /// 渲染一页报表
    ///
    /// # 参数
    /// - `entity`: 单实体视图的主键值；给出时忽略全部过滤参数
    ///
    /// # 返回
    /// - Err(BadRequest): 过滤参数无效 / 字段不可查询
    /// - Err(NotFound): 页码无效或超出范围
    #[instrument(skip_all, fields(report = %definition.title(), path = %ctx.path))]
    pub fn render_page<S: QuerySource>(
        &self,
        definition: &ReportDefinition,
        source: &S,
        ctx: &RequestContext,
        entity: Option<&str>,
    ) -> ApiResult<ReportPage<S::Item>> {
        let codec = SortCodec::new(definition);
        let decision = codec.decode(ctx.params.get(SORT_PARAM));
        let sort = decision.key();

        let predicates = request_predicates(definition, ctx, entity)?;
        let hits = source.count(&predicates)?;
        let full_hits = if predicates.is_empty() {
            hits
        } else {
            source.count(&[])?
        };

        let paginator = self
            .config
            .paginator(definition.page_size().map(u64::from));
        let page = Paginator::parse_page(ctx.params.get(PAGE_PARAM))?;
        let window = paginator.window(hits, page)?;

        let query = Query::new(predicates, codec.ordering(sort))
            .window(window.offset(), window.page_size);
        let rows = source
            .fetch(&query)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(hits, full_hits, page = window.page, rows = rows.len(), "报表页已读取");

        let (buckets, column_header) = match definition.kind() {
            ReportKind::Pivot => {
                let (selection, buckets) = self.bucket_selection(ctx)?;
                (Some(selection), column_header(&buckets))
            }
            ReportKind::List => (None, Vec::new()),
        };

        // 单实体视图不展示过滤摘要
        let filters = match entity {
            Some(_) => None,
            None => active_filters(definition, ctx),
        };

        Ok(ReportPage {
            title: definition.title().to_string(),
            kind: definition.kind(),
            sort: codec.encode(sort),
            sort_fallback: decision.is_fallback(),
            positional_sort: codec.positional_sql(sort),
            row_header: row_header(definition, sort, ctx),
            cross_header: cross_header(definition, ctx),
            column_header,
            buckets,
            rows,
            links: paginator.links(&window, ctx),
            window,
            hits,
            full_hits,
            entity: entity.map(str::to_string),
            filters,
            filter_editor: filter_editor(definition, ctx),
            editable: definition.is_editable(),
            is_popup: ctx.is_popup(),
        })
    }

    /// 解析导出请求：文件名、形态、分隔符与全量查询（不分页）
    ///
    /// # 返回
    /// - Err(BadRequest): 用户偏好中的分隔符不受支持 / 过滤参数无效
    #[instrument(skip_all, fields(report = %definition.title()))]
    pub fn prepare_export(
        &self,
        definition: &ReportDefinition,
        ctx: &RequestContext,
        entity: Option<&str>,
    ) -> ApiResult<ExportPlan> {
        let format = match OutputFormat::from_param(ctx.params.get(REPORT_TYPE_PARAM)) {
            OutputFormat::Html => OutputFormat::Csv,
            format => format,
        };
        let shape = CsvShape::select(definition.kind(), format)
            .ok_or_else(|| ApiError::Internal(format!("无法确定导出形态: {:?}", format)))?;

        let delimiter = self.export_delimiter(ctx)?;
        let options = self.config.csv_options(delimiter)?;

        let codec = SortCodec::new(definition);
        let sort = codec.decode(ctx.params.get(SORT_PARAM)).key();
        let predicates = request_predicates(definition, ctx, entity)?;
        let query = Query::new(predicates, export_ordering(definition, &codec, sort, shape));

        let buckets = match shape {
            CsvShape::PivotTable | CsvShape::PivotList => self.bucket_selection(ctx)?.1,
            CsvShape::FlatList => Vec::new(),
        };

        let filename = format!("{}.csv", definition.title().to_lowercase());
        info!(file = %filename, ?shape, %delimiter, "导出请求已解析");
        Ok(ExportPlan {
            filename,
            shape,
            options,
            query,
            buckets,
        })
    }

    /// 上传 CSV 数据
    ///
    /// # 参数
    /// - `raw`: 上传文件内容（UTF-8，可带 BOM）
    /// - `actor`: 操作人，写入审计日志
    ///
    /// # 返回
    /// - Err(InvalidUpload): 报表不可编辑、没有导入模式或 CSV 无法解析
    pub fn upload<S: ImportStore + ?Sized>(
        &self,
        definition: &ReportDefinition,
        raw: &[u8],
        store: &mut S,
        actor: &str,
    ) -> ApiResult<UploadResponse> {
        if !definition.is_editable() {
            return Err(ApiError::InvalidUpload(format!(
                "报表 {} 不可编辑",
                definition.title()
            )));
        }
        let schema = definition.import_schema().ok_or_else(|| {
            ApiError::InvalidUpload(format!("报表 {} 不支持上传", definition.title()))
        })?;

        let (text, _, malformed) = encoding_rs::UTF_8.decode(raw);
        if malformed {
            warn!(report = %definition.title(), "上传内容包含无效的 UTF-8 字节，已替换");
        }

        let outcome = BulkImporter::new(schema, actor)
            .with_chunk_size(self.config.import_chunk_size)
            .with_delimiter(self.config.import_delimiter)
            .import(&text, store)?;

        let response = UploadResponse::from_outcome(outcome);
        info!(
            report = %definition.title(),
            status = ?response.status,
            added = response.outcome.added,
            changed = response.outcome.changed,
            "上传处理完成"
        );
        Ok(response)
    }

    /// 透视报表的时间桶选择（显式参数变化时保存用户偏好）
    ///
    /// # 返回
    /// - (选择, 方案内落在范围中的时间桶)
    pub fn bucket_selection(
        &self,
        ctx: &RequestContext,
    ) -> ApiResult<(BucketSelection, Vec<BucketSpec>)> {
        let mut pref = self.load_preference(ctx)?;
        let (selection, changed) = select_buckets(&ctx.params, &mut pref, self.current_date);
        if changed {
            if let (Some(repo), Some(_)) = (&self.preferences, ctx.user_id.as_deref()) {
                repo.upsert(&pref)?;
                debug!(user = %pref.user_id, scheme = %selection.scheme, "时间桶偏好已保存");
            }
        }
        let buckets = match &self.buckets {
            Some(repo) => selection.filter(repo.list_by_scheme(&selection.scheme)?),
            None => Vec::new(),
        };
        Ok((selection, buckets))
    }

    fn load_preference(&self, ctx: &RequestContext) -> ApiResult<UserPreference> {
        match (&self.preferences, ctx.user_id.as_deref()) {
            (Some(repo), Some(user)) => Ok(repo.get_or_default(user)?),
            (_, user) => Ok(UserPreference::new(user.unwrap_or(ANONYMOUS_USER))),
        }
    }

    /// 用户偏好中的分隔符；无偏好记录时使用引擎配置
    fn export_delimiter(&self, ctx: &RequestContext) -> ApiResult<CsvDelimiter> {
        let stored = match (&self.preferences, ctx.user_id.as_deref()) {
            (Some(repo), Some(user)) => repo.find(user)?,
            _ => None,
        };
        match stored {
            Some(pref) => Ok(pref.csv_delimiter.parse::<CsvDelimiter>()?),
            None => Ok(self.config.csv_delimiter),
        }
    }
}

/// 导出排序：透视-表格先按首个行字段让实体相邻，透视形态最后按桶字段
fn export_ordering(
    definition: &ReportDefinition,
    codec: &SortCodec,
    sort: SortKey,
    shape: CsvShape,
) -> OrderDescriptor {
    let mut ordering = OrderDescriptor::default();
    if shape == CsvShape::PivotTable {
        let direction = if sort.field_index == 1 {
            sort.direction
        } else {
            SortDirection::Asc
        };
        ordering.push(definition.rows()[0].key.as_str(), direction);
    }
    let mut tail = codec.ordering(sort).terms;
    if shape != CsvShape::FlatList {
        for column in definition.columns() {
            tail.push(OrderTerm {
                field: column.key.clone(),
                direction: SortDirection::Asc,
            });
        }
    }
    for term in tail {
        if ordering.terms.iter().all(|t| t.field != term.field) {
            ordering.push(term.field, term.direction);
        }
    }
    ordering
}

fn request_predicates(
    definition: &ReportDefinition,
    ctx: &RequestContext,
    entity: Option<&str>,
) -> ApiResult<Vec<Predicate>> {
    let chain = match entity {
        Some(entity) => FilterChain::for_entity(definition.primary_key(), entity),
        None => FilterChain::from_params(&ctx.params)?,
    };
    Ok(chain.into_predicates())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action_log::AuditEntry;
    use crate::domain::import::{FieldKind, ImportSchema, SchemaField};
    use crate::domain::report::RowSpec;
    use crate::domain::request::QueryParams;
    use crate::domain::value::{Record, RecordAccess, Value};
    use crate::repository::error::RepositoryResult;
    use crate::repository::MemoryTable;

    fn definition() -> ReportDefinition {
        ReportDefinition::list("Demand")
            .row(RowSpec::new("name"))
            .row(RowSpec::new("qty"))
            .page_size(2)
            .import_schema(
                ImportSchema::new("demand", "name")
                    .field(SchemaField::text("name"))
                    .field(SchemaField::new("qty", FieldKind::Integer)),
            )
            .build()
            .unwrap()
    }

    fn table() -> MemoryTable {
        let rows = [("a", 1), ("b", 7), ("c", 12), ("d", 30)];
        MemoryTable::new("demand", "name").with_records(rows.iter().map(|(n, q)| {
            let mut r = Record::new();
            r.insert("name".to_string(), Value::text(*n));
            r.insert("qty".to_string(), Value::Integer(*q));
            r
        }))
    }

    fn api() -> ReportApi {
        ReportApi::new(
            EngineConfig::default(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    fn ctx(query: &str) -> RequestContext {
        RequestContext::new("/demand/", QueryParams::parse(query))
    }

    #[test]
    fn test_render_page_filters_and_counts() {
        let page = api()
            .render_page(&definition(), &table(), &ctx("qty__gte=5&o=2d"), None)
            .unwrap();
        assert_eq!(page.hits, 3);
        assert_eq!(page.full_hits, 4);
        assert_eq!(page.window.total_pages(), 2);
        let names: Vec<String> = page.rows.iter().map(|r| r.get_value("name").to_string()).collect();
        assert_eq!(names, vec!["d", "c"]);
        assert_eq!(page.sort, "2d");
        assert!(page.filters.is_some());
    }

    #[test]
    fn test_entity_view_ignores_filters() {
        let page = api()
            .render_page(&definition(), &table(), &ctx("qty__gte=100"), Some("b"))
            .unwrap();
        assert_eq!(page.hits, 1);
        assert_eq!(page.rows[0].get_value("qty"), Value::Integer(7));
        assert!(page.filters.is_none());
    }

    #[test]
    fn test_page_out_of_range_is_not_found() {
        let err = api()
            .render_page(&definition(), &table(), &ctx("p=9"), None)
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_respond_dispatches_export() {
        let def = definition();
        let out = api()
            .respond(&def, &table(), &ctx("reporttype=csv&name__exact=a"), None)
            .unwrap();
        let ReportOutput::Export(plan) = out else {
            panic!("expected export");
        };
        assert_eq!(plan.filename, "demand.csv");
        let mut buf = Vec::new();
        plan.write_to(&def, &table(), &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"Name\",\"Qty\"\n\"a\",1\n");
    }

    #[test]
    fn test_upload_classifies_outcome() {
        let def = definition();
        let mut store = table();
        let response = api()
            .upload(&def, b"name,qty\na,2\nz,5\n", &mut store, "tester")
            .unwrap();
        assert_eq!(response.status, UploadStatus::Succeeded);
        assert_eq!((response.outcome.changed, response.outcome.added), (1, 1));

        let response = api()
            .upload(&def, b"name,colour\na,red\n", &mut store, "tester")
            .unwrap();
        assert_eq!(response.status, UploadStatus::Aborted);
        assert!(response.message.starts_with("上传失败，未写入任何数据"));
        assert_eq!((response.outcome.changed, response.outcome.added), (0, 0));
    }

    // 保存指定主键时失败的存储
    struct FailingStore {
        inner: MemoryTable,
        fail_on: &'static str,
    }

    impl ImportStore for FailingStore {
        fn begin(&mut self) -> RepositoryResult<()> {
            self.inner.begin()
        }

        fn commit(&mut self) -> RepositoryResult<()> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> RepositoryResult<()> {
            self.inner.rollback()
        }

        fn lookup(&mut self, key: &str) -> RepositoryResult<Option<Record>> {
            self.inner.lookup(key)
        }

        fn save(&mut self, record: &Record, existing: bool) -> RepositoryResult<String> {
            if record.get_value("name").to_string() == self.fail_on {
                return Err(anyhow::anyhow!("disk full").into());
            }
            self.inner.save(record, existing)
        }

        fn log_action(&mut self, entry: &AuditEntry) -> RepositoryResult<()> {
            self.inner.log_action(entry)
        }
    }

    #[test]
    fn test_row_failure_keeps_committed_counts() {
        let api = ReportApi::new(
            EngineConfig {
                import_chunk_size: 1,
                ..EngineConfig::default()
            },
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let mut store = FailingStore {
            inner: MemoryTable::new("demand", "name"),
            fail_on: "y",
        };
        let response = api
            .upload(&definition(), b"name,qty\nx,1\ny,2\nz,3\n", &mut store, "tester")
            .unwrap();

        assert_eq!(response.status, UploadStatus::CompletedWithErrors);
        assert_eq!(response.outcome.added, 2);
        assert_eq!(response.outcome.errors.len(), 1);
        assert_eq!(response.outcome.errors[0].row, Some(2));
        assert!(response.message.contains("修改 0 条，新增 2 条记录"), "{}", response.message);
        assert!(response.message.contains("disk full"));
        assert!(store.inner.find("x").is_some());
        assert!(store.inner.find("y").is_none());
        assert!(store.inner.find("z").is_some());
    }

    #[test]
    fn test_upload_rejected_for_read_only_report() {
        let def = ReportDefinition::list("Locked")
            .row(RowSpec::new("name"))
            .editable(false)
            .build()
            .unwrap();
        let err = api()
            .upload(&def, b"name\na\n", &mut table(), "tester")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUpload(_)));
    }
}
