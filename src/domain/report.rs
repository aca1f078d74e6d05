// ==========================================
// 通用报表引擎 - 报表定义领域模型
// ==========================================
// 职责: 行定义/交叉指标/桶字段/时间桶 + 不可变的报表定义对象
// 约束: 报表定义在注册时一次性构建并校验，请求期间只读
// ==========================================

use crate::domain::import::ImportSchema;
use crate::domain::request::RequestContext;
use crate::domain::types::{ReportKind, SortDirection};
use crate::engine::filter::FilterWidget;
use crate::engine::sort_codec::parse_token;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// 默认排序令牌
pub const DEFAULT_SORT_TOKEN: &str = "1a";

// ==========================================
// SortKey - 已校验的排序键
// ==========================================
// field_index 为 1 基序号，指向 rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field_index: usize,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field_index: usize, direction: SortDirection) -> Self {
        Self {
            field_index,
            direction,
        }
    }

    /// 规范化的排序令牌，如 "3d"
    pub fn encode(&self) -> String {
        format!("{}{}", self.field_index, self.direction.as_char())
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

// ==========================================
// RowSpec - 行（列）定义
// ==========================================
// 顺序决定显示列顺序与排序令牌的序号
#[derive(Debug, Clone)]
pub struct RowSpec {
    pub key: String,
    pub title: Option<String>,
    pub sortable: bool,
    pub order_by: Option<String>,
    pub filter: Option<Arc<dyn FilterWidget>>,
}

impl RowSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: None,
            sortable: true,
            order_by: None,
            filter: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn not_sortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn filter(mut self, widget: impl FilterWidget + 'static) -> Self {
        self.filter = Some(Arc::new(widget));
        self
    }

    /// 显示标题（首字母大写）
    pub fn display_title(&self) -> String {
        capfirst(self.title.as_deref().unwrap_or(&self.key))
    }

    /// 排序使用的字段
    pub fn sort_field(&self) -> &str {
        self.order_by.as_deref().unwrap_or(&self.key)
    }

    /// 过滤使用的字段（控件可覆盖）
    pub fn filter_field(&self) -> &str {
        match &self.filter {
            Some(widget) => widget.target_field(&self.key),
            None => &self.key,
        }
    }
}

// ==========================================
// Editable - 交叉指标可编辑性
// ==========================================
#[derive(Clone, Default)]
pub enum Editable {
    #[default]
    Never,
    Always,
    When(Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>),
}

impl Editable {
    pub fn resolve(&self, ctx: &RequestContext) -> bool {
        match self {
            Editable::Never => false,
            Editable::Always => true,
            Editable::When(predicate) => predicate(ctx),
        }
    }
}

impl fmt::Debug for Editable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Editable::Never => write!(f, "Never"),
            Editable::Always => write!(f, "Always"),
            Editable::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}

// ==========================================
// CrossSpec - 透视报表的交叉指标
// ==========================================
#[derive(Debug, Clone)]
pub struct CrossSpec {
    pub key: String,
    pub title: Option<String>,
    pub editable: Editable,
}

impl CrossSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: None,
            editable: Editable::Never,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn editable(mut self, editable: Editable) -> Self {
        self.editable = editable;
        self
    }

    pub fn display_title(&self) -> String {
        capfirst(self.title.as_deref().unwrap_or(&self.key))
    }
}

// ==========================================
// ColumnSpec - 透视记录中的桶字段
// ==========================================
// 用于"透视-列表"导出：每条 (实体, 桶) 记录的桶标识字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub key: String,
    pub title: Option<String>,
}

impl ColumnSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn display_title(&self) -> String {
        capfirst(self.title.as_deref().unwrap_or(&self.key))
    }
}

// ==========================================
// BucketSpec - 时间桶
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BucketSpec {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
        }
    }
}

// ==========================================
// 报表定义错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportConfigError {
    #[error("报表 {0} 未定义任何行")]
    EmptyRows(String),

    #[error("透视报表 {0} 未定义交叉指标")]
    MissingCrosses(String),

    #[error("每页条数必须大于 0")]
    InvalidPageSize,

    #[error("默认排序无效 (token={token}): {reason}")]
    InvalidDefaultSort { token: String, reason: String },
}

// ==========================================
// ReportDefinition - 不可变的报表定义
// ==========================================
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    title: String,
    kind: ReportKind,
    rows: Vec<RowSpec>,
    crosses: Vec<CrossSpec>,
    columns: Vec<ColumnSpec>,
    default_sort_token: String,
    default_sort: SortKey,
    page_size: Option<u32>,
    frozen_columns: usize,
    editable: bool,
    primary_key: Option<String>,
    import_schema: Option<ImportSchema>,
}

impl ReportDefinition {
    /// 列表报表构建器
    pub fn list(title: impl Into<String>) -> ReportDefinitionBuilder {
        ReportDefinitionBuilder::new(title.into(), ReportKind::List)
    }

    /// 透视报表构建器
    pub fn pivot(title: impl Into<String>) -> ReportDefinitionBuilder {
        ReportDefinitionBuilder::new(title.into(), ReportKind::Pivot)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn rows(&self) -> &[RowSpec] {
        &self.rows
    }

    pub fn crosses(&self) -> &[CrossSpec] {
        &self.crosses
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn default_sort_token(&self) -> &str {
        &self.default_sort_token
    }

    pub fn default_sort(&self) -> SortKey {
        self.default_sort
    }

    /// 报表级每页条数；未设置时使用引擎配置
    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    pub fn frozen_columns(&self) -> usize {
        self.frozen_columns
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// 单实体视图使用的主键字段（默认第一行字段）
    pub fn primary_key(&self) -> &str {
        self.primary_key
            .as_deref()
            .unwrap_or_else(|| self.rows[0].key.as_str())
    }

    pub fn import_schema(&self) -> Option<&ImportSchema> {
        self.import_schema.as_ref()
    }

    /// 按 1 基序号取行定义
    pub fn row(&self, field_index: usize) -> Option<&RowSpec> {
        field_index.checked_sub(1).and_then(|i| self.rows.get(i))
    }
}

// ==========================================
// ReportDefinitionBuilder
// ==========================================
pub struct ReportDefinitionBuilder {
    title: String,
    kind: ReportKind,
    rows: Vec<RowSpec>,
    crosses: Vec<CrossSpec>,
    columns: Vec<ColumnSpec>,
    default_sort: String,
    page_size: Option<u32>,
    frozen_columns: usize,
    editable: bool,
    primary_key: Option<String>,
    import_schema: Option<ImportSchema>,
}

impl ReportDefinitionBuilder {
    fn new(title: String, kind: ReportKind) -> Self {
        Self {
            title,
            kind,
            rows: Vec::new(),
            crosses: Vec::new(),
            columns: Vec::new(),
            default_sort: DEFAULT_SORT_TOKEN.to_string(),
            page_size: None,
            frozen_columns: 0,
            editable: true,
            primary_key: None,
            import_schema: None,
        }
    }

    pub fn row(mut self, row: RowSpec) -> Self {
        self.rows.push(row);
        self
    }

    pub fn cross(mut self, cross: CrossSpec) -> Self {
        self.crosses.push(cross);
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn default_sort(mut self, token: impl Into<String>) -> Self {
        self.default_sort = token.into();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn frozen_columns(mut self, frozen_columns: usize) -> Self {
        self.frozen_columns = frozen_columns;
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    pub fn import_schema(mut self, schema: ImportSchema) -> Self {
        self.import_schema = Some(schema);
        self
    }

    /// 校验并冻结报表定义
    ///
    /// # 校验
    /// - 至少一行
    /// - 透视报表至少一个交叉指标
    /// - 每页条数 > 0
    /// - 默认排序令牌指向范围内且可排序的行
    pub fn build(self) -> Result<ReportDefinition, ReportConfigError> {
        if self.rows.is_empty() {
            return Err(ReportConfigError::EmptyRows(self.title));
        }
        if self.kind == ReportKind::Pivot && self.crosses.is_empty() {
            return Err(ReportConfigError::MissingCrosses(self.title));
        }
        if self.page_size == Some(0) {
            return Err(ReportConfigError::InvalidPageSize);
        }

        let (field_index, direction) = parse_token(&self.default_sort);
        if field_index == 0 || field_index > self.rows.len() {
            return Err(ReportConfigError::InvalidDefaultSort {
                token: self.default_sort,
                reason: format!("序号超出范围 1..={}", self.rows.len()),
            });
        }
        if !self.rows[field_index - 1].sortable {
            return Err(ReportConfigError::InvalidDefaultSort {
                token: self.default_sort,
                reason: format!("第 {} 行不可排序", field_index),
            });
        }
        let default_sort = SortKey::new(field_index, direction);

        Ok(ReportDefinition {
            title: self.title,
            kind: self.kind,
            rows: self.rows,
            crosses: self.crosses,
            columns: self.columns,
            default_sort_token: default_sort.encode(),
            default_sort,
            page_size: self.page_size,
            frozen_columns: self.frozen_columns,
            editable: self.editable,
            primary_key: self.primary_key,
            import_schema: self.import_schema,
        })
    }
}

/// 首字母大写
pub fn capfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<RowSpec> {
        vec![
            RowSpec::new("name").title("name"),
            RowSpec::new("description").not_sortable(),
            RowSpec::new("quantity").order_by("qty"),
        ]
    }

    #[test]
    fn test_build_parses_default_sort_once() {
        let mut builder = ReportDefinition::list("demand").default_sort("3d");
        for r in rows() {
            builder = builder.row(r);
        }
        let def = builder.build().unwrap();
        assert_eq!(def.default_sort(), SortKey::new(3, SortDirection::Desc));
        assert_eq!(def.default_sort_token(), "3d");
        assert_eq!(def.row(3).unwrap().sort_field(), "qty");
        assert!(def.row(0).is_none());
        assert!(def.row(4).is_none());
        assert_eq!(def.primary_key(), "name");
    }

    #[test]
    fn test_build_rejects_bad_default_sort() {
        let mut builder = ReportDefinition::list("demand").default_sort("2a");
        for r in rows() {
            builder = builder.row(r);
        }
        assert!(matches!(
            builder.build(),
            Err(ReportConfigError::InvalidDefaultSort { .. })
        ));

        let err = ReportDefinition::list("demand")
            .row(RowSpec::new("name"))
            .default_sort("9a")
            .build();
        assert!(matches!(err, Err(ReportConfigError::InvalidDefaultSort { .. })));
    }

    #[test]
    fn test_build_rejects_empty_and_pivot_without_crosses() {
        assert_eq!(
            ReportDefinition::list("x").build().unwrap_err(),
            ReportConfigError::EmptyRows("x".to_string())
        );
        assert_eq!(
            ReportDefinition::pivot("p")
                .row(RowSpec::new("item"))
                .build()
                .unwrap_err(),
            ReportConfigError::MissingCrosses("p".to_string())
        );
        assert_eq!(
            ReportDefinition::list("x")
                .row(RowSpec::new("a"))
                .page_size(0)
                .build()
                .unwrap_err(),
            ReportConfigError::InvalidPageSize
        );
    }

    #[test]
    fn test_capfirst_and_titles() {
        assert_eq!(capfirst("quantity"), "Quantity");
        assert_eq!(capfirst(""), "");
        assert_eq!(RowSpec::new("due").display_title(), "Due");
        assert_eq!(CrossSpec::new("demand").title("total demand").display_title(), "Total demand");
    }
}
