// ==========================================
// 通用报表引擎 - 表头构建
// ==========================================
// 职责: 行表头（排序链接/排序状态/冻结分组）、交叉指标表头、时间桶表头
// 约束: 排序链接去掉 p 参数（重新排序后回到第 1 页）
// ==========================================

use crate::domain::report::{BucketSpec, ReportDefinition, SortKey};
use crate::domain::request::{RequestContext, PAGE_PARAM, SORT_PARAM};
use crate::domain::types::SortDirection;
use crate::domain::value::DATE_FORMAT;
use serde::Serialize;

/// 表头排序状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortState {
    Ascending,
    Descending,
}

impl SortState {
    /// 样式标记
    pub fn marker(&self) -> &'static str {
        match self {
            SortState::Ascending => "sorted-ascending",
            SortState::Descending => "sorted-descending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    pub index: usize,
    pub title: String,
    /// 不可排序时为 None
    pub href: Option<String>,
    pub sort_state: Option<SortState>,
    pub filter_field: Option<String>,
}

impl HeaderCell {
    pub fn marker(&self) -> Option<&'static str> {
        self.sort_state.map(|s| s.marker())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowHeader {
    pub frozen: Vec<HeaderCell>,
    pub scrollable: Vec<HeaderCell>,
}

impl RowHeader {
    pub fn cells(&self) -> impl Iterator<Item = &HeaderCell> {
        self.frozen.iter().chain(self.scrollable.iter())
    }
}

/// 行表头
///
/// # 参数
/// - `sort`: 当前生效的排序键
pub fn row_header(def: &ReportDefinition, sort: SortKey, ctx: &RequestContext) -> RowHeader {
    let mut params = ctx.params.clone();
    params.remove(PAGE_PARAM);

    let mut header = RowHeader::default();
    for (i, row) in def.rows().iter().enumerate() {
        let index = i + 1;
        let cell = if row.sortable {
            let current = sort.field_index == index;
            let sort_state = current.then(|| match sort.direction {
                SortDirection::Asc => SortState::Ascending,
                SortDirection::Desc => SortState::Descending,
            });
            // 当前按本列升序时切换为降序，其余情况升序
            let next = match sort_state {
                Some(SortState::Ascending) => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            let mut link_params = params.clone();
            link_params.set(SORT_PARAM, SortKey::new(index, next).encode());
            HeaderCell {
                index,
                title: row.display_title(),
                href: Some(ctx.href(&link_params)),
                sort_state,
                filter_field: Some(row.filter_field().to_string()),
            }
        } else {
            HeaderCell {
                index,
                title: row.display_title(),
                href: None,
                sort_state: None,
                filter_field: None,
            }
        };

        if index <= def.frozen_columns() {
            header.frozen.push(cell);
        } else {
            header.scrollable.push(cell);
        }
    }
    header
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossHeader {
    pub key: String,
    pub title: String,
    pub editable: bool,
}

/// 交叉指标表头（可编辑性按请求解析）
pub fn cross_header(def: &ReportDefinition, ctx: &RequestContext) -> Vec<CrossHeader> {
    def.crosses()
        .iter()
        .map(|cross| CrossHeader {
            key: cross.key.clone(),
            title: cross.display_title(),
            editable: cross.editable.resolve(ctx),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnHeader {
    pub name: String,
    /// "起始 - 结束"
    pub tooltip: String,
}

pub fn column_header(buckets: &[BucketSpec]) -> Vec<ColumnHeader> {
    buckets
        .iter()
        .map(|b| ColumnHeader {
            name: b.name.clone(),
            tooltip: format!(
                "{} - {}",
                b.start_date.format(DATE_FORMAT),
                b.end_date.format(DATE_FORMAT)
            ),
        })
        .collect()
}
