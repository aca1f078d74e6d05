// ==========================================
// 通用报表引擎 - 过滤摘要与过滤编辑器
// ==========================================
// 职责: 生成"已生效过滤条件"摘要与"添加过滤"编辑器片段
// 红线: 两者都按行定义顺序遍历，显示顺序必须一致
// ==========================================

use super::chain::parse_param;
use super::widget::{ActiveFilter, FilterControl, FilterEditorEntry, PLAIN_INPUT_SIZE};
use crate::domain::report::ReportDefinition;
use crate::domain::request::{is_reserved, RequestContext};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    /// 需要随过滤表单一起提交的保留参数
    pub hidden: Vec<(String, String)>,
    pub active: Vec<ActiveFilter>,
}

/// 已生效过滤条件摘要
///
/// # 返回
/// - None: 请求中没有任何过滤条件
pub fn active_filters(def: &ReportDefinition, ctx: &RequestContext) -> Option<FilterSummary> {
    let mut summary = FilterSummary {
        hidden: ctx
            .params
            .iter()
            .filter(|(name, _)| is_reserved(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        active: Vec::new(),
    };

    for row in def.rows() {
        let title = row.display_title();
        let filter_field = row.filter_field();
        for (name, value) in ctx.params.iter() {
            if is_reserved(name) || value.is_empty() {
                continue;
            }
            let Ok((field, operator)) = parse_param(name) else {
                continue;
            };
            if field != filter_field {
                continue;
            }
            let entry = match &row.filter {
                Some(widget) => widget.render_active(&title, operator, name, value, ctx),
                None => ActiveFilter {
                    title: title.clone(),
                    operator,
                    operator_label: operator.label().to_string(),
                    param: name.to_string(),
                    value: value.to_string(),
                    control: FilterControl::TextInput {
                        size: PLAIN_INPUT_SIZE,
                    },
                },
            };
            summary.active.push(entry);
        }
    }

    if summary.active.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// "添加过滤" 编辑器片段（每行一项）
pub fn filter_editor(def: &ReportDefinition, ctx: &RequestContext) -> Vec<FilterEditorEntry> {
    def.rows()
        .iter()
        .map(|row| {
            let title = row.display_title();
            match &row.filter {
                Some(widget) => widget.render_editor(&title, row.filter_field(), ctx),
                None => FilterEditorEntry {
                    title,
                    field: None,
                    kind: None,
                    operators: Vec::new(),
                    default_operator: None,
                    control: None,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::RowSpec;
    use crate::domain::request::QueryParams;
    use crate::domain::types::FilterOperator;
    use crate::engine::filter::widget::{FilterKind, FilterNumber, FilterText};

    fn definition() -> ReportDefinition {
        ReportDefinition::list("demand")
            .row(RowSpec::new("name").filter(FilterText::new()))
            .row(RowSpec::new("item").filter(FilterText::new().field("item__name")))
            .row(RowSpec::new("quantity").filter(FilterNumber::new()))
            .row(RowSpec::new("note"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_summary_follows_row_order() {
        let ctx = RequestContext::new(
            "/demand/",
            QueryParams::parse(
                "quantity__gte=5&o=2a&name__icontains=wid&item__name__exact=bolt&p=2",
            ),
        );
        let summary = active_filters(&definition(), &ctx).unwrap();
        let params: Vec<&str> = summary.active.iter().map(|a| a.param.as_str()).collect();
        assert_eq!(params, vec!["name__icontains", "item__name__exact", "quantity__gte"]);
        assert_eq!(
            summary.hidden,
            vec![
                ("o".to_string(), "2a".to_string()),
                ("p".to_string(), "2".to_string())
            ]
        );
        assert_eq!(summary.active[2].operator, FilterOperator::Gte);
        assert_eq!(summary.active[1].title, "Item");
    }

    #[test]
    fn test_summary_none_without_filters() {
        let ctx = RequestContext::new("/demand/", QueryParams::parse("o=1a&p=2"));
        assert!(active_filters(&definition(), &ctx).is_none());
    }

    #[test]
    fn test_row_without_widget_uses_plain_input() {
        let ctx = RequestContext::new("/demand/", QueryParams::parse("note__contains=x"));
        let summary = active_filters(&definition(), &ctx).unwrap();
        assert_eq!(
            summary.active[0].control,
            FilterControl::TextInput { size: PLAIN_INPUT_SIZE }
        );
    }

    #[test]
    fn test_editor_has_one_entry_per_row_in_order() {
        let ctx = RequestContext::new("/demand/", QueryParams::new());
        let editor = filter_editor(&definition(), &ctx);
        let titles: Vec<&str> = editor.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Name", "Item", "Quantity", "Note"]);
        assert_eq!(editor[1].field.as_deref(), Some("item__name"));
        assert_eq!(editor[2].kind, Some(FilterKind::Number));
        assert_eq!(editor[3].kind, None);
    }

    #[test]
    fn test_editor_offers_widget_operators() {
        let ctx = RequestContext::new("/demand/", QueryParams::new());
        let editor = filter_editor(&definition(), &ctx);

        assert_eq!(editor[0].default_operator, Some(FilterOperator::IContains));
        assert!(editor[0].operators.contains(&FilterOperator::IStartsWith));
        assert!(!editor[0].operators.contains(&FilterOperator::Gte));

        assert_eq!(editor[2].operators.first(), Some(&FilterOperator::Lt));
        assert!(editor[2].operators.contains(&FilterOperator::Gte));

        assert!(editor[3].operators.is_empty());
        assert_eq!(editor[3].default_operator, None);
    }
}
