// ==========================================
// 通用报表引擎 - 过滤控件协议
// ==========================================
// 职责: 文本/数值/日期/选项/布尔 五类过滤控件
// 约束: 控件只产出结构化片段，不生成 HTML
// ==========================================

use crate::domain::request::RequestContext;
use crate::domain::types::FilterOperator;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// 文本类操作符
pub const TEXT_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Exact,
    FilterOperator::IExact,
    FilterOperator::Contains,
    FilterOperator::IContains,
    FilterOperator::StartsWith,
    FilterOperator::IStartsWith,
    FilterOperator::EndsWith,
    FilterOperator::IEndsWith,
];

/// 数值/日期类操作符
pub const RANGE_OPERATORS: &[FilterOperator] = &[
    FilterOperator::Lt,
    FilterOperator::Gt,
    FilterOperator::Lte,
    FilterOperator::Gte,
    FilterOperator::Exact,
];

/// 选项类操作符
pub const CHOICE_OPERATORS: &[FilterOperator] = &[FilterOperator::Exact];

/// 无控件参数使用的输入框宽度
pub const PLAIN_INPUT_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterKind {
    Text,
    Number,
    Date,
    Choice,
    Bool,
}

// ==========================================
// 展示片段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub code: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FilterControl {
    TextInput { size: usize },
    DateInput { size: usize },
    Select { options: Vec<ChoiceOption> },
}

/// 已生效过滤条件（摘要中的一项）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFilter {
    pub title: String,
    pub operator: FilterOperator,
    pub operator_label: String,
    /// 原始参数名，如 "qty__gte"
    pub param: String,
    pub value: String,
    pub control: FilterControl,
}

/// "添加过滤" 编辑器中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterEditorEntry {
    pub title: String,
    /// 有控件时为过滤字段
    pub field: Option<String>,
    pub kind: Option<FilterKind>,
    /// 可选操作符（无控件时为空）
    pub operators: Vec<FilterOperator>,
    pub default_operator: Option<FilterOperator>,
    pub control: Option<FilterControl>,
}

// ==========================================
// FilterWidget Trait
// ==========================================
// 实现者: FilterText, FilterNumber, FilterDate, FilterChoice, FilterBool
pub trait FilterWidget: fmt::Debug + Send + Sync {
    fn kind(&self) -> FilterKind;

    /// 控件覆盖的过滤字段
    fn field_override(&self) -> Option<&str>;

    /// 控件支持的操作符
    fn operators(&self) -> &'static [FilterOperator];

    /// 新增过滤条件时预选的操作符
    fn default_operator(&self) -> FilterOperator;

    /// 当前值对应的输入控件
    fn control(&self, value: &str, ctx: &RequestContext) -> FilterControl;

    /// 实际过滤字段（未覆盖时为行字段）
    fn target_field<'a>(&'a self, row_key: &'a str) -> &'a str {
        self.field_override().unwrap_or(row_key)
    }

    fn applies_to(&self, row_key: &str, field: &str) -> bool {
        self.target_field(row_key) == field
    }

    fn render_active(
        &self,
        title: &str,
        operator: FilterOperator,
        param: &str,
        raw: &str,
        ctx: &RequestContext,
    ) -> ActiveFilter {
        ActiveFilter {
            title: title.to_string(),
            operator,
            operator_label: operator.label().to_string(),
            param: param.to_string(),
            value: raw.to_string(),
            control: self.control(raw, ctx),
        }
    }

    fn render_editor(&self, title: &str, field: &str, _ctx: &RequestContext) -> FilterEditorEntry {
        FilterEditorEntry {
            title: title.to_string(),
            field: Some(field.to_string()),
            kind: Some(self.kind()),
            operators: self.operators().to_vec(),
            default_operator: Some(self.default_operator()),
            control: None,
        }
    }
}

// ==========================================
// FilterText
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterText {
    pub operator: FilterOperator,
    pub field: Option<String>,
    pub size: usize,
}

impl Default for FilterText {
    fn default() -> Self {
        Self {
            operator: FilterOperator::IContains,
            field: None,
            size: 10,
        }
    }
}

impl FilterText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn operator(mut self, operator: FilterOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

impl FilterWidget for FilterText {
    fn kind(&self) -> FilterKind {
        FilterKind::Text
    }

    fn field_override(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn operators(&self) -> &'static [FilterOperator] {
        TEXT_OPERATORS
    }

    fn default_operator(&self) -> FilterOperator {
        self.operator
    }

    // 输入框随内容变宽
    fn control(&self, value: &str, _ctx: &RequestContext) -> FilterControl {
        FilterControl::TextInput {
            size: self.size.max(value.chars().count()),
        }
    }
}

// ==========================================
// FilterNumber / FilterDate
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNumber {
    pub operator: FilterOperator,
    pub field: Option<String>,
    pub size: usize,
}

impl Default for FilterNumber {
    fn default() -> Self {
        Self {
            operator: FilterOperator::Lt,
            field: None,
            size: 9,
        }
    }
}

impl FilterNumber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl FilterWidget for FilterNumber {
    fn kind(&self) -> FilterKind {
        FilterKind::Number
    }

    fn field_override(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn operators(&self) -> &'static [FilterOperator] {
        RANGE_OPERATORS
    }

    fn default_operator(&self) -> FilterOperator {
        self.operator
    }

    fn control(&self, _value: &str, _ctx: &RequestContext) -> FilterControl {
        FilterControl::TextInput { size: self.size }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDate {
    pub operator: FilterOperator,
    pub field: Option<String>,
    pub size: usize,
}

impl Default for FilterDate {
    fn default() -> Self {
        Self {
            operator: FilterOperator::Lt,
            field: None,
            size: 9,
        }
    }
}

impl FilterDate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl FilterWidget for FilterDate {
    fn kind(&self) -> FilterKind {
        FilterKind::Date
    }

    fn field_override(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn operators(&self) -> &'static [FilterOperator] {
        RANGE_OPERATORS
    }

    fn default_operator(&self) -> FilterOperator {
        self.operator
    }

    fn control(&self, _value: &str, _ctx: &RequestContext) -> FilterControl {
        FilterControl::DateInput { size: self.size }
    }
}

// ==========================================
// FilterChoice / FilterBool
// ==========================================
pub type ChoiceFn = dyn Fn(&RequestContext) -> Vec<(String, String)> + Send + Sync;

/// 选项来源：固定列表或按请求计算
#[derive(Clone)]
pub enum ChoiceSource {
    Static(Vec<(String, String)>),
    Computed(Arc<ChoiceFn>),
}

impl ChoiceSource {
    pub fn resolve(&self, ctx: &RequestContext) -> Vec<(String, String)> {
        match self {
            ChoiceSource::Static(choices) => choices.clone(),
            ChoiceSource::Computed(f) => f(ctx),
        }
    }
}

impl fmt::Debug for ChoiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceSource::Static(choices) => f.debug_tuple("Static").field(choices).finish(),
            ChoiceSource::Computed(_) => write!(f, "Computed(<fn>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterChoice {
    pub field: Option<String>,
    pub choices: ChoiceSource,
}

impl FilterChoice {
    pub fn new<C, L>(choices: impl IntoIterator<Item = (C, L)>) -> Self
    where
        C: Into<String>,
        L: Into<String>,
    {
        Self {
            field: None,
            choices: ChoiceSource::Static(
                choices
                    .into_iter()
                    .map(|(c, l)| (c.into(), l.into()))
                    .collect(),
            ),
        }
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        Self {
            field: None,
            choices: ChoiceSource::Computed(Arc::new(f)),
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn options(&self, selected: Option<&str>, ctx: &RequestContext) -> Vec<ChoiceOption> {
        self.choices
            .resolve(ctx)
            .into_iter()
            .map(|(code, label)| ChoiceOption {
                selected: selected == Some(code.as_str()),
                code,
                label,
            })
            .collect()
    }
}

impl FilterWidget for FilterChoice {
    fn kind(&self) -> FilterKind {
        FilterKind::Choice
    }

    fn field_override(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn operators(&self) -> &'static [FilterOperator] {
        CHOICE_OPERATORS
    }

    fn default_operator(&self) -> FilterOperator {
        FilterOperator::Exact
    }

    fn control(&self, value: &str, ctx: &RequestContext) -> FilterControl {
        FilterControl::Select {
            options: self.options(Some(value), ctx),
        }
    }

    // 编辑器中直接给出下拉框
    fn render_editor(&self, title: &str, field: &str, ctx: &RequestContext) -> FilterEditorEntry {
        FilterEditorEntry {
            title: title.to_string(),
            field: Some(field.to_string()),
            kind: Some(self.kind()),
            operators: self.operators().to_vec(),
            default_operator: Some(self.default_operator()),
            control: Some(FilterControl::Select {
                options: self.options(None, ctx),
            }),
        }
    }
}

/// 布尔过滤：取值固定为 '0'(否) / '1'(是) 的选项过滤
#[derive(Debug, Clone)]
pub struct FilterBool(FilterChoice);

impl Default for FilterBool {
    fn default() -> Self {
        Self(FilterChoice::new([("0", "否"), ("1", "是")]))
    }
}

impl FilterBool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, field: impl Into<String>) -> Self {
        Self(self.0.field(field))
    }
}

impl FilterWidget for FilterBool {
    fn kind(&self) -> FilterKind {
        FilterKind::Bool
    }

    fn field_override(&self) -> Option<&str> {
        self.0.field_override()
    }

    fn operators(&self) -> &'static [FilterOperator] {
        CHOICE_OPERATORS
    }

    fn default_operator(&self) -> FilterOperator {
        FilterOperator::Exact
    }

    fn control(&self, value: &str, ctx: &RequestContext) -> FilterControl {
        self.0.control(value, ctx)
    }

    fn render_editor(&self, title: &str, field: &str, ctx: &RequestContext) -> FilterEditorEntry {
        FilterEditorEntry {
            kind: Some(FilterKind::Bool),
            operators: self.operators().to_vec(),
            default_operator: Some(self.default_operator()),
            ..self.0.render_editor(title, field, ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::QueryParams;

    fn ctx() -> RequestContext {
        RequestContext::new("/demand/", QueryParams::new()).with_user("planner")
    }

    #[test]
    fn test_text_input_grows_with_value() {
        let w = FilterText::new();
        assert_eq!(w.control("abc", &ctx()), FilterControl::TextInput { size: 10 });
        assert_eq!(
            w.control("a-very-long-filter-value", &ctx()),
            FilterControl::TextInput { size: 24 }
        );
        assert_eq!(FilterNumber::new().control("123456789012", &ctx()), FilterControl::TextInput { size: 9 });
    }

    #[test]
    fn test_target_field_override() {
        assert_eq!(FilterText::new().target_field("name"), "name");
        let w = FilterText::new().field("item__name");
        assert_eq!(w.target_field("item"), "item__name");
        assert!(w.applies_to("item", "item__name"));
        assert!(!w.applies_to("item", "item"));
    }

    #[test]
    fn test_render_active_carries_label() {
        let active = FilterNumber::new().render_active("Quantity", FilterOperator::Gte, "qty__gte", "5", &ctx());
        assert_eq!(active.operator_label, FilterOperator::Gte.label());
        assert_eq!(active.param, "qty__gte");
        assert_eq!(active.value, "5");
    }

    #[test]
    fn test_choice_marks_selected_and_computed_sees_request() {
        let w = FilterChoice::new([("open", "Open"), ("closed", "Closed")]);
        match w.control("closed", &ctx()) {
            FilterControl::Select { options } => {
                assert!(!options[0].selected);
                assert!(options[1].selected);
            }
            other => panic!("unexpected control {:?}", other),
        }

        let computed = FilterChoice::computed(|ctx| {
            vec![(ctx.user_id.clone().unwrap_or_default(), "mine".to_string())]
        });
        let entry = computed.render_editor("Owner", "owner", &ctx());
        match entry.control {
            Some(FilterControl::Select { options }) => assert_eq!(options[0].code, "planner"),
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[test]
    fn test_bool_choices() {
        let entry = FilterBool::new().render_editor("Active", "active", &ctx());
        assert_eq!(entry.kind, Some(FilterKind::Bool));
        assert_eq!(entry.operators, vec![FilterOperator::Exact]);
        assert_eq!(entry.default_operator, Some(FilterOperator::Exact));
        match entry.control {
            Some(FilterControl::Select { options }) => {
                let codes: Vec<&str> = options.iter().map(|o| o.code.as_str()).collect();
                assert_eq!(codes, vec!["0", "1"]);
            }
            other => panic!("unexpected control {:?}", other),
        }
    }
}
