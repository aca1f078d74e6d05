// ==========================================
// 通用报表引擎 - 过滤子模块
// ==========================================
// widget: 过滤控件协议
// chain: 请求参数 -> 谓词
// summary: 过滤摘要 / 过滤编辑器
// ==========================================

pub mod chain;
pub mod summary;
pub mod widget;

pub use chain::{parse_param, split_param, FilterChain, FilterError};
pub use summary::{active_filters, filter_editor, FilterSummary};
pub use widget::{
    ActiveFilter, ChoiceOption, ChoiceSource, FilterBool, FilterChoice, FilterControl, FilterDate,
    FilterEditorEntry, FilterKind, FilterNumber, FilterText, FilterWidget,
};
