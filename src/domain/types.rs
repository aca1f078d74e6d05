// ==========================================
// 通用报表引擎 - 领域类型定义
// ==========================================
// 职责: 排序方向、过滤操作符、报表类型、导出格式、CSV 分隔符
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==========================================
// 排序方向 (Sort Direction)
// ==========================================
// 编码: 'a' 升序 / 'd' 降序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,  // 升序
    Desc, // 降序
}

impl SortDirection {
    /// 排序令牌中的方向字符
    pub fn as_char(&self) -> char {
        match self {
            SortDirection::Asc => 'a',
            SortDirection::Desc => 'd',
        }
    }

    /// 从令牌末尾字符解析；非 'd' 一律视为升序
    pub fn from_token_char(c: Option<char>) -> Self {
        match c {
            Some('d') => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    /// 反向
    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// SQL 关键字
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

// ==========================================
// 过滤操作符 (Filter Operator)
// ==========================================
// 参数格式: <field>__<operator>=<value>，无操作符时为 exact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IsNull,
    Lt,
    Gt,
    Lte,
    Gte,
}

/// 未知过滤操作符
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的过滤操作符: {0}")]
pub struct UnknownOperator(pub String);

impl FilterOperator {
    /// 全部操作符（固定词汇表）
    pub const ALL: [FilterOperator; 13] = [
        FilterOperator::Exact,
        FilterOperator::IExact,
        FilterOperator::Contains,
        FilterOperator::IContains,
        FilterOperator::StartsWith,
        FilterOperator::IStartsWith,
        FilterOperator::EndsWith,
        FilterOperator::IEndsWith,
        FilterOperator::IsNull,
        FilterOperator::Lt,
        FilterOperator::Gt,
        FilterOperator::Lte,
        FilterOperator::Gte,
    ];

    /// 参数名中的操作符文本
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Exact => "exact",
            FilterOperator::IExact => "iexact",
            FilterOperator::Contains => "contains",
            FilterOperator::IContains => "icontains",
            FilterOperator::StartsWith => "startswith",
            FilterOperator::IStartsWith => "istartswith",
            FilterOperator::EndsWith => "endswith",
            FilterOperator::IEndsWith => "iendswith",
            FilterOperator::IsNull => "isnull",
            FilterOperator::Lt => "lt",
            FilterOperator::Gt => "gt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gte => "gte",
        }
    }

    /// 展示给用户的操作符标签
    pub fn label(&self) -> &'static str {
        match self {
            FilterOperator::Exact => "等于",
            FilterOperator::IExact => "等于（不区分大小写）",
            FilterOperator::Contains => "包含",
            FilterOperator::IContains => "包含（不区分大小写）",
            FilterOperator::StartsWith => "开头为",
            FilterOperator::IStartsWith => "开头为（不区分大小写）",
            FilterOperator::EndsWith => "结尾为",
            FilterOperator::IEndsWith => "结尾为（不区分大小写）",
            FilterOperator::IsNull => "为空",
            FilterOperator::Lt => "<",
            FilterOperator::Gt => ">",
            FilterOperator::Lte => "<=",
            FilterOperator::Gte => ">=",
        }
    }

    /// 是否为不区分大小写的文本操作符
    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            FilterOperator::IExact
                | FilterOperator::IContains
                | FilterOperator::IStartsWith
                | FilterOperator::IEndsWith
        )
    }
}

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 报表类型 (Report Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    List,  // 列表报表
    Pivot, // 透视报表（按时间桶展开）
}

// ==========================================
// 输出格式 (reporttype 参数)
// ==========================================
// html 为默认; 以 csv 开头的值触发导出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Html,
    Csv,      // 列表报表导出 / 透视报表按表格导出
    CsvList,  // 透视报表按列表导出
    CsvTable, // 透视报表按表格导出
}

impl OutputFormat {
    /// 解析 reporttype 参数
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("csvlist") => OutputFormat::CsvList,
            Some("csvtable") => OutputFormat::CsvTable,
            Some(v) if v.starts_with("csv") => OutputFormat::Csv,
            _ => OutputFormat::Html,
        }
    }

    pub fn is_csv(&self) -> bool {
        !matches!(self, OutputFormat::Html)
    }
}

// ==========================================
// CSV 分隔符
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvDelimiter {
    Comma,
    Semicolon,
}

/// 不支持的 CSV 分隔符配置
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("不支持的 CSV 分隔符: {0}")]
pub struct UnsupportedDelimiter(pub String);

impl CsvDelimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            CsvDelimiter::Comma => b',',
            CsvDelimiter::Semicolon => b';',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CsvDelimiter::Comma => "comma",
            CsvDelimiter::Semicolon => "semicolon",
        }
    }
}

impl FromStr for CsvDelimiter {
    type Err = UnsupportedDelimiter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "comma" | "," => Ok(CsvDelimiter::Comma),
            "semicolon" | ";" => Ok(CsvDelimiter::Semicolon),
            other => Err(UnsupportedDelimiter(other.to_string())),
        }
    }
}

impl fmt::Display for CsvDelimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
