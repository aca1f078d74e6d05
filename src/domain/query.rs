// ==========================================
// 通用报表引擎 - 查询描述
// ==========================================
// 职责: 过滤谓词、排序描述、分页窗口，交给记录源执行
// 约束: 只描述查询，不执行查询
// ==========================================

use crate::domain::types::{FilterOperator, SortDirection};
use crate::domain::value::{parse_bool, RecordAccess, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ==========================================
// Predicate - 过滤谓词 (字段, 操作符, 原始值)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// isnull 的期望值：可识别的布尔文本按其值，其余非空文本视为 true
    pub fn expects_null(&self) -> bool {
        parse_bool(&self.value).unwrap_or(true)
    }

    /// 对单个字段值求值
    pub fn matches(&self, value: &Value) -> bool {
        use FilterOperator::*;
        match self.operator {
            IsNull => value.is_null() == self.expects_null(),
            _ if value.is_null() => false,
            Exact => value.compare_raw(&self.value) == Some(Ordering::Equal),
            Lt => value.compare_raw(&self.value) == Some(Ordering::Less),
            Gt => value.compare_raw(&self.value) == Some(Ordering::Greater),
            Lte => matches!(
                value.compare_raw(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Gte => matches!(
                value.compare_raw(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            IExact | Contains | IContains | StartsWith | IStartsWith | EndsWith | IEndsWith => {
                self.matches_text(&value.to_string())
            }
        }
    }

    fn matches_text(&self, text: &str) -> bool {
        use FilterOperator::*;
        let (text, needle) = if self.operator.is_case_insensitive() {
            (text.to_lowercase(), self.value.to_lowercase())
        } else {
            (text.to_string(), self.value.clone())
        };
        match self.operator {
            IExact => text == needle,
            Contains | IContains => text.contains(&needle),
            StartsWith | IStartsWith => text.starts_with(&needle),
            EndsWith | IEndsWith => text.ends_with(&needle),
            _ => false,
        }
    }

    /// 对整条记录求值
    pub fn evaluate<R: RecordAccess + ?Sized>(&self, record: &R) -> bool {
        self.matches(&record.get_value(&self.field))
    }
}

// ==========================================
// OrderDescriptor - 排序描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    pub terms: Vec<OrderTerm>,
}

impl OrderDescriptor {
    pub fn push(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.terms.push(OrderTerm {
            field: field.into(),
            direction,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// 按描述比较两条记录
    pub fn compare<R: RecordAccess + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        for term in &self.terms {
            let ord = a
                .get_value(&term.field)
                .sort_cmp(&b.get_value(&term.field));
            let ord = match term.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

// ==========================================
// Query - 交给记录源的完整查询
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub ordering: OrderDescriptor,
    /// (offset, limit)；None 表示不切片
    pub window: Option<(u64, u64)>,
}

impl Query {
    pub fn new(predicates: Vec<Predicate>, ordering: OrderDescriptor) -> Self {
        Self {
            predicates,
            ordering,
            window: None,
        }
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some((offset, limit));
        self
    }

    /// 记录是否满足全部谓词（AND）
    pub fn accepts<R: RecordAccess + ?Sized>(&self, record: &R) -> bool {
        self.predicates.iter().all(|p| p.evaluate(record))
    }
}
