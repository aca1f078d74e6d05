// ==========================================
// 通用报表引擎 - 过滤链
// ==========================================
// 职责: 将请求参数 <field>[__<operator>]=<value> 绑定为谓词集合
// 约束: 保留参数与空值不参与过滤；同一字段多次出现按 AND 组合
// ==========================================

use crate::domain::query::Predicate;
use crate::domain::request::{is_reserved, QueryParams};
use crate::domain::types::FilterOperator;
use thiserror::Error;
use tracing::debug;

/// 字段与操作符之间的分隔符
pub const OPERATOR_SEPARATOR: &str = "__";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("过滤参数 {param} 使用了未知操作符 {operator}")]
    UnknownOperator { param: String, operator: String },

    #[error("过滤参数 {0} 缺少字段名")]
    EmptyField(String),
}

/// 按最后一个分隔符拆分参数名
///
/// # 返回
/// - (字段, 操作符文本)；无分隔符时操作符为 None（即 exact）
pub fn split_param(name: &str) -> (&str, Option<&str>) {
    match name.rfind(OPERATOR_SEPARATOR) {
        Some(pos) => (&name[..pos], Some(&name[pos + OPERATOR_SEPARATOR.len()..])),
        None => (name, None),
    }
}

/// 解析参数名为 (字段, 操作符)
pub fn parse_param(name: &str) -> Result<(&str, FilterOperator), FilterError> {
    let (field, operator) = split_param(name);
    if field.is_empty() {
        return Err(FilterError::EmptyField(name.to_string()));
    }
    let operator = match operator {
        None => FilterOperator::Exact,
        Some(op) => op.parse().map_err(|_| FilterError::UnknownOperator {
            param: name.to_string(),
            operator: op.to_string(),
        })?,
    };
    Ok((field, operator))
}

// ==========================================
// FilterChain
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    predicates: Vec<Predicate>,
}

impl FilterChain {
    /// 从请求参数构建过滤链
    ///
    /// # 返回
    /// - Err(FilterError): 参数使用了未知操作符或缺少字段名
    pub fn from_params(params: &QueryParams) -> Result<Self, FilterError> {
        let mut predicates = Vec::new();
        for (name, value) in params.iter() {
            if is_reserved(name) || value.is_empty() {
                continue;
            }
            let (field, operator) = parse_param(name)?;
            predicates.push(Predicate::new(field, operator, value));
        }
        debug!(count = predicates.len(), "过滤链构建完成");
        Ok(Self { predicates })
    }

    /// 单实体视图：仅按主键精确匹配
    pub fn for_entity(primary_key: &str, entity: &str) -> Self {
        Self {
            predicates: vec![Predicate::new(primary_key, FilterOperator::Exact, entity)],
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn into_predicates(self) -> Vec<Predicate> {
        self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::{OrderDescriptor, Query};
    use crate::domain::value::{Record, Value};

    #[test]
    fn test_split_on_last_separator() {
        assert_eq!(split_param("qty"), ("qty", None));
        assert_eq!(split_param("qty__gte"), ("qty", Some("gte")));
        assert_eq!(split_param("item__name__icontains"), ("item__name", Some("icontains")));
    }

    #[test]
    fn test_from_params_skips_reserved_and_empty() {
        let params = QueryParams::parse("o=2d&p=3&name__icontains=wid&qty__gte=&pop=1&t=x");
        let chain = FilterChain::from_params(&params).unwrap();
        assert_eq!(
            chain.predicates(),
            &[Predicate::new("name", FilterOperator::IContains, "wid")]
        );
    }

    #[test]
    fn test_unknown_operator_is_error() {
        let params = QueryParams::parse("qty__between=1");
        assert_eq!(
            FilterChain::from_params(&params).unwrap_err(),
            FilterError::UnknownOperator {
                param: "qty__between".to_string(),
                operator: "between".to_string()
            }
        );
        let params = QueryParams::parse("__gte=1");
        assert!(matches!(
            FilterChain::from_params(&params),
            Err(FilterError::EmptyField(_))
        ));
    }

    #[test]
    fn test_repeated_fields_combine_with_and() {
        let chain = FilterChain::from_params(&QueryParams::parse("qty__gte=5&qty__lte=20")).unwrap();
        let query = Query::new(chain.into_predicates(), OrderDescriptor::default());
        let mut r = Record::new();
        for (qty, expected) in [(4, false), (5, true), (12, true), (20, true), (21, false)] {
            r.insert("qty".to_string(), Value::Integer(qty));
            assert_eq!(query.accepts(&r), expected, "qty={}", qty);
        }
    }

    #[test]
    fn test_for_entity() {
        let chain = FilterChain::for_entity("name", "D-001");
        assert_eq!(chain.predicates().len(), 1);
        assert_eq!(chain.predicates()[0].operator, FilterOperator::Exact);
    }
}
