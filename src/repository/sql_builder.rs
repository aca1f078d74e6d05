// ==========================================
// 通用报表引擎 - SQL 构建工具模块
// ==========================================
// 职责: 由查询描述生成参数化的 WHERE / ORDER BY 片段
// 约束: 字段名必须来自白名单，值一律绑定参数
// ==========================================

use crate::domain::query::{OrderDescriptor, Predicate};
use crate::domain::types::FilterOperator;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 引用标识符（双引号，内部双引号加倍）
///
/// # 示例
/// ```
/// use report_grid::repository::sql_builder::quote_identifier;
///
/// assert_eq!(quote_identifier("qty"), "\"qty\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 校验字段名在白名单内并返回引用后的标识符
pub fn checked_column(table: &str, columns: &[String], name: &str) -> RepositoryResult<String> {
    if columns.iter().any(|c| c == name) {
        Ok(quote_identifier(name))
    } else {
        Err(RepositoryError::UnknownColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
    }
}

/// 单个谓词的 SQL 条件与绑定参数
///
/// # 参数
/// - `column`: 已引用的列名
/// - `predicate`: 过滤谓词
///
/// # 返回
/// - (条件片段, 绑定参数)
///
/// # 示例
/// ```
/// use report_grid::domain::query::Predicate;
/// use report_grid::domain::types::FilterOperator;
/// use report_grid::repository::sql_builder::predicate_sql;
///
/// let p = Predicate::new("name", FilterOperator::IStartsWith, "ab");
/// let (sql, params) = predicate_sql("\"name\"", &p);
/// assert_eq!(sql, "substr(lower(\"name\"), 1, length(?)) = lower(?)");
/// assert_eq!(params, vec!["ab".to_string(), "ab".to_string()]);
/// ```
pub fn predicate_sql(column: &str, predicate: &Predicate) -> (String, Vec<String>) {
    use FilterOperator::*;
    let v = predicate.value.clone();
    match predicate.operator {
        Exact => (format!("{} = ?", column), vec![v]),
        IExact => (format!("lower({}) = lower(?)", column), vec![v]),
        Contains => (format!("instr({}, ?) > 0", column), vec![v]),
        IContains => (format!("instr(lower({}), lower(?)) > 0", column), vec![v]),
        StartsWith => (
            format!("substr({}, 1, length(?)) = ?", column),
            vec![v.clone(), v],
        ),
        IStartsWith => (
            format!("substr(lower({}), 1, length(?)) = lower(?)", column),
            vec![v.clone(), v],
        ),
        EndsWith => (
            format!("substr({}, -length(?)) = ?", column),
            vec![v.clone(), v],
        ),
        IEndsWith => (
            format!("substr(lower({}), -length(?)) = lower(?)", column),
            vec![v.clone(), v],
        ),
        IsNull if predicate.expects_null() => (format!("{} IS NULL", column), Vec::new()),
        IsNull => (format!("{} IS NOT NULL", column), Vec::new()),
        Lt => (format!("{} < ?", column), vec![v]),
        Gt => (format!("{} > ?", column), vec![v]),
        Lte => (format!("{} <= ?", column), vec![v]),
        Gte => (format!("{} >= ?", column), vec![v]),
    }
}

/// WHERE 子句（含前导空格；无谓词时为空串）
pub fn build_where_clause(
    table: &str,
    columns: &[String],
    predicates: &[Predicate],
) -> RepositoryResult<(String, Vec<String>)> {
    if predicates.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut conditions = Vec::with_capacity(predicates.len());
    let mut params = Vec::new();
    for predicate in predicates {
        let column = checked_column(table, columns, &predicate.field)?;
        let (sql, values) = predicate_sql(&column, predicate);
        conditions.push(sql);
        params.extend(values);
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

/// ORDER BY 子句；主键追加为最终次序，保证分批读取稳定
pub fn build_order_by_clause(
    table: &str,
    columns: &[String],
    ordering: &OrderDescriptor,
    primary_key: &str,
) -> RepositoryResult<String> {
    let mut terms = Vec::with_capacity(ordering.terms.len() + 1);
    for term in &ordering.terms {
        let column = checked_column(table, columns, &term.field)?;
        terms.push(format!("{} {}", column, term.direction.as_sql()));
    }
    if !ordering.terms.iter().any(|t| t.field == primary_key) {
        terms.push(format!("{} ASC", checked_column(table, columns, primary_key)?));
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SortDirection;

    fn columns() -> Vec<String> {
        ["name", "qty", "due"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_where_clause_joins_with_and() {
        let predicates = vec![
            Predicate::new("qty", FilterOperator::Gte, "5"),
            Predicate::new("qty", FilterOperator::Lte, "20"),
            Predicate::new("due", FilterOperator::IsNull, "0"),
        ];
        let (sql, params) = build_where_clause("demand", &columns(), &predicates).unwrap();
        assert_eq!(
            sql,
            " WHERE \"qty\" >= ? AND \"qty\" <= ? AND \"due\" IS NOT NULL"
        );
        assert_eq!(params, vec!["5", "20"]);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let predicates = vec![Predicate::new("secret", FilterOperator::Exact, "1")];
        assert!(matches!(
            build_where_clause("demand", &columns(), &predicates),
            Err(RepositoryError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_order_by_appends_primary_key() {
        let mut ordering = OrderDescriptor::default();
        ordering.push("qty", SortDirection::Desc);
        assert_eq!(
            build_order_by_clause("demand", &columns(), &ordering, "name").unwrap(),
            " ORDER BY \"qty\" DESC, \"name\" ASC"
        );
        ordering.push("name", SortDirection::Desc);
        assert_eq!(
            build_order_by_clause("demand", &columns(), &ordering, "name").unwrap(),
            " ORDER BY \"qty\" DESC, \"name\" DESC"
        );
    }
}
