// ==========================================
// 通用报表引擎 - 排序令牌编解码
// ==========================================
// 职责: 解析/校验/编码排序令牌，生成带确定性次序的排序描述
// 约束: 无效令牌回退到默认排序，从不向调用方报错
// ==========================================

use crate::domain::query::OrderDescriptor;
use crate::domain::report::{ReportDefinition, SortKey};
use crate::domain::types::SortDirection;
use thiserror::Error;
use tracing::warn;

/// 解析排序令牌的原始形态
///
/// 前导数字累加为 1 基序号（遇到非数字停止），最后一个字符为 'd' 时降序，否则升序。
/// 不做范围校验。
///
/// # 示例
/// - "12a" -> (12, Asc)
/// - "3d"  -> (3, Desc)
/// - "x"   -> (0, Asc)
pub fn parse_token(token: &str) -> (usize, SortDirection) {
    let field_index = token
        .chars()
        .map_while(|c| c.to_digit(10))
        .fold(0usize, |acc, d| acc.saturating_mul(10).saturating_add(d as usize));
    let direction = SortDirection::from_token_char(token.chars().last());
    (field_index, direction)
}

// ==========================================
// 令牌无效的原因（仅用于日志）
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortTokenError {
    #[error("排序令牌格式错误: {0:?}")]
    Malformed(String),

    #[error("排序序号 {index} 超出范围 1..={len}")]
    OutOfRange { index: usize, len: usize },

    #[error("第 {0} 行不可排序")]
    NotSortable(usize),
}

// ==========================================
// SortDecision - 解码结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortDecision {
    /// 请求的令牌有效
    Requested(SortKey),
    /// 请求的令牌无效，已回退到默认排序
    Fallback { key: SortKey, reason: SortTokenError },
}

impl SortDecision {
    pub fn key(&self) -> SortKey {
        match self {
            SortDecision::Requested(key) => *key,
            SortDecision::Fallback { key, .. } => *key,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SortDecision::Fallback { .. })
    }
}

// ==========================================
// SortCodec
// ==========================================
pub struct SortCodec<'a> {
    definition: &'a ReportDefinition,
}

impl<'a> SortCodec<'a> {
    pub fn new(definition: &'a ReportDefinition) -> Self {
        Self { definition }
    }

    /// 校验令牌
    pub fn validate(&self, token: &str) -> Result<SortKey, SortTokenError> {
        if !token.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(SortTokenError::Malformed(token.to_string()));
        }
        let (index, direction) = parse_token(token);
        let row = self
            .definition
            .row(index)
            .ok_or(SortTokenError::OutOfRange {
                index,
                len: self.definition.rows().len(),
            })?;
        if !row.sortable {
            return Err(SortTokenError::NotSortable(index));
        }
        Ok(SortKey::new(index, direction))
    }

    /// 解码请求中的 o 参数；缺省时使用默认排序
    pub fn decode(&self, token: Option<&str>) -> SortDecision {
        let Some(token) = token else {
            return SortDecision::Requested(self.definition.default_sort());
        };
        match self.validate(token) {
            Ok(key) => SortDecision::Requested(key),
            Err(reason) => {
                warn!(
                    report = %self.definition.title(),
                    token = %token,
                    reason = %reason,
                    "排序令牌无效，回退到默认排序"
                );
                SortDecision::Fallback {
                    key: self.definition.default_sort(),
                    reason,
                }
            }
        }
    }

    /// 规范化令牌（用于链接）
    pub fn encode(&self, key: SortKey) -> String {
        key.encode()
    }

    /// 排序描述
    ///
    /// 所选字段不是默认字段时，追加默认字段（按默认排序自身的方向）作为次级排序。
    pub fn ordering(&self, key: SortKey) -> OrderDescriptor {
        let mut ordering = OrderDescriptor::default();
        for (index, direction) in self.terms(key) {
            if let Some(row) = self.definition.row(index) {
                ordering.push(row.sort_field(), direction);
            }
        }
        ordering
    }

    /// 按位置编号的 ORDER BY 片段，如 "3 desc, 1 asc"
    pub fn positional_sql(&self, key: SortKey) -> String {
        self.terms(key)
            .iter()
            .map(|(index, direction)| format!("{} {}", index, direction.as_sql().to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn terms(&self, key: SortKey) -> Vec<(usize, SortDirection)> {
        let default = self.definition.default_sort();
        let mut terms = vec![(key.field_index, key.direction)];
        if key.field_index != default.field_index {
            terms.push((default.field_index, default.direction));
        }
        terms
    }
}
