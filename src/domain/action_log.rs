// ==========================================
// 通用报表引擎 - 操作日志领域模型
// ==========================================
// 红线: 导入产生的每次写入都必须记录
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

// ==========================================
// AuditAction - 写入类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Added,   // 新增
    Changed, // 修改
}

impl AuditAction {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Added => "Added",
            AuditAction::Changed => "Changed",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Added" => Some(AuditAction::Added),
            "Changed" => Some(AuditAction::Changed),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// AuditEntry - 操作日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action_id: String,          // 日志ID
    pub actor: String,              // 操作人
    pub entity: String,             // 目标实体类型
    pub target_id: String,          // 目标记录主键
    pub action: AuditAction,        // 新增/修改
    pub change_summary: String,     // 变更摘要
    pub action_ts: NaiveDateTime,   // 操作时间戳
    pub payload_json: Option<JsonValue>, // 变更字段及新值
}

impl AuditEntry {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `actor`: 操作人
    /// - `entity`: 目标实体类型
    /// - `target_id`: 目标记录主键
    /// - `action`: 新增/修改
    /// - `changed_fields`: 发生变化的字段名（用于生成摘要）
    pub fn new(
        actor: impl Into<String>,
        entity: impl Into<String>,
        target_id: impl Into<String>,
        action: AuditAction,
        changed_fields: &[String],
    ) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            actor: actor.into(),
            entity: entity.into(),
            target_id: target_id.into(),
            action,
            change_summary: change_summary(changed_fields),
            action_ts: chrono::Utc::now().naive_utc(),
            payload_json: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }
}

/// 变更摘要: "修改了 a、b 和 c。"
pub fn change_summary(fields: &[String]) -> String {
    let list = match fields {
        [] => return "未修改任何字段。".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} 和 {}", init.join("、"), last),
    };
    format!("修改了 {}。", list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_summary_text_list() {
        assert_eq!(change_summary(&[]), "未修改任何字段。");
        assert_eq!(change_summary(&["qty".to_string()]), "修改了 qty。");
        assert_eq!(
            change_summary(&["a".to_string(), "b".to_string(), "c".to_string()]),
            "修改了 a、b 和 c。"
        );
    }

    #[test]
    fn test_action_roundtrip() {
        for action in [AuditAction::Added, AuditAction::Changed] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("Deleted"), None);
    }

    #[test]
    fn test_new_entry_has_unique_id() {
        let a = AuditEntry::new("u1", "demand", "D1", AuditAction::Added, &[]);
        let b = AuditEntry::new("u1", "demand", "D1", AuditAction::Added, &[]);
        assert_ne!(a.action_id, b.action_id);
        assert_eq!(a.target_id, "D1");
    }
}
