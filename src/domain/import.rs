// ==========================================
// 通用报表引擎 - 批量导入领域模型
// ==========================================
// 职责: 导入模式（字段/主键）、逐行诊断、导入结果
// ==========================================

use crate::domain::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FieldKind - 字段类型与约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Text { max_length: Option<usize> },
    Integer,
    Number,
    Boolean,
    Date,
    DateTime,
    Choice { choices: Vec<String> },
}

// ==========================================
// SchemaField - 导入字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub name: String,
    pub verbose_name: String,
    pub editable: bool,
    pub required: bool,
    pub kind: FieldKind,
    pub default: Option<Value>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            verbose_name: name.replace('_', " "),
            name,
            editable: true,
            required: false,
            kind,
            default: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text { max_length: None })
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = verbose_name.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// 表头匹配：不区分大小写地匹配字段名或显示名
    pub fn matches_header(&self, token: &str) -> bool {
        token == self.name.to_lowercase() || token == self.verbose_name.to_lowercase()
    }
}

// ==========================================
// ImportSchema - 导入模式
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSchema {
    pub entity: String,
    pub fields: Vec<SchemaField>,
    pub primary_key: String,
    /// 主键是否自动分配（无需在文件中提供）
    pub auto_primary_key: bool,
}

impl ImportSchema {
    pub fn new(entity: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
            primary_key: primary_key.into(),
            auto_primary_key: false,
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn auto_primary_key(mut self) -> Self {
        self.auto_primary_key = true;
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_field(&self) -> Option<&SchemaField> {
        self.find_field(&self.primary_key)
    }
}

// ==========================================
// ImportWarning - 字段校验告警（行被跳过，导入继续）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub row: usize,
    pub field: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "第 {} 行 字段 {}: {}: {}",
                self.row,
                field,
                self.value.as_deref().unwrap_or(""),
                self.message
            ),
            None => write!(f, "第 {} 行: {}", self.row, self.message),
        }
    }
}

// ==========================================
// ImportFailure - 致命错误（表头错误 / 单行异常）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    UnknownField,      // 表头含未知字段
    MissingPrimaryKey, // 表头缺少主键
    Row,               // 单行处理异常
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub kind: FailureKind,
    pub row: Option<usize>,
    pub message: String,
}

impl ImportFailure {
    pub fn unknown_field(column: &str) -> Self {
        Self {
            kind: FailureKind::UnknownField,
            row: None,
            message: format!("未知字段 {}", column),
        }
    }

    pub fn missing_primary_key(key: &str) -> Self {
        Self {
            kind: FailureKind::MissingPrimaryKey,
            row: None,
            message: format!("缺少主键字段 {}", key),
        }
    }

    pub fn row(row: usize, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Row,
            row: Some(row),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "第 {} 行导入异常: {}", row, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
// 无独立的"部分成功"状态：调用方同时检查计数与告警/错误列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub added: usize,
    pub changed: usize,
    pub warnings: Vec<ImportWarning>,
    pub errors: Vec<ImportFailure>,
}

impl ImportOutcome {
    /// 表头错误导致的中止结果
    pub fn aborted(errors: Vec<ImportFailure>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matching_uses_name_or_verbose_name() {
        let field = SchemaField::text("due_date").verbose_name("Due Date");
        assert!(field.matches_header("due_date"));
        assert!(field.matches_header("due date"));
        assert!(!field.matches_header("due"));
    }

    #[test]
    fn test_warning_display() {
        let w = ImportWarning {
            row: 3,
            field: Some("quantity".to_string()),
            value: Some("abc".to_string()),
            message: "请输入数字".to_string(),
        };
        assert_eq!(w.to_string(), "第 3 行 字段 quantity: abc: 请输入数字");
    }
}
