// ==========================================
// 通用报表引擎 - 字段校验器
// ==========================================
// 职责: 原始文本 → 类型化字段值 + 约束校验
// 约束: 校验失败只产生告警消息，不中止导入
// ==========================================

use crate::domain::import::{FieldKind, SchemaField};
use crate::domain::value::{parse_bool, parse_datetime, Value, DATE_FORMAT};
use chrono::NaiveDate;

/// 必填字段缺失时的消息
pub const REQUIRED_MESSAGE: &str = "该字段为必填项";

/// 接受的日期格式（两位年份须先于四位年份尝试）
const DATE_INPUT_FORMATS: [&str; 3] = [DATE_FORMAT, "%m/%d/%y", "%m/%d/%Y"];

pub struct FieldValidator;

impl FieldValidator {
    /// 解析并校验单个字段
    ///
    /// # 参数
    /// - `field`: 字段定义
    /// - `raw`: 已去除首尾空白的原始文本
    ///
    /// # 返回
    /// - Ok(Value): 类型化值（空文本为 Null；布尔空文本为 false）
    /// - Err(String): 告警消息
    pub fn parse(field: &SchemaField, raw: &str) -> Result<Value, String> {
        if raw.is_empty() {
            return match field.kind {
                FieldKind::Boolean => Ok(Value::Bool(false)),
                _ if field.required => Err(REQUIRED_MESSAGE.to_string()),
                _ => Ok(Value::Null),
            };
        }

        match &field.kind {
            FieldKind::Text { max_length } => {
                let len = raw.chars().count();
                match max_length {
                    Some(max) if len > *max => Err(format!(
                        "长度不能超过 {} 个字符（当前 {} 个）",
                        max, len
                    )),
                    _ => Ok(Value::text(raw)),
                }
            }
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| "请输入整数".to_string()),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number)
                .ok_or_else(|| "请输入数字".to_string()),
            FieldKind::Boolean => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| "请输入有效的布尔值".to_string()),
            FieldKind::Date => parse_date_input(raw)
                .map(Value::Date)
                .ok_or_else(|| "请输入有效的日期".to_string()),
            FieldKind::DateTime => parse_datetime(raw)
                .or_else(|| parse_date_input(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
                .map(Value::DateTime)
                .ok_or_else(|| "请输入有效的日期时间".to_string()),
            FieldKind::Choice { choices } => {
                if choices.iter().any(|c| c == raw) {
                    Ok(Value::text(raw))
                } else {
                    Err(format!("请选择有效的选项，{} 不在可选范围内", raw))
                }
            }
        }
    }

    /// 新记录缺失的必填字段（既未提供也无缺省值）
    pub fn missing_required<'s>(
        fields: &'s [SchemaField],
        supplied: &[usize],
    ) -> Vec<&'s SchemaField> {
        fields
            .iter()
            .enumerate()
            .filter(|(i, f)| f.required && f.default.is_none() && !supplied.contains(i))
            .map(|(_, f)| f)
            .collect()
    }
}

fn parse_date_input(raw: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// 导入值与已有值是否相同（数值按数值比较，日期与日期时间互通）
pub fn same_value(new: &Value, old: &Value) -> bool {
    match (new, old) {
        (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
        (Value::Date(d), Value::DateTime(dt)) | (Value::DateTime(dt), Value::Date(d)) => {
            d.and_hms_opt(0, 0, 0) == Some(*dt)
        }
        (Value::Null, Value::Text(s)) | (Value::Text(s), Value::Null) => s.is_empty(),
        (Value::Bool(b), Value::Integer(i)) | (Value::Integer(i), Value::Bool(b)) => {
            (*i != 0) == *b
        }
        (Value::Text(s), other) | (other, Value::Text(s)) if !matches!(other, Value::Text(_)) => {
            other.to_string() == *s
        }
        (a, b) => a == b,
    }
}
