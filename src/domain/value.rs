// ==========================================
// 通用报表引擎 - 字段值与记录访问
// ==========================================
// 职责: 统一的字段值类型 + 多态记录访问接口
// 约束: 引擎只通过 RecordAccess 读取字段，不区分记录的具体表示
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 日期格式（ISO）
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 日期时间格式（ISO，空格分隔）
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// Value - 字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// 以字段名为键的通用记录
pub type Record = BTreeMap<String, Value>;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Number(_))
    }

    /// 数值视图（整数/浮点）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// 与请求中的原始文本比较（按本值的类型解析原始文本）
    ///
    /// # 返回
    /// - None: 本值为空，或原始文本无法按本值类型解析
    pub fn compare_raw(&self, raw: &str) -> Option<Ordering> {
        let raw = raw.trim();
        match self {
            Value::Null => None,
            Value::Bool(b) => parse_bool(raw).map(|other| b.cmp(&other)),
            Value::Integer(i) => match raw.parse::<i64>() {
                Ok(other) => Some(i.cmp(&other)),
                Err(_) => raw
                    .parse::<f64>()
                    .ok()
                    .and_then(|other| (*i as f64).partial_cmp(&other)),
            },
            Value::Number(n) => raw.parse::<f64>().ok().and_then(|other| n.partial_cmp(&other)),
            Value::Text(s) => Some(s.as_str().cmp(raw)),
            Value::Date(d) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .map(|other| d.cmp(&other)),
            Value::DateTime(dt) => parse_datetime(raw).map(|other| dt.cmp(&other)),
        }
    }

    /// 排序比较：空值最小，数值按数值比较，其余同类型比较，异类型按文本比较
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// 解析布尔文本（1/0、true/false、yes/no、是/否）
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "是" => Some(true),
        "0" | "false" | "no" | "n" | "否" => Some(false),
        _ => None,
    }
}

/// 解析日期时间文本（接受纯日期，补零点）
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = [DATETIME_FORMAT, "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ==========================================
// RecordAccess - 记录访问接口
// ==========================================
// 用途: 引擎读取任意记录表示（映射/结构体）的字段
// 约定: 缺失字段返回 Value::Null
pub trait RecordAccess {
    fn get_value(&self, field: &str) -> Value;
}

impl RecordAccess for BTreeMap<String, Value> {
    fn get_value(&self, field: &str) -> Value {
        self.get(field).cloned().unwrap_or(Value::Null)
    }
}

impl RecordAccess for HashMap<String, Value> {
    fn get_value(&self, field: &str) -> Value {
        self.get(field).cloned().unwrap_or(Value::Null)
    }
}

impl<T: RecordAccess + ?Sized> RecordAccess for &T {
    fn get_value(&self, field: &str) -> Value {
        (**self).get_value(field)
    }
}

impl<T: RecordAccess + ?Sized> RecordAccess for Box<T> {
    fn get_value(&self, field: &str) -> Value {
        (**self).get_value(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Demand {
        name: String,
        quantity: f64,
    }

    impl RecordAccess for Demand {
        fn get_value(&self, field: &str) -> Value {
            match field {
                "name" => Value::Text(self.name.clone()),
                "quantity" => Value::Number(self.quantity),
                _ => Value::Null,
            }
        }
    }

    #[test]
    fn test_record_access_on_struct_and_map() {
        let d = Demand {
            name: "D1".to_string(),
            quantity: 3.5,
        };
        assert_eq!(d.get_value("name"), Value::text("D1"));
        assert_eq!(d.get_value("missing"), Value::Null);

        let mut r = Record::new();
        r.insert("name".to_string(), Value::text("D2"));
        assert_eq!(r.get_value("name"), Value::text("D2"));
        assert_eq!(r.get_value("quantity"), Value::Null);
    }

    #[test]
    fn test_compare_raw_typed() {
        assert_eq!(Value::Integer(5).compare_raw("5"), Some(Ordering::Equal));
        assert_eq!(Value::Integer(5).compare_raw("7.5"), Some(Ordering::Less));
        assert_eq!(Value::Number(2.5).compare_raw("1"), Some(Ordering::Greater));
        assert_eq!(Value::Integer(5).compare_raw("abc"), None);
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Value::Date(d).compare_raw("2024-02-28"), Some(Ordering::Greater));
        assert_eq!(Value::Null.compare_raw("1"), None);
    }

    #[test]
    fn test_sort_cmp_nulls_first_and_mixed_numeric() {
        assert_eq!(Value::Null.sort_cmp(&Value::Integer(1)), Ordering::Less);
        assert_eq!(Value::Integer(2).sort_cmp(&Value::Number(1.5)), Ordering::Greater);
        assert_eq!(Value::text("a").sort_cmp(&Value::text("b")), Ordering::Less);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "True");
        let dt = parse_datetime("2024-01-02").unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-01-02 00:00:00");
    }
}
