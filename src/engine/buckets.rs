// ==========================================
// 通用报表引擎 - 时间桶选择
// ==========================================
// 职责: 由请求参数/用户偏好/当前日期确定时间桶方案与起止日期
// 约束: 显式给出的有效值写回用户偏好；仅在值变化时标记需要保存
// ==========================================

use crate::domain::preference::{UserPreference, DEFAULT_BUCKET_SCHEME};
use crate::domain::report::BucketSpec;
use crate::domain::request::{QueryParams, BUCKET_END_PARAM, BUCKET_PARAM, BUCKET_START_PARAM};
use crate::domain::value::DATE_FORMAT;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSelection {
    pub scheme: String,
    pub start: NaiveDate,
    /// None 表示不设上限
    pub end: Option<NaiveDate>,
}

impl BucketSelection {
    /// 桶是否落在选择范围内（start <= 桶起始 < end）
    pub fn contains(&self, bucket: &BucketSpec) -> bool {
        bucket.start_date >= self.start && self.end.map_or(true, |end| bucket.start_date < end)
    }

    /// 过滤方案内的时间桶（保持原有顺序）
    pub fn filter(&self, buckets: Vec<BucketSpec>) -> Vec<BucketSpec> {
        buckets.into_iter().filter(|b| self.contains(b)).collect()
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// 解析时间桶选择
///
/// # 参数
/// - `params`: 请求参数（reportbucket / reportstart / reportend）
/// - `pref`: 用户偏好（显式有效值会写回）
/// - `current_date`: 配置的当前日期（起始日期的最终缺省值）
///
/// # 返回
/// - (选择结果, 偏好是否变化)
pub fn select_buckets(
    params: &QueryParams,
    pref: &mut UserPreference,
    current_date: NaiveDate,
) -> (BucketSelection, bool) {
    let mut changed = false;

    let scheme = match params.get(BUCKET_PARAM).filter(|s| !s.is_empty()) {
        Some(requested) => {
            if pref.buckets.as_deref() != Some(requested) {
                pref.buckets = Some(requested.to_string());
                changed = true;
            }
            requested.to_string()
        }
        None => pref
            .buckets
            .clone()
            .unwrap_or_else(|| DEFAULT_BUCKET_SCHEME.to_string()),
    };

    let start = match params.get(BUCKET_START_PARAM).and_then(parse_date) {
        Some(start) => {
            if pref.start_date != Some(start) {
                pref.start_date = Some(start);
                changed = true;
            }
            start
        }
        None => pref.start_date.unwrap_or(current_date),
    };

    let end = match params.get(BUCKET_END_PARAM).and_then(parse_date) {
        Some(end) => {
            if pref.end_date != Some(end) {
                pref.end_date = Some(end);
                changed = true;
            }
            Some(end)
        }
        None => pref.end_date,
    };

    debug!(scheme = %scheme, %start, end = ?end, changed, "时间桶选择完成");
    (BucketSelection { scheme, start, end }, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_defaults_without_params_or_preference() {
        let mut pref = UserPreference::new("u1");
        let (sel, changed) = select_buckets(&QueryParams::new(), &mut pref, d(3, 1));
        assert_eq!(sel.scheme, "default");
        assert_eq!(sel.start, d(3, 1));
        assert_eq!(sel.end, None);
        assert!(!changed);
    }

    #[test]
    fn test_explicit_values_are_remembered_once() {
        let mut pref = UserPreference::new("u1");
        let params = QueryParams::parse("reportbucket=week&reportstart=2024-01-01&reportend=2024-02-01");
        let (sel, changed) = select_buckets(&params, &mut pref, d(3, 1));
        assert!(changed);
        assert_eq!(sel.scheme, "week");
        assert_eq!(pref.buckets.as_deref(), Some("week"));
        assert_eq!(pref.start_date, Some(d(1, 1)));
        assert_eq!(pref.end_date, Some(d(2, 1)));

        let (_, changed) = select_buckets(&params, &mut pref, d(3, 1));
        assert!(!changed);

        // 无参数时沿用偏好
        let (sel, _) = select_buckets(&QueryParams::new(), &mut pref, d(3, 1));
        assert_eq!(sel.start, d(1, 1));
        assert_eq!(sel.end, Some(d(2, 1)));
    }

    #[test]
    fn test_invalid_date_falls_back_to_preference() {
        let mut pref = UserPreference::new("u1");
        pref.start_date = Some(d(1, 15));
        let params = QueryParams::parse("reportstart=not-a-date");
        let (sel, changed) = select_buckets(&params, &mut pref, d(3, 1));
        assert_eq!(sel.start, d(1, 15));
        assert!(!changed);
    }

    #[test]
    fn test_filter_half_open_range() {
        let sel = BucketSelection {
            scheme: "week".to_string(),
            start: d(1, 8),
            end: Some(d(1, 22)),
        };
        let buckets = vec![
            BucketSpec::new("W1", d(1, 1), d(1, 8)),
            BucketSpec::new("W2", d(1, 8), d(1, 15)),
            BucketSpec::new("W3", d(1, 15), d(1, 22)),
            BucketSpec::new("W4", d(1, 22), d(1, 29)),
        ];
        let names: Vec<String> = sel.filter(buckets).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["W2", "W3"]);
    }
}
