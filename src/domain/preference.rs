// ==========================================
// 通用报表引擎 - 用户偏好
// ==========================================
// 职责: 记忆用户的时间桶方案、起止日期与 CSV 分隔符
// 存储: user_preference 表
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 默认时间桶方案
pub const DEFAULT_BUCKET_SCHEME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    pub buckets: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// 原样保存；导出时解析，不支持的值使导出请求失败
    pub csv_delimiter: String,
}

impl UserPreference {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            buckets: None,
            start_date: None,
            end_date: None,
            csv_delimiter: "comma".to_string(),
        }
    }
}
