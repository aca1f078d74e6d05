// ==========================================
// 通用报表引擎 - 请求上下文
// ==========================================
// 职责: 有序多值查询参数 + 请求路径/操作人
// 约束: 保留参数不参与过滤
// ==========================================

use url::form_urlencoded;

/// 排序参数名
pub const SORT_PARAM: &str = "o";

/// 分页参数名
pub const PAGE_PARAM: &str = "p";

/// 输出格式参数名
pub const REPORT_TYPE_PARAM: &str = "reporttype";

/// 弹窗参数名
pub const POPUP_PARAM: &str = "pop";

/// 时间桶参数名
pub const BUCKET_PARAM: &str = "reportbucket";
pub const BUCKET_START_PARAM: &str = "reportstart";
pub const BUCKET_END_PARAM: &str = "reportend";

/// 保留参数（永不作为过滤条件）
pub const RESERVED_PARAMETERS: [&str; 8] = [
    SORT_PARAM,
    PAGE_PARAM,
    "t",
    REPORT_TYPE_PARAM,
    POPUP_PARAM,
    BUCKET_PARAM,
    BUCKET_START_PARAM,
    BUCKET_END_PARAM,
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMETERS.contains(&name)
}

// ==========================================
// QueryParams - 有序多值查询参数
// ==========================================
// 同名参数可重复出现（如 qty__gte 与 qty__lte，或同一字段两次）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 URL 查询串（不含前导 '?'）
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 追加一个参数（保留已有同名参数）
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// 设置参数：替换第一个同名参数并移除其余同名参数；不存在则追加
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == name) {
            Some(pos) => {
                self.pairs[pos].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = k != name || index == pos;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    /// 移除全部同名参数
    pub fn remove(&mut self, name: &str) {
        self.pairs.retain(|(k, _)| k != name);
    }

    /// 第一个同名参数的值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// URL 编码
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

// ==========================================
// RequestContext - 单次请求上下文
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    pub params: QueryParams,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, params: QueryParams) -> Self {
        Self {
            path: path.into(),
            params,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 当前路径 + 给定参数构成的链接
    pub fn href(&self, params: &QueryParams) -> String {
        if params.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, params.encode())
        }
    }

    /// 是否为弹窗请求
    pub fn is_popup(&self) -> bool {
        self.params.contains(POPUP_PARAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_repeated_params_in_order() {
        let params = QueryParams::parse("?qty__gte=5&qty__lte=20&name=a%20b&o=2d");
        assert_eq!(params.len(), 4);
        assert_eq!(params.get("name"), Some("a b"));
        assert_eq!(params.get("o"), Some("2d"));
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["qty__gte", "qty__lte", "name", "o"]);
    }

    #[test]
    fn test_set_replaces_all_duplicates() {
        let mut params = QueryParams::from_pairs([("p", "2"), ("a", "1"), ("p", "3")]);
        params.set("p", "7");
        assert_eq!(params.encode(), "p=7&a=1");
        params.set("o", "1a");
        assert_eq!(params.encode(), "p=7&a=1&o=1a");
        params.remove("p");
        assert_eq!(params.encode(), "a=1&o=1a");
    }

    #[test]
    fn test_href_without_params_is_bare_path() {
        let ctx = RequestContext::new("/demand/", QueryParams::new());
        assert_eq!(ctx.href(&QueryParams::new()), "/demand/");
        let params = QueryParams::from_pairs([("p", "2")]);
        assert_eq!(ctx.href(&params), "/demand/?p=2");
    }

    #[test]
    fn test_reserved() {
        assert!(is_reserved("o"));
        assert!(is_reserved("reportend"));
        assert!(!is_reserved("name"));
    }
}
