// ==========================================
// 通用报表引擎 - 引擎配置
// ==========================================
// 职责: 导出/导入/分页的可调参数，构建一次后只读
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::config_manager::config_keys;
use crate::domain::types::CsvDelimiter;
use crate::engine::csv_stream::{CsvOptions, NULL_PLACEHOLDER};
use crate::engine::paginator::Paginator;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub csv_delimiter: CsvDelimiter,
    /// WHATWG 编码标签（utf-8 / gbk / windows-1252 ...）
    pub csv_encoding: String,
    pub decimal_places: usize,
    pub import_chunk_size: usize,
    pub page_size: u64,
    pub pagination_on_ends: u64,
    pub pagination_on_each_side: u64,
    pub import_delimiter: CsvDelimiter,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            csv_delimiter: CsvDelimiter::Comma,
            csv_encoding: "utf-8".to_string(),
            decimal_places: 2,
            import_chunk_size: 500,
            page_size: 25,
            pagination_on_ends: 2,
            pagination_on_each_side: 3,
            import_delimiter: CsvDelimiter::Comma,
        }
    }
}

impl EngineConfig {
    /// 校验取值范围与编码标签
    pub fn validate(&self) -> ConfigResult<()> {
        self.encoding()?;
        if self.import_chunk_size == 0 {
            return Err(ConfigError::invalid(
                config_keys::IMPORT_CHUNK_SIZE,
                self.import_chunk_size,
                "分块大小必须大于 0",
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::invalid(
                config_keys::PAGE_SIZE,
                self.page_size,
                "每页条数必须大于 0",
            ));
        }
        Ok(())
    }

    /// 导出编码
    pub fn encoding(&self) -> ConfigResult<&'static Encoding> {
        Encoding::for_label(self.csv_encoding.trim().as_bytes()).ok_or_else(|| {
            ConfigError::invalid(config_keys::CSV_ENCODING, &self.csv_encoding, "未知编码")
        })
    }

    /// 导出选项（分隔符来自用户偏好）
    pub fn csv_options(&self, delimiter: CsvDelimiter) -> ConfigResult<CsvOptions> {
        Ok(CsvOptions {
            delimiter,
            encoding: self.encoding()?,
            decimal_places: self.decimal_places,
            null_placeholder: NULL_PLACEHOLDER.to_string(),
        })
    }

    pub fn paginator(&self, page_size: Option<u64>) -> Paginator {
        Paginator::new(page_size.unwrap_or(self.page_size))
            .with_window(self.pagination_on_ends, self.pagination_on_each_side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.encoding().unwrap(), encoding_rs::UTF_8);
        assert_eq!(config.paginator(None).page_size, 25);
        assert_eq!(config.paginator(Some(10)).page_size, 10);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"csv_encoding": "gbk", "csv_delimiter": "semicolon"}"#)
                .unwrap();
        assert_eq!(config.csv_delimiter, CsvDelimiter::Semicolon);
        assert_eq!(config.import_chunk_size, 500);
        assert_eq!(config.encoding().unwrap(), encoding_rs::GBK);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EngineConfig {
            csv_encoding: "klingon".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = EngineConfig {
            import_chunk_size: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
