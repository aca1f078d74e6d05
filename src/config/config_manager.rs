// ==========================================
// 通用报表引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::config::error::{ConfigError, ConfigResult};
use crate::db::open_sqlite_connection;
use crate::domain::types::CsvDelimiter;
use crate::domain::value::DATE_FORMAT;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// 全局作用域
pub const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = lock(&conn)?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 共享连接（供仓储复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        debug!(key = key, value = value, "配置已写入");
        Ok(())
    }

    fn parse_or_default<T: FromStr>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T::Err: ToString,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, &raw, e.to_string())),
        }
    }

    /// 加载引擎配置（缺失项取默认值）
    ///
    /// # 返回
    /// - Err(InvalidValue): 存在无法解析或超出范围的配置值
    pub fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            csv_delimiter: self.parse_or_default::<CsvDelimiter>(
                config_keys::CSV_DELIMITER,
                defaults.csv_delimiter,
            )?,
            csv_encoding: self
                .get_global_config_value(config_keys::CSV_ENCODING)?
                .unwrap_or(defaults.csv_encoding),
            decimal_places: self
                .parse_or_default(config_keys::DECIMAL_PLACES, defaults.decimal_places)?,
            import_chunk_size: self
                .parse_or_default(config_keys::IMPORT_CHUNK_SIZE, defaults.import_chunk_size)?,
            page_size: self.parse_or_default(config_keys::PAGE_SIZE, defaults.page_size)?,
            pagination_on_ends: self
                .parse_or_default(config_keys::PAGINATION_ON_ENDS, defaults.pagination_on_ends)?,
            pagination_on_each_side: self.parse_or_default(
                config_keys::PAGINATION_ON_EACH_SIDE,
                defaults.pagination_on_each_side,
            )?,
            import_delimiter: self.parse_or_default::<CsvDelimiter>(
                config_keys::IMPORT_DELIMITER,
                defaults.import_delimiter,
            )?,
        };
        config.validate()?;
        info!(?config, "引擎配置已加载");
        Ok(config)
    }

    /// 保存引擎配置（全部键覆盖写入）
    pub fn save_engine_config(&self, config: &EngineConfig) -> ConfigResult<()> {
        config.validate()?;
        let entries = [
            (config_keys::CSV_DELIMITER, config.csv_delimiter.to_string()),
            (config_keys::CSV_ENCODING, config.csv_encoding.clone()),
            (config_keys::DECIMAL_PLACES, config.decimal_places.to_string()),
            (config_keys::IMPORT_CHUNK_SIZE, config.import_chunk_size.to_string()),
            (config_keys::PAGE_SIZE, config.page_size.to_string()),
            (config_keys::PAGINATION_ON_ENDS, config.pagination_on_ends.to_string()),
            (
                config_keys::PAGINATION_ON_EACH_SIDE,
                config.pagination_on_each_side.to_string(),
            ),
            (config_keys::IMPORT_DELIMITER, config.import_delimiter.to_string()),
        ];
        for (key, value) in entries {
            self.set_global_config_value(key, &value)?;
        }
        Ok(())
    }

    /// 计划当前日期（时间桶起始日期的最终缺省值）
    ///
    /// 未配置或格式错误时使用系统当天日期
    pub fn current_date(&self) -> ConfigResult<NaiveDate> {
        let today = chrono::Local::now().date_naive();
        match self.get_global_config_value(config_keys::CURRENT_DATE)? {
            None => Ok(today),
            Some(raw) => match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
                Ok(date) => Ok(date),
                Err(_) => {
                    warn!(config_key = config_keys::CURRENT_DATE, raw_value = %raw, "当前日期配置格式错误，使用系统日期");
                    Ok(today)
                }
            },
        }
    }

    pub fn set_current_date(&self, date: NaiveDate) -> ConfigResult<()> {
        self.set_global_config_value(
            config_keys::CURRENT_DATE,
            &date.format(DATE_FORMAT).to_string(),
        )
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3",
                params![GLOBAL_SCOPE, key, value],
            )?;
        }
        tx.commit()?;
        info!(count = count, "配置已从快照恢复");
        Ok(count)
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> ConfigResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ConfigError::LockError(e.to_string()))
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导出
    pub const CSV_DELIMITER: &str = "csv_delimiter";
    pub const CSV_ENCODING: &str = "csv_encoding";
    pub const DECIMAL_PLACES: &str = "decimal_places";

    // 导入
    pub const IMPORT_CHUNK_SIZE: &str = "import_chunk_size";
    pub const IMPORT_DELIMITER: &str = "import_delimiter";

    // 分页
    pub const PAGE_SIZE: &str = "page_size";
    pub const PAGINATION_ON_ENDS: &str = "pagination_on_ends";
    pub const PAGINATION_ON_EACH_SIDE: &str = "pagination_on_each_side";

    // 计划当前日期 (YYYY-MM-DD)
    pub const CURRENT_DATE: &str = "currentdate";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_load_defaults_then_overrides() {
        let mgr = manager();
        assert_eq!(mgr.load_engine_config().unwrap(), EngineConfig::default());

        mgr.set_global_config_value(config_keys::CSV_DELIMITER, "semicolon").unwrap();
        mgr.set_global_config_value(config_keys::IMPORT_CHUNK_SIZE, "4").unwrap();
        let config = mgr.load_engine_config().unwrap();
        assert_eq!(config.csv_delimiter, CsvDelimiter::Semicolon);
        assert_eq!(config.import_chunk_size, 4);
    }

    #[test]
    fn test_invalid_values_surface_as_errors() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::PAGE_SIZE, "lots").unwrap();
        assert!(matches!(
            mgr.load_engine_config(),
            Err(ConfigError::InvalidValue { .. })
        ));

        mgr.set_global_config_value(config_keys::PAGE_SIZE, "25").unwrap();
        mgr.set_global_config_value(config_keys::CSV_DELIMITER, "tab").unwrap();
        assert!(mgr.load_engine_config().is_err());
    }

    #[test]
    fn test_current_date_configured() {
        let mgr = manager();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        mgr.set_current_date(date).unwrap();
        assert_eq!(mgr.current_date().unwrap(), date);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mgr = manager();
        mgr.save_engine_config(&EngineConfig::default()).unwrap();
        let snapshot = mgr.get_config_snapshot().unwrap();

        mgr.set_global_config_value(config_keys::DECIMAL_PLACES, "4").unwrap();
        let restored = mgr.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 8);
        assert_eq!(mgr.load_engine_config().unwrap().decimal_places, 2);
    }
}
