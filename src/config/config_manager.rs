// ==========================================
// 选举计票系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写、快照
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::tally_config::{
    TallyConfig, DEFAULT_AUTOMATIC_BUNDLE_NUMBERING, DEFAULT_BUNDLE_REVIEW_SAMPLE_SIZE,
    DEFAULT_DP_DIVISOR_SCALE, DEFAULT_DP_MAX_ITERATIONS,
};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

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
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("Lock acquisition failed: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("Lock acquisition failed: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("Lock acquisition failed: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "config value updated");
        Ok(())
    }

    /// 读取并解析配置；格式错误时记录告警并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = ?default,
                    "malformed config value, falling back to default"
                );
                Ok(default)
            }
        }
    }

    // ===== 票包配置 =====

    pub fn get_bundle_review_sample_size(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::BUNDLE_REVIEW_SAMPLE_SIZE,
            DEFAULT_BUNDLE_REVIEW_SAMPLE_SIZE,
        )
    }

    pub fn get_automatic_bundle_numbering(&self) -> Result<bool, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::AUTOMATIC_BUNDLE_NUMBERING,
            DEFAULT_AUTOMATIC_BUNDLE_NUMBERING,
        )
    }

    // ===== 双重比例配置 =====

    pub fn get_dp_max_iterations(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::DP_MAX_ITERATIONS, DEFAULT_DP_MAX_ITERATIONS)
    }

    pub fn get_dp_divisor_scale(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::DP_DIVISOR_SCALE, DEFAULT_DP_DIVISOR_SCALE)
    }

    /// 加载完整计票配置
    ///
    /// 取值越界时整体回退默认配置（记录告警）
    pub fn load_tally_config(&self) -> Result<TallyConfig, Box<dyn Error>> {
        let config = TallyConfig {
            bundle_review_sample_size: self.get_bundle_review_sample_size()?,
            automatic_bundle_numbering: self.get_automatic_bundle_numbering()?,
            dp_max_iterations: self.get_dp_max_iterations()?,
            dp_divisor_scale: self.get_dp_divisor_scale()?,
        };

        if let Err(reason) = config.validate() {
            tracing::warn!(reason = %reason, "invalid tally config, using defaults");
            return Ok(TallyConfig::default());
        }

        tracing::debug!(?config, "tally config loaded");
        Ok(config)
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("Lock acquisition failed: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

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
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("Lock acquisition failed: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        tracing::info!(restored = count, "config restored from snapshot");
        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 票包
    pub const BUNDLE_REVIEW_SAMPLE_SIZE: &str = "bundle_review_sample_size";
    pub const AUTOMATIC_BUNDLE_NUMBERING: &str = "automatic_bundle_numbering";

    // 双重比例
    pub const DP_MAX_ITERATIONS: &str = "dp_max_iterations";
    pub const DP_DIVISOR_SCALE: &str = "dp_divisor_scale";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let manager = memory_manager();
        assert_eq!(manager.load_tally_config().unwrap(), TallyConfig::default());
    }

    #[test]
    fn test_override_and_malformed_value() {
        let manager = memory_manager();
        manager
            .set_global_config_value(config_keys::BUNDLE_REVIEW_SAMPLE_SIZE, "3")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DP_MAX_ITERATIONS, "many")
            .unwrap();

        let config = manager.load_tally_config().unwrap();
        assert_eq!(config.bundle_review_sample_size, 3);
        assert_eq!(config.dp_max_iterations, DEFAULT_DP_MAX_ITERATIONS);
    }

    #[test]
    fn test_snapshot_restore() {
        let manager = memory_manager();
        manager
            .set_global_config_value(config_keys::AUTOMATIC_BUNDLE_NUMBERING, "false")
            .unwrap();
        let snapshot = manager.get_config_snapshot().unwrap();

        manager
            .set_global_config_value(config_keys::AUTOMATIC_BUNDLE_NUMBERING, "true")
            .unwrap();
        assert!(manager.get_automatic_bundle_numbering().unwrap());

        let restored = manager.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 1);
        assert!(!manager.get_automatic_bundle_numbering().unwrap());
    }
}
