// ==========================================
// 选举计票系统 - 配置层
// ==========================================
// 职责: 计票配置管理,支持 config_kv 覆写与快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod tally_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use tally_config::TallyConfig;
