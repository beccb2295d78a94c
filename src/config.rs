//! 应用配置模块

use crate::core::{ScanConfig, SyncConfig};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 同步相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 最大并发复制数
    #[serde(default = "default_max_concurrent_copies")]
    pub max_concurrent_copies: usize,
    /// 扫描时排除的路径模式
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_max_concurrent_copies() -> usize {
    4
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrent_copies: default_max_concurrent_copies(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// 从配置文件加载同步配置
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "sync").unwrap_or_default()
    }

    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_concurrent_copies: self.max_concurrent_copies.clamp(1, 64),
            scan_config: ScanConfig {
                exclude_patterns: self.exclude_patterns.clone(),
            },
        }
    }
}

/// 完整应用配置
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sync: SyncSettings,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load(config_dir: &Path) -> Self {
        Self {
            sync: SyncSettings::load(config_dir),
            log: LogConfig::load(config_dir),
        }
    }
}

/// 读取 config.json 中的某个配置段，文件不存在或无效时返回 None
pub(crate) fn read_section<T: for<'de> Deserialize<'de>>(
    config_dir: &Path,
    key: &str,
) -> Option<T> {
    let content = fs::read_to_string(config_dir.join("config.json")).ok()?;
    let config = serde_json::from_str::<serde_json::Value>(&content).ok()?;
    serde_json::from_value(config.get(key)?.clone()).ok()
}
