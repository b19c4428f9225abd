//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，`API_KEY` 环境变量可覆盖文件中的密钥

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::models::{PersistedSettings, MIN_REFRESH_INTERVAL_SECS};
use crate::services::sync_engine::EngineConfig;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API Key（为空则不启用认证）
    #[serde(default)]
    pub api_key: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 连接超时时间（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// 刷新配置
///
/// `interval_secs` 和 `auto_refresh` 只是首次启动时的默认值，
/// 之后以持久化的用户设置为准
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// 行情刷新间隔（秒），不低于 10
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    /// 分时全量纠偏间隔（秒）
    #[serde(default = "default_trend_interval")]
    pub trend_interval_secs: u64,
    /// 分时抓取并发上限
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// 搜索防抖（毫秒）
    #[serde(default = "default_search_debounce")]
    pub search_debounce_ms: u64,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 自选与刷新设置的保存路径
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_refresh_interval() -> u64 { MIN_REFRESH_INTERVAL_SECS }
fn default_true() -> bool { true }
fn default_trend_interval() -> u64 { 30 }
fn default_fetch_concurrency() -> usize { 15 }
fn default_search_debounce() -> u64 { 300 }
fn default_settings_path() -> String { "data/settings.json".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            auto_refresh: default_true(),
            trend_interval_secs: default_trend_interval(),
            fetch_concurrency: default_fetch_concurrency(),
            search_debounce_ms: default_search_debounce(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
        }
    }
}

impl RefreshConfig {
    /// 没有已保存设置时使用的初始值
    pub fn initial_settings(&self) -> PersistedSettings {
        PersistedSettings {
            watchlist: Vec::new(),
            refresh_interval_secs: self.interval_secs.max(MIN_REFRESH_INTERVAL_SECS),
            auto_refresh: self.auto_refresh,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            trend_interval: Duration::from_secs(self.trend_interval_secs.max(1)),
            fetch_concurrency: self.fetch_concurrency.max(1),
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置，优先从文件，失败则使用默认值
    pub fn load() -> Self {
        let config_paths = ["config.json", "config/config.json"];
        let mut config = None;

        for path in config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(loaded) => {
                        log::info!("从 {} 加载配置成功", path);
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        log::warn!("加载配置文件 {} 失败: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            log::info!("使用默认配置");
            Self::default()
        });
        config.apply_env(env::var("API_KEY").ok());
        config
    }

    /// 环境变量中的 API Key 优先于配置文件
    fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api.api_key = key.trim().to_string();
        }
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"server": {"port": 9000}, "refresh": {"interval_secs": 20}}"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.refresh.interval_secs, 20);
        assert!(config.refresh.auto_refresh);
        assert_eq!(config.refresh.trend_interval_secs, 30);
        assert_eq!(config.refresh.fetch_concurrency, 15);
        assert_eq!(config.storage.settings_path, "data/settings.json");
        assert!(config.api.api_key.is_empty());
    }

    #[test]
    fn test_initial_settings_respect_floor() {
        let refresh = RefreshConfig {
            interval_secs: 3,
            auto_refresh: false,
            ..RefreshConfig::default()
        };
        let initial = refresh.initial_settings();
        assert_eq!(initial.refresh_interval_secs, 10);
        assert!(!initial.auto_refresh);
        assert!(initial.watchlist.is_empty());
    }

    #[test]
    fn test_env_api_key_overrides_file() {
        let mut config = AppConfig::default();
        config.api.api_key = "from-file".to_string();

        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.api.api_key, "from-file");

        config.apply_env(Some("from-env".to_string()));
        assert_eq!(config.api.api_key, "from-env");
    }

    #[test]
    fn test_engine_config_conversion() {
        let refresh = RefreshConfig::default();
        let engine = refresh.engine_config();
        assert_eq!(engine.trend_interval, Duration::from_secs(30));
        assert_eq!(engine.fetch_concurrency, 15);
        assert_eq!(refresh.search_debounce(), Duration::from_millis(300));
    }
}
