//! 用户设置持久化
//!
//! 自选列表和刷新设置保存在 JSON 文件中。保存失败只记录日志，
//! 不影响触发保存的操作

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Instrument, PersistedSettings};

/// 设置存储
pub trait SettingsStore: Send + Sync {
    /// 读取设置，文件不存在时返回 None
    fn load(&self) -> Result<Option<PersistedSettings>>;
    fn save(&self, settings: &PersistedSettings) -> Result<()>;
}

/// JSON 文件存储
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Option<PersistedSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("读取设置文件 {} 失败", self.path.display()))?;
        let settings = parse_settings(&content)
            .with_context(|| format!("解析设置文件 {} 失败", self.path.display()))?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &PersistedSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("写入设置文件 {} 失败", self.path.display()))?;
        Ok(())
    }
}

/// 解析设置内容，自选中无法识别的条目逐条跳过，不影响其余条目
fn parse_settings(content: &str) -> Result<PersistedSettings> {
    let mut raw: Value = serde_json::from_str(content)?;
    let entries = raw
        .as_object_mut()
        .and_then(|fields| fields.remove("watchlist"));

    let mut settings: PersistedSettings = serde_json::from_value(raw)?;
    if let Some(Value::Array(entries)) = entries {
        settings.watchlist = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Instrument>(entry.clone()) {
                Ok(instrument) => Some(instrument),
                Err(e) => {
                    log::warn!("跳过无效的自选条目 {}: {}", entry, e);
                    None
                }
            })
            .collect();
    }
    Ok(settings)
}

/// 启动时读取设置，读取失败按首次启动处理
pub fn load_or_default(store: &dyn SettingsStore, defaults: PersistedSettings) -> PersistedSettings {
    match store.load() {
        Ok(Some(settings)) => {
            log::info!("恢复自选 {} 只", settings.watchlist.len());
            settings
        }
        Ok(None) => {
            log::info!("未找到设置文件，使用默认设置");
            defaults
        }
        Err(e) => {
            log::warn!("加载设置失败，使用默认设置: {:#}", e);
            defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_path(dir: &TempDir) -> PathBuf {
        dir.path().join("data").join("settings.json")
    }

    fn defaults() -> PersistedSettings {
        PersistedSettings {
            watchlist: Vec::new(),
            refresh_interval_secs: 10,
            auto_refresh: true,
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir);
        let store = JsonSettingsStore::new(&path);
        let settings = PersistedSettings {
            watchlist: vec![
                "1.600519".parse::<Instrument>().unwrap(),
                "0.000001".parse::<Instrument>().unwrap(),
            ],
            refresh_interval_secs: 30,
            auto_refresh: false,
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), Some(settings));
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir);
        let store = JsonSettingsStore::new(&path);
        assert_eq!(store.load().unwrap(), None);

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_err());
        assert_eq!(load_or_default(&store, defaults()), defaults());
    }

    #[test]
    fn test_invalid_watchlist_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{
                "watchlist": [
                    {"code": "600519", "market": "SH"},
                    {"code": "60051x", "market": "SH"},
                    {"code": "000001", "market": "BJ"},
                    "junk",
                    {"code": "000858", "market": "SZ"}
                ],
                "refresh_interval_secs": 30,
                "auto_refresh": false
            }"#,
        )
        .unwrap();

        let loaded = load_or_default(&JsonSettingsStore::new(&path), defaults());
        assert_eq!(
            loaded.watchlist,
            vec![
                "1.600519".parse::<Instrument>().unwrap(),
                "0.000858".parse::<Instrument>().unwrap(),
            ]
        );
        assert_eq!(loaded.refresh_interval_secs, 30);
        assert!(!loaded.auto_refresh);
    }

    #[test]
    fn test_missing_watchlist_field_defaults_to_empty() {
        let settings = parse_settings(r#"{"refresh_interval_secs": 20}"#).unwrap();
        assert!(settings.watchlist.is_empty());
        assert_eq!(settings.refresh_interval_secs, 20);
        assert!(settings.auto_refresh);
    }
}
