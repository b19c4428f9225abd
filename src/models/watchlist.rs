//! 自选列表模型
//!
//! 排序模式、刷新设置、持久化结构以及对外输出的视图模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::stock::{Instrument, Quote, SearchResult, TrendSeries};

/// 行情刷新间隔下限（秒）
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;

/// 按涨跌幅排序的模式，循环顺序 NONE -> DESC -> ASC -> NONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortMode {
    /// 保持自选顺序
    #[default]
    None,
    /// 涨幅从高到低
    Desc,
    /// 涨幅从低到高
    Asc,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            SortMode::None => SortMode::Desc,
            SortMode::Desc => SortMode::Asc,
            SortMode::Asc => SortMode::None,
        }
    }
}

/// 自动刷新设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// 行情刷新间隔（秒），生效值不低于 10 秒
    pub interval_secs: u64,
    /// 是否开启自动刷新
    pub auto_refresh: bool,
}

impl RefreshSettings {
    pub fn new(interval_secs: u64, auto_refresh: bool) -> Self {
        Self {
            interval_secs: interval_secs.max(MIN_REFRESH_INTERVAL_SECS),
            auto_refresh,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::new(MIN_REFRESH_INTERVAL_SECS, true)
    }
}

/// 需要持久化的用户设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default)]
    pub watchlist: Vec<Instrument>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
}

fn default_refresh_interval() -> u64 { MIN_REFRESH_INTERVAL_SECS }
fn default_auto_refresh() -> bool { true }

impl PersistedSettings {
    pub fn refresh(&self) -> RefreshSettings {
        RefreshSettings::new(self.refresh_interval_secs, self.auto_refresh)
    }
}

/// 展示层使用的视图模型
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistView {
    /// 自选顺序
    pub instruments: Vec<Instrument>,
    /// 按当前排序模式整理后的行情
    pub quotes: Vec<Quote>,
    /// 分时走势，键为 secid
    pub trends: BTreeMap<String, TrendSeries>,
    pub sort_mode: SortMode,
    pub refresh: RefreshSettings,
    /// 当前是否处于交易时段
    pub in_session: bool,
}

/// 当前搜索结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchSnapshot {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// 修改排序模式的请求体
#[derive(Debug, Deserialize)]
pub struct SortModeRequest {
    pub mode: SortMode,
}

/// 修改刷新设置的请求体
#[derive(Debug, Deserialize)]
pub struct RefreshSettingsRequest {
    pub interval_secs: Option<u64>,
    pub auto_refresh: Option<bool>,
}

/// 搜索输入
#[derive(Debug, Deserialize)]
pub struct SearchQueryRequest {
    #[serde(default)]
    pub query: String,
}
