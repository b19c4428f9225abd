//! 股票数据模型
//!
//! 定义自选股相关的数据结构：证券标识、实时行情、分时走势、搜索候选

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 交易所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    /// 上海证券交易所
    #[serde(rename = "SH", alias = "sh")]
    Shanghai,
    /// 深圳证券交易所
    #[serde(rename = "SZ", alias = "sz")]
    Shenzhen,
}

impl Market {
    /// 东方财富 secid 中的市场编号（1 = 沪市，0 = 深市）
    pub fn secid_prefix(self) -> u8 {
        match self {
            Market::Shanghai => 1,
            Market::Shenzhen => 0,
        }
    }

    pub fn from_secid_prefix(id: u64) -> Option<Self> {
        match id {
            1 => Some(Market::Shanghai),
            0 => Some(Market::Shenzhen),
            _ => None,
        }
    }

    /// 从交易所缩写解析（sh / sz）
    pub fn from_abbr(abbr: &str) -> Option<Self> {
        match abbr.trim().to_ascii_lowercase().as_str() {
            "sh" => Some(Market::Shanghai),
            "sz" => Some(Market::Shenzhen),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct InstrumentFields {
    code: String,
    market: Market,
}

impl TryFrom<InstrumentFields> for Instrument {
    type Error = anyhow::Error;

    fn try_from(fields: InstrumentFields) -> Result<Self> {
        Instrument::new(&fields.code, fields.market)
    }
}

/// 证券标识
///
/// 以 (market, code) 作为唯一键，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "InstrumentFields")]
pub struct Instrument {
    code: String,
    market: Market,
}

impl Instrument {
    /// 创建证券标识，代码必须是 6 位数字
    pub fn new(code: &str, market: Market) -> Result<Self> {
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            bail!("无效的证券代码: {}（必须为 6 位数字）", code);
        }
        Ok(Self {
            code: code.to_string(),
            market,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn market(&self) -> Market {
        self.market
    }

    /// 东方财富接口使用的 secid，如 1.600519
    pub fn secid(&self) -> String {
        format!("{}.{}", self.market.secid_prefix(), self.code)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.secid())
    }
}

impl FromStr for Instrument {
    type Err = anyhow::Error;

    /// 解析 secid 形式的标识（如 1.600519 / 0.000001）
    fn from_str(s: &str) -> Result<Self> {
        let (prefix, code) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| anyhow!("无效的 secid: {}", s))?;
        let market = prefix
            .parse::<u64>()
            .ok()
            .and_then(Market::from_secid_prefix)
            .ok_or_else(|| anyhow!("未知市场编号: {}", prefix))?;
        Instrument::new(code, market)
    }
}

/// 实时行情快照
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Quote {
    /// 证券标识
    pub instrument: Instrument,
    /// 证券名称
    pub name: String,
    /// 当前价格
    pub current_price: f64,
    /// 涨跌额
    pub change: f64,
    /// 涨跌幅（百分比）
    pub change_percent: f64,
}

/// 当日分时收盘价序列
pub type TrendSeries = Vec<f64>;

/// 搜索候选（尚未加入自选）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResult {
    pub code: String,
    pub name: String,
    pub market: Market,
}
