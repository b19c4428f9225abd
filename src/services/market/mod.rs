//! 行情数据源
//!
//! ## 数据来源
//! - 东方财富：批量实时行情、分时走势（需要设备指纹 Cookie）
//! - 腾讯证券：证券搜索联想
//!
//! 三个数据源都不向调用方抛错：失败时记录日志并返回空结果，
//! 由调用方决定保留旧数据

use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::{Instrument, Quote, SearchResult, TrendSeries};

pub mod common;
mod quote;
mod search;
mod trend;

pub use common::build_http_client;
pub use quote::QuoteClient;
pub use search::SearchClient;
pub use trend::TrendClient;

/// 批量行情数据源
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 一次请求获取全部证券的行情，失败或 0 条记录时返回空表
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> HashMap<Instrument, Quote>;
}

/// 分时走势数据源
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// 获取单只证券当日分时收盘价，失败时返回空序列
    async fn fetch_trend(&self, instrument: &Instrument) -> TrendSeries;
}

/// 证券搜索数据源
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// 最多返回 5 条候选，空查询不发请求
    async fn search(&self, query: &str) -> Vec<SearchResult>;
}
