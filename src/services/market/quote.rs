//! 批量实时行情
//!
//! 一次请求获取整个自选列表的行情，对接东方财富 ulist 接口

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;

use super::common::{json_f64, preview, EASTMONEY_QUOTE_API, EASTMONEY_REFERER, QUOTE_FIELDS};
use super::QuoteSource;
use crate::models::{Instrument, Market, Quote};

/// 东方财富批量行情客户端
#[derive(Clone)]
pub struct QuoteClient {
    client: Client,
    endpoint: String,
}

impl QuoteClient {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, EASTMONEY_QUOTE_API)
    }

    pub fn with_endpoint(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// 获取行情，传输或解析失败时返回错误
    pub async fn try_fetch_quotes(
        &self,
        instruments: &[Instrument],
    ) -> Result<HashMap<Instrument, Quote>> {
        let secids = instruments
            .iter()
            .map(Instrument::secid)
            .collect::<Vec<_>>()
            .join(",");
        log::debug!("📡 请求批量行情: {}", secids);

        let response = self
            .client
            .get(self.endpoint.as_str())
            .query(&[
                ("fltt", "2"),
                ("invt", "2"),
                ("fields", QUOTE_FIELDS),
                ("secids", secids.as_str()),
            ])
            .header("Referer", EASTMONEY_REFERER)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("获取行情失败: {}", response.status()));
        }

        let text = response.text().await?;
        log::trace!("📥 行情响应: {}", preview(&text, 300));
        parse_quote_response(&text)
    }
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn fetch_quotes(&self, instruments: &[Instrument]) -> HashMap<Instrument, Quote> {
        if instruments.is_empty() {
            return HashMap::new();
        }
        match self.try_fetch_quotes(instruments).await {
            Ok(quotes) => {
                if quotes.is_empty() {
                    log::warn!("行情接口返回 0 条记录（可能缺少设备指纹 Cookie）");
                }
                quotes
            }
            Err(e) => {
                log::warn!("获取行情失败: {}", e);
                HashMap::new()
            }
        }
    }
}

/// 解析 ulist 响应
///
/// 格式: {"data":{"total":1,"diff":[{"f2":1800.0,"f3":1.2,"f4":21.3,"f12":"600519","f13":1,"f14":"贵州茅台"}]}}
/// `data` 为 null 时视为 0 条记录
pub(crate) fn parse_quote_response(text: &str) -> Result<HashMap<Instrument, Quote>> {
    let json: Value = serde_json::from_str(text).map_err(|e| anyhow!("解析行情JSON失败: {}", e))?;

    let records: Vec<&Value> = match &json["data"]["diff"] {
        Value::Array(items) => items.iter().collect(),
        Value::Object(items) => items.values().collect(),
        _ => Vec::new(),
    };

    let mut quotes = HashMap::with_capacity(records.len());
    for record in records {
        let Some(code) = record["f12"].as_str() else {
            continue;
        };
        let Some(market) = record["f13"].as_u64().and_then(Market::from_secid_prefix) else {
            continue;
        };
        let Ok(instrument) = Instrument::new(code, market) else {
            continue;
        };

        quotes.insert(
            instrument.clone(),
            Quote {
                instrument,
                name: record["f14"].as_str().unwrap_or("").to_string(),
                current_price: json_f64(&record["f2"]),
                change: json_f64(&record["f4"]),
                change_percent: json_f64(&record["f3"]),
            },
        );
    }

    Ok(quotes)
}
