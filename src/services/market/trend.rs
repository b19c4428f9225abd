//! 分时走势

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::common::{preview, EASTMONEY_REFERER, EASTMONEY_TREND_API, TREND_FIELDS};
use super::TrendSource;
use crate::models::{Instrument, TrendSeries};

/// 东方财富分时走势客户端，每次请求一只证券
#[derive(Clone)]
pub struct TrendClient {
    client: Client,
    endpoint: String,
}

impl TrendClient {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, EASTMONEY_TREND_API)
    }

    pub fn with_endpoint(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub async fn try_fetch_trend(&self, instrument: &Instrument) -> Result<TrendSeries> {
        let secid = instrument.secid();

        let response = self
            .client
            .get(self.endpoint.as_str())
            .query(&[
                ("secid", secid.as_str()),
                ("fields1", "f1,f2,f3,f4,f5,f6"),
                ("fields2", TREND_FIELDS),
                ("ndays", "1"),
                ("iscr", "0"),
            ])
            .header("Referer", EASTMONEY_REFERER)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("获取分时数据失败 {}: {}", secid, response.status()));
        }

        let text = response.text().await?;
        log::trace!("📥 分时响应 {}: {}", secid, preview(&text, 200));
        parse_trend_response(&text)
    }
}

#[async_trait]
impl TrendSource for TrendClient {
    async fn fetch_trend(&self, instrument: &Instrument) -> TrendSeries {
        self.try_fetch_trend(instrument).await.unwrap_or_else(|e| {
            log::warn!("获取 {} 分时数据失败: {}", instrument, e);
            Vec::new()
        })
    }
}

/// 解析分时响应，只保留每条记录第 3 列的收盘价，丢弃非正数的占位点
///
/// 格式: {"data":{"trends":["2024-01-08 09:30,1800.00,1801.00,1802.00,1799.00,100,180000.00,1800.50"]}}
pub(crate) fn parse_trend_response(text: &str) -> Result<TrendSeries> {
    let json: Value = serde_json::from_str(text).map_err(|e| anyhow!("解析分时JSON失败: {}", e))?;

    let Some(trends) = json["data"]["trends"].as_array() else {
        return Ok(Vec::new());
    };

    Ok(trends
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|sample| sample.split(',').nth(2))
        .filter_map(|close| close.trim().parse::<f64>().ok())
        .filter(|close| *close > 0.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trend_response() {
        let body = r#"{"data":{"code":"600519","trends":[
            "2024-01-08 09:30,1800.00,1801.50,1802.00,1799.00,100,180000.00,1800.50",
            "2024-01-08 09:31,1801.50,1803.00,1803.00,1801.00,80,144000.00,1801.20",
            "2024-01-08 09:32,0.00,0.00,0.00,0.00,0,0.00,0.00",
            "2024-01-08 09:33,1803.00,-,1803.00,1801.00,80,144000.00,1801.20",
            "bad"
        ]}}"#;
        let series = parse_trend_response(body).unwrap();
        assert_eq!(series, vec![1801.50, 1803.00]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_empty_series() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let trends = TrendClient::with_endpoint(client, "http://127.0.0.1:9/trends2/get");
        let instrument: Instrument = "1.600519".parse().unwrap();

        assert!(trends.try_fetch_trend(&instrument).await.is_err());
        assert!(trends.fetch_trend(&instrument).await.is_empty());
    }

    #[test]
    fn test_parse_trend_empty() {
        assert!(parse_trend_response(r#"{"data":null}"#).unwrap().is_empty());
        assert!(parse_trend_response(r#"{"data":{"trends":[]}}"#).unwrap().is_empty());
        assert!(parse_trend_response("").is_err());
    }
}
