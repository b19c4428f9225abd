//! 证券搜索联想
//!
//! 对接腾讯证券 smartbox 接口，响应为一段 JS 变量赋值：
//! `v_hint="sh~600519~贵州茅台~gzmt~GP-A^sz~000858~...~GP-A"`
//!
//! 记录之间以 `^` 分隔，字段之间以 `~` 分隔：市场、代码、名称、拼音、类型

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::Client;
use url::Url;

use super::common::{preview, TENCENT_REFERER, TENCENT_SEARCH_API};
use super::SearchSource;
use crate::models::{Market, SearchResult};

/// 单次搜索最多返回的候选数量
pub const MAX_SEARCH_RESULTS: usize = 5;

#[derive(Clone)]
pub struct SearchClient {
    client: Client,
}

impl SearchClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn try_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = Url::parse_with_params(
            TENCENT_SEARCH_API,
            &[("v", "2"), ("q", query), ("t", "all"), ("c", "1")],
        )?;
        log::debug!("📡 搜索证券: {}", url);

        let response = self
            .client
            .get(url)
            .header("Referer", TENCENT_REFERER)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("搜索失败: {}", response.status()));
        }

        let text = response.text().await?;
        log::trace!("📥 搜索响应: {}", preview(&text, 300));
        parse_search_response(&text)
    }
}

#[async_trait]
impl SearchSource for SearchClient {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        self.try_search(query).await.unwrap_or_else(|e| {
            log::warn!("搜索 {} 失败: {}", query, e);
            Vec::new()
        })
    }
}

/// 还原 `\uXXXX` 形式的 Unicode 转义
pub(crate) fn unescape_unicode(raw: &str) -> Result<String> {
    let re = Regex::new(r"\\u([0-9a-fA-F]{4})")?;
    Ok(re
        .replace_all(raw, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned())
}

/// 解析搜索响应，只保留沪深两市的股票（GP）和指数（ZS）
pub(crate) fn parse_search_response(text: &str) -> Result<Vec<SearchResult>> {
    let decoded = unescape_unicode(text)?;

    let payload_re = Regex::new(r#"v_hint\s*=\s*"([^"]*)""#)?;
    let Some(payload) = payload_re.captures(&decoded).and_then(|c| c.get(1)) else {
        return Ok(Vec::new());
    };

    let record_re = Regex::new(r"^(sh|sz)~(\d{6})~([^~]*)~([^~]*)~([^~]*)")?;

    Ok(payload
        .as_str()
        .split('^')
        .filter_map(|record| {
            let caps = record_re.captures(record.trim())?;
            let kind = &caps[5];
            if !(kind.starts_with("GP") || kind.starts_with("ZS")) {
                return None;
            }
            Some(SearchResult {
                code: caps[2].to_string(),
                name: caps[3].to_string(),
                market: Market::from_abbr(&caps[1])?,
            })
        })
        .take(MAX_SEARCH_RESULTS)
        .collect())
}
