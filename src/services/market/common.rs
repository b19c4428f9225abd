//! 公共常量和辅助函数

use anyhow::Result;
use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::config::ApiConfig;

// ==================== 东方财富 API 常量 ====================

/// 东方财富批量行情 API
pub const EASTMONEY_QUOTE_API: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";
/// 东方财富分时走势 API
pub const EASTMONEY_TREND_API: &str = "https://push2his.eastmoney.com/api/qt/stock/trends2/get";
/// 批量行情字段：最新价、涨跌幅、涨跌额、代码、市场、名称
pub const QUOTE_FIELDS: &str = "f2,f3,f4,f12,f13,f14";
/// 分时走势字段，f53 为收盘价（每条记录的第 3 列）
pub const TREND_FIELDS: &str = "f51,f52,f53,f54,f55,f56,f57,f58";
pub const EASTMONEY_REFERER: &str = "https://quote.eastmoney.com/";
/// 设备指纹 Cookie 名称，缺失时接口返回空数据而不是错误
pub const FINGERPRINT_COOKIE: &str = "qgqp_b_id";
const FINGERPRINT_COOKIE_URL: &str = "https://eastmoney.com/";

// ==================== 腾讯证券 API 常量 ====================

/// 腾讯证券搜索联想 API
pub const TENCENT_SEARCH_API: &str = "https://smartbox.gtimg.cn/s3/";
pub const TENCENT_REFERER: &str = "https://gu.qq.com/";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 生成 32 位十六进制设备指纹
pub fn generate_fingerprint() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 构建共享 HTTP 客户端
///
/// 东方财富域名下的请求自动带上设备指纹 Cookie
pub fn build_http_client(config: &ApiConfig) -> Result<Client> {
    let fingerprint = generate_fingerprint();
    let jar = Arc::new(Jar::default());
    let cookie_url: Url = FINGERPRINT_COOKIE_URL.parse()?;
    jar.add_cookie_str(
        &format!("{}={}; Domain=.eastmoney.com; Path=/", FINGERPRINT_COOKIE, fingerprint),
        &cookie_url,
    );
    log::debug!("生成设备指纹: {}", fingerprint);

    let client = Client::builder()
        .cookie_provider(jar)
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?;
    Ok(client)
}

/// 读取数值字段，停牌等情况下接口会返回 "-"，按 0 处理
pub fn json_f64(value: &serde_json::Value) -> f64 {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(0.0)
}

/// 截取响应预览，用于日志
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
