//! 自选行情同步服务
//! 
//! 维护 A 股自选列表，交易时段内定时同步实时行情和分时走势
//! 数据来源：东方财富（行情、分时）、腾讯证券（搜索联想）

mod config;     // 配置加载
mod handlers;   // HTTP 请求处理器
mod middleware; // 中间件
mod models;     // 数据模型定义
mod services;   // 业务逻辑服务

use actix_web::{web, App, HttpServer, middleware::Logger};
use env_logger::Env;
use std::io;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::middleware::ApiKeyMiddleware;
use crate::services::calendar;
use crate::services::debounce::SearchDebouncer;
use crate::services::market::{build_http_client, QuoteClient, SearchClient, TrendClient};
use crate::services::persistence::{load_or_default, JsonSettingsStore};
use crate::services::sync_engine::{EngineSources, SyncEngine};

/// 应用程序入口
/// 
/// 加载配置和已保存的自选，启动同步引擎后再启动 HTTP 服务器
#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load();

    // 初始化日志系统，RUST_LOG 优先于配置文件
    env_logger::init_from_env(Env::default().default_filter_or(config.log.level.as_str()));

    log::info!("启动自选行情同步服务");

    let client = build_http_client(&config.api)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("创建 HTTP 客户端失败: {:#}", e)))?;

    let store = Arc::new(JsonSettingsStore::new(&config.storage.settings_path));
    log::info!("设置文件: {}", store.path().display());
    let settings = load_or_default(store.as_ref(), config.refresh.initial_settings());

    let sources = EngineSources {
        quotes: Arc::new(QuoteClient::new(client.clone())),
        trends: Arc::new(TrendClient::new(client.clone())),
        settings: store,
        session: Arc::new(calendar::is_in_session_now),
    };
    let (engine, _engine_task) = SyncEngine::spawn(settings, config.refresh.engine_config(), sources);

    let engine = web::Data::new(engine);
    let debouncer = web::Data::new(Mutex::new(SearchDebouncer::new(
        Arc::new(SearchClient::new(client)),
        config.refresh.search_debounce(),
    )));
    let api_key = config.api.api_key.clone();

    log::info!("监听 {}", config.bind_addr());

    // 创建并启动 HTTP 服务器
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .app_data(debouncer.clone())
            .wrap(Logger::default())  // 添加请求日志中间件
            .wrap(ApiKeyMiddleware::new(api_key.clone()))  // API Key 认证
            .configure(handlers::config)  // 配置路由
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(config.bind_addr())?.run().await
}
