pub mod health;
pub mod search;
pub mod watchlist;

use actix_web::{error, web, HttpResponse};

use crate::models::ApiResponse;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(json_config())
            .configure(health::config)
            .configure(watchlist::config)
            .configure(search::config)
    );
}

/// 请求体解析失败时返回统一格式的 400
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ApiResponse::<()>::error(err.to_string()));
        error::InternalError::from_response(err, response).into()
    })
}
