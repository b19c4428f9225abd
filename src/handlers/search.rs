use actix_web::{web, HttpResponse, Result};
use std::sync::Mutex;

use crate::models::{ApiResponse, SearchQueryRequest, SearchSnapshot};
use crate::services::debounce::SearchDebouncer;

/// 更新搜索输入，结果在防抖结束后通过 GET /search 获取
pub async fn update_query(
    debouncer: web::Data<Mutex<SearchDebouncer>>,
    body: web::Json<SearchQueryRequest>,
) -> Result<HttpResponse> {
    let query = body.into_inner().query;

    match debouncer.lock() {
        Ok(mut debouncer) => {
            debouncer.on_query_change(&query);
            Ok(HttpResponse::Accepted().json(ApiResponse::success(query)))
        }
        Err(e) => {
            let response = ApiResponse::<String>::error(format!("搜索状态不可用: {}", e));
            Ok(HttpResponse::InternalServerError().json(response))
        }
    }
}

pub async fn latest_results(debouncer: web::Data<Mutex<SearchDebouncer>>) -> Result<HttpResponse> {
    match debouncer.lock() {
        Ok(debouncer) => Ok(HttpResponse::Ok().json(ApiResponse::success(debouncer.snapshot()))),
        Err(e) => {
            let response = ApiResponse::<SearchSnapshot>::error(format!("搜索状态不可用: {}", e));
            Ok(HttpResponse::InternalServerError().json(response))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/search")
            .route(web::put().to(update_query))
            .route(web::get().to(latest_results))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, SearchResult};
    use crate::services::market::SearchSource;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedSearch;

    #[async_trait]
    impl SearchSource for FixedSearch {
        async fn search(&self, query: &str) -> Vec<SearchResult> {
            vec![SearchResult {
                code: "600519".to_string(),
                name: format!("贵州茅台 {}", query),
                market: Market::Shanghai,
            }]
        }
    }

    #[actix_web::test]
    async fn test_query_published_after_debounce() {
        let debouncer = SearchDebouncer::new(Arc::new(FixedSearch), Duration::from_millis(20));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Mutex::new(debouncer)))
                .configure(crate::handlers::config),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/v1/search")
            .set_json(json!({"query": "茅台"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let req = test::TestRequest::get().uri("/api/v1/search").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["results"].as_array().unwrap().len(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let req = test::TestRequest::get().uri("/api/v1/search").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["query"], "茅台");
        assert_eq!(body["data"]["results"][0]["code"], "600519");
    }
}
