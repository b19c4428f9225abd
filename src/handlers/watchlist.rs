use actix_web::{web, HttpResponse, Result};

use crate::models::{
    ApiResponse, Instrument, RefreshSettings, RefreshSettingsRequest, SortMode, SortModeRequest,
    WatchlistView,
};
use crate::services::sync_engine::EngineHandle;

fn engine_error<T: serde::Serialize>(e: anyhow::Error) -> HttpResponse {
    log::error!("同步引擎请求失败: {:#}", e);
    HttpResponse::InternalServerError().json(ApiResponse::<T>::error(e.to_string()))
}

pub async fn get_watchlist(engine: web::Data<EngineHandle>) -> Result<HttpResponse> {
    match engine.snapshot().await {
        Ok(view) => Ok(HttpResponse::Ok().json(ApiResponse::success(view))),
        Err(e) => Ok(engine_error::<WatchlistView>(e)),
    }
}

pub async fn add_instrument(
    engine: web::Data<EngineHandle>,
    body: web::Json<Instrument>,
) -> Result<HttpResponse> {
    let instrument = body.into_inner();

    match engine.add(instrument.clone()).await {
        Ok(true) => Ok(HttpResponse::Ok().json(ApiResponse::success(instrument))),
        Ok(false) => Ok(HttpResponse::Ok().json(ApiResponse::with_message(instrument, "已在自选中"))),
        Err(e) => Ok(engine_error::<Instrument>(e)),
    }
}

pub async fn remove_instrument(
    engine: web::Data<EngineHandle>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let instrument: Instrument = match path.into_inner().parse() {
        Ok(instrument) => instrument,
        Err(e) => {
            let response = ApiResponse::<Instrument>::error(format!("{:#}", e));
            return Ok(HttpResponse::BadRequest().json(response));
        }
    };

    match engine.remove(instrument.clone()).await {
        Ok(true) => Ok(HttpResponse::Ok().json(ApiResponse::success(instrument))),
        Ok(false) => Ok(HttpResponse::Ok().json(ApiResponse::with_message(instrument, "不在自选中"))),
        Err(e) => Ok(engine_error::<Instrument>(e)),
    }
}

pub async fn reorder(
    engine: web::Data<EngineHandle>,
    body: web::Json<Vec<Instrument>>,
) -> Result<HttpResponse> {
    match engine.reorder(body.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success(SortMode::None))),
        Err(e) => {
            let response = ApiResponse::<SortMode>::error(format!("{:#}", e));
            Ok(HttpResponse::BadRequest().json(response))
        }
    }
}

pub async fn cycle_sort(engine: web::Data<EngineHandle>) -> Result<HttpResponse> {
    match engine.cycle_sort_mode().await {
        Ok(mode) => Ok(HttpResponse::Ok().json(ApiResponse::success(mode))),
        Err(e) => Ok(engine_error::<SortMode>(e)),
    }
}

pub async fn set_sort(
    engine: web::Data<EngineHandle>,
    body: web::Json<SortModeRequest>,
) -> Result<HttpResponse> {
    let mode = body.into_inner().mode;
    match engine.set_sort_mode(mode).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success(mode))),
        Err(e) => Ok(engine_error::<SortMode>(e)),
    }
}

pub async fn update_refresh(
    engine: web::Data<EngineHandle>,
    body: web::Json<RefreshSettingsRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    match engine.update_refresh(request.interval_secs, request.auto_refresh).await {
        Ok(refresh) => Ok(HttpResponse::Ok().json(ApiResponse::success(refresh))),
        Err(e) => Ok(engine_error::<RefreshSettings>(e)),
    }
}

pub async fn refresh_now(engine: web::Data<EngineHandle>) -> Result<HttpResponse> {
    match engine.refresh_now().await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success("refresh scheduled"))),
        Err(e) => Ok(engine_error::<&str>(e)),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/watchlist")
            .route("", web::get().to(get_watchlist))
            .route("", web::post().to(add_instrument))
            .route("/order", web::put().to(reorder))
            .route("/sort/cycle", web::post().to(cycle_sort))
            .route("/sort", web::put().to(set_sort))
            .route("/{secid}", web::delete().to(remove_instrument))
    )
    .route("/settings/refresh", web::put().to(update_refresh))
    .route("/refresh", web::post().to(refresh_now));
}
