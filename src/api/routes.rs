use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::Serialize;
use time::OffsetDateTime;

use crate::api::AppState;
use crate::storage::{history_stats as merged_stats, with_store};

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
}

pub async fn get_sensor(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.live.snapshot())
}

pub async fn load_history(state: web::Data<AppState>) -> impl Responder {
    let series = state.store.lock().await.series();
    HttpResponse::Ok().json(series)
}

/// Clear the retained series together with the open averaging window
pub async fn clear_history(state: web::Data<AppState>) -> impl Responder {
    let mut buffer = state.buffer.lock().await;
    buffer.clear();

    match with_store(&state.store, |store| store.clear()).await.and_then(|cleared| cleared) {
        Ok(()) => HttpResponse::Ok().json(StatusResponse {
            status: "success",
            message: "Historical data cleared".to_string(),
        }),
        Err(e) => {
            error!("Error clearing historical data: {}", e);
            HttpResponse::InternalServerError().json(StatusResponse {
                status: "error",
                message: e.to_string(),
            })
        }
    }
}

pub async fn history_stats(state: web::Data<AppState>) -> impl Responder {
    let now = OffsetDateTime::now_utc().to_offset(state.utc_offset);
    let buffer = state.buffer.lock().await;
    let store = state.store.lock().await;
    HttpResponse::Ok().json(merged_stats(&store, &buffer, now))
}
