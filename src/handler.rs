use crate::pipeline::PipelineStats;

use actix_web::{get, http, web, HttpResponse, Responder};
use std::sync::Arc;

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::build(http::StatusCode::OK).body("OK".to_owned())
}

/// Pipeline counters since start
///
/// ```text
/// curl localhost:8080/stats
/// ```
#[get("/stats")]
pub async fn stats(stats: web::Data<Arc<PipelineStats>>) -> impl Responder {
    HttpResponse::build(http::StatusCode::OK).json(stats.snapshot())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz).service(stats);
}
