use crate::database::Repositories;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// `connected` or `unreachable`
    pub database: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(repos: web::Data<Repositories>) -> impl Responder {
    let database_ok = match repos.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("⚠️  Health check: database ping failed: {}", e);
            false
        }
    };

    let body = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        service: "task-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "unreachable" }.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    if database_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
