use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use tracing::warn;

use crate::registry::ServiceRegistry;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    services: Option<usize>,
}

/// Health check endpoint
///
/// Reports the process as healthy together with the number of live services.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(registry: web::Data<ServiceRegistry>) -> impl Responder {
    let status = registry.status().await;
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        registry: (if status.closed { "closed" } else { "open" }).to_string(),
        services: Some(status.total_services),
    })
}

/// Readiness check endpoint
///
/// Returns 503 once the registry stopped accepting registrations, so the
/// instance is taken out of rotation during shutdown.
#[get("/ready")]
async fn readiness_check(registry: web::Data<ServiceRegistry>) -> impl Responder {
    if registry.is_closed() {
        warn!("Readiness check failed: registry is closed");
        return HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "not_ready".to_string(),
            registry: "closed".to_string(),
            services: None,
        });
    }

    HttpResponse::Ok().json(HealthResponse {
        status: "ready".to_string(),
        registry: "open".to_string(),
        services: None,
    })
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not look at the registry.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        registry: "not_checked".to_string(),
        services: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
