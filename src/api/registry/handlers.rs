use actix_web::{
    delete, get, post, put,
    web::{self, Data, Path, Query, ServiceConfig},
    HttpRequest, HttpResponse,
};
use actix_web_validator::Json;
use tracing::info;

use super::dto::{
    BulkRegisterResponse, RegistrationError, ServiceListResponse, ServiceQuery, ServiceResponse,
};
use crate::api::response::error_response;
use crate::registry::{HealthStatus, ServiceRegistration, ServiceRegistry};

#[post("")]
async fn register_service(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    registration: Json<ServiceRegistration>,
) -> HttpResponse {
    match registry.register(registration.into_inner()).await {
        Ok(service) => HttpResponse::Created().json(ServiceResponse {
            message: "Service registered successfully".to_string(),
            service,
        }),
        Err(err) => error_response(&req, &err),
    }
}

/// Entries are validated one by one, so a single bad entry does not reject the batch
#[post("/bulk")]
async fn bulk_register(
    registry: Data<ServiceRegistry>,
    registrations: web::Json<Vec<ServiceRegistration>>,
) -> HttpResponse {
    let (registered, failed) = registry.register_all(registrations.into_inner()).await;

    let errors: Vec<RegistrationError> = failed
        .into_iter()
        .map(|(id, err)| RegistrationError {
            id,
            code: err.code.as_u32(),
            errors: err
                .details
                .as_deref()
                .map(|d| d.split("; ").map(str::to_string).collect())
                .unwrap_or_else(|| vec![err.message.clone()]),
        })
        .collect();

    HttpResponse::Ok().json(BulkRegisterResponse {
        message: format!(
            "Bulk registration completed. {} registered, {} failed",
            registered.len(),
            errors.len()
        ),
        registered: registered.len(),
        errors,
    })
}

#[get("")]
async fn list_services(registry: Data<ServiceRegistry>, query: Query<ServiceQuery>) -> HttpResponse {
    let services = match query.name.as_deref() {
        Some(name) => registry.get_services_by_name(name).await,
        None => registry.list_services().await,
    };

    HttpResponse::Ok().json(ServiceListResponse {
        count: services.len(),
        services,
    })
}

#[get("/{id}")]
async fn get_service(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    id: Path<String>,
) -> HttpResponse {
    match registry.get_service(&id).await {
        Ok(service) => HttpResponse::Ok().json(service),
        Err(err) => error_response(&req, &err),
    }
}

#[delete("/{id}")]
async fn deregister_service(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    id: Path<String>,
) -> HttpResponse {
    match registry.deregister(&id).await {
        Ok(service) => HttpResponse::Ok().json(ServiceResponse {
            message: "Service deregistered successfully".to_string(),
            service,
        }),
        Err(err) => error_response(&req, &err),
    }
}

#[put("/{id}/health")]
async fn update_health(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    id: Path<String>,
    health: web::Json<HealthStatus>,
) -> HttpResponse {
    match registry.update_service_health(&id, health.into_inner()).await {
        Ok(service) => HttpResponse::Ok().json(service),
        Err(err) => error_response(&req, &err),
    }
}

#[put("/{id}/heartbeat")]
async fn heartbeat(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    id: Path<String>,
) -> HttpResponse {
    match registry.heartbeat(&id).await {
        Ok(service) => HttpResponse::Ok().json(service),
        Err(err) => error_response(&req, &err),
    }
}

#[get("/{name}")]
async fn select_service(
    req: HttpRequest,
    registry: Data<ServiceRegistry>,
    name: Path<String>,
) -> HttpResponse {
    match registry.select_service(&name).await {
        Ok(service) => {
            info!("Discovery: {} -> {} ({})", name, service.id, service.endpoint);
            HttpResponse::Ok().json(service)
        }
        Err(err) => error_response(&req, &err),
    }
}

#[get("/status")]
async fn registry_status(registry: Data<ServiceRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(registry.status().await)
}

pub fn services_config(config: &mut ServiceConfig) {
    config.service(
        web::scope("services")
            .service(register_service)
            .service(bulk_register)
            .service(list_services)
            .service(get_service)
            .service(deregister_service)
            .service(update_health)
            .service(heartbeat),
    );
}

pub fn discovery_config(config: &mut ServiceConfig) {
    config.service(web::scope("discovery").service(select_service));
}

pub fn registry_config(config: &mut ServiceConfig) {
    config.service(web::scope("registry").service(registry_status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation::{json_config, plain_json_config};
    use crate::registry::{RegistryConfig, SelectionPolicy};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn registry() -> Data<ServiceRegistry> {
        Data::new(
            ServiceRegistry::new(RegistryConfig {
                ttl: std::time::Duration::from_secs(60),
                selection_policy: SelectionPolicy::First,
            })
            .unwrap(),
        )
    }

    macro_rules! app {
        ($registry:expr) => {
            test::init_service(
                App::new()
                    .app_data($registry)
                    .app_data(json_config())
                    .app_data(plain_json_config())
                    .configure(services_config)
                    .configure(discovery_config)
                    .configure(registry_config),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn register_and_fetch() {
        let app = app!(registry());

        let req = test::TestRequest::post()
            .uri("/services")
            .set_json(json!({
                "id": "api-1",
                "name": "api",
                "version": "1.0.0",
                "endpoint": "localhost:8080",
                "tags": ["test"]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/services/api-1").to_request())
                .await;
        assert_eq!(body["name"], "api");
        assert_eq!(body["endpoint"], "localhost:8080");
    }

    #[actix_web::test]
    async fn invalid_registration_returns_field_errors() {
        let app = app!(registry());

        let req = test::TestRequest::post()
            .uri("/services")
            .set_json(json!({"id": "", "name": "api", "endpoint": "localhost:8080"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 5000);
        assert!(body["fields"]["id"]["errors"].is_array());
        assert_eq!(body["path"], "/services");
    }

    #[actix_web::test]
    async fn unknown_service_returns_not_found_body() {
        let app = app!(registry());

        let req = test::TestRequest::delete()
            .uri("/services/missing")
            .insert_header(("x-request-id", "req-1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 5001);
        assert_eq!(body["request_id"], "req-1");
        assert_eq!(body["method"], "DELETE");
    }

    #[actix_web::test]
    async fn discovery_prefers_healthy_instance() {
        let registry = registry();
        registry
            .register(ServiceRegistration::new("api-1", "api", "localhost:8080"))
            .await
            .unwrap();
        registry
            .register(ServiceRegistration::new("api-2", "api", "localhost:8081"))
            .await
            .unwrap();
        let app = app!(registry.clone());

        let resp = test::call_service(&app, test::TestRequest::get().uri("/discovery/api").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let req = test::TestRequest::put()
            .uri("/services/api-2/health")
            .set_json(json!({"status": "healthy", "message": "ok"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/discovery/api").to_request())
                .await;
        assert_eq!(body["id"], "api-2");
    }

    #[actix_web::test]
    async fn lists_by_name_and_reports_status() {
        let registry = registry();
        let app = app!(registry.clone());

        let req = test::TestRequest::post()
            .uri("/services/bulk")
            .set_json(json!([
                {"id": "a", "name": "api", "endpoint": "localhost:1"},
                {"id": "b", "name": "api", "endpoint": "localhost:2"},
                {"id": "c", "name": "db", "endpoint": "localhost:3"},
                {"id": "d", "name": "db", "endpoint": ""}
            ]))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["registered"], 3);
        assert_eq!(body["errors"][0]["id"], "d");

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/services?name=api").to_request(),
        )
        .await;
        assert_eq!(body["count"], 2);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/registry/status").to_request())
                .await;
        assert_eq!(body["total_services"], 3);
        assert_eq!(body["unknown_services"], 3);
        assert_eq!(body["services_by_name"]["db"], 1);
    }

    #[actix_web::test]
    async fn malformed_bulk_body_returns_error_response() {
        let app = app!(registry());

        let req = test::TestRequest::post()
            .uri("/services/bulk")
            .insert_header(("content-type", "application/json"))
            .insert_header(("x-request-id", "bulk-1"))
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 5000);
        assert_eq!(body["request_id"], "bulk-1");
        assert_eq!(body["path"], "/services/bulk");
        assert_eq!(body["method"], "POST");
    }

    #[actix_web::test]
    async fn unknown_health_state_returns_error_response() {
        let registry = registry();
        registry
            .register(ServiceRegistration::new("a", "api", "localhost:8080"))
            .await
            .unwrap();
        let app = app!(registry.clone());

        let req = test::TestRequest::put()
            .uri("/services/a/health")
            .set_json(json!({"status": "bogus"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 5000);
        assert_eq!(
            body["details"],
            "Invalid enum value. Check allowed values for this field"
        );
        assert_eq!(body["path"], "/services/a/health");
        assert_eq!(body["method"], "PUT");
        assert!(body["request_id"].is_string());
    }

    #[actix_web::test]
    async fn heartbeat_for_unknown_service_fails() {
        let app = app!(registry());

        let resp = test::call_service(
            &app,
            test::TestRequest::put().uri("/services/ghost/heartbeat").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
