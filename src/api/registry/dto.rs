use serde::{Deserialize, Serialize};

use crate::registry::ServiceInfo;

/// Response for a single registration or lookup
#[derive(Serialize)]
pub struct ServiceResponse {
    pub message: String,
    pub service: ServiceInfo,
}

/// Error details for a rejected registration
#[derive(Serialize)]
pub struct RegistrationError {
    pub id: String,
    pub code: u32,
    pub errors: Vec<String>,
}

/// Response for bulk registration
#[derive(Serialize)]
pub struct BulkRegisterResponse {
    pub message: String,
    pub registered: usize,
    pub errors: Vec<RegistrationError>,
}

/// Response for listing services
#[derive(Serialize)]
pub struct ServiceListResponse {
    pub count: usize,
    pub services: Vec<ServiceInfo>,
}

/// Query string of `GET /services`
#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub name: Option<String>,
}
