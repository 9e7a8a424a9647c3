pub mod models;
pub mod policy;
pub mod service;

// Re-export commonly used types
pub use models::{HealthState, HealthStatus, ServiceInfo, ServiceRegistration};
pub use policy::SelectionPolicy;
pub use service::{RegistryConfig, RegistryStatus, ServiceRegistry};
