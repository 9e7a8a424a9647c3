pub mod dto;
pub mod handlers;

// Re-export commonly used types
pub use handlers::{discovery_config, registry_config, services_config};
