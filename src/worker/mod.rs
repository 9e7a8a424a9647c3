pub mod expiry;
pub mod health_probe;

pub use expiry::ExpirySweeper;
pub use health_probe::HealthProber;
