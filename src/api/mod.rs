pub mod health;
pub mod registry;
pub mod response;
pub mod validation;
