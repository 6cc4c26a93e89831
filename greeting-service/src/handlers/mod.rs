//! HTTP handlers for greeting-service.

pub mod accounts;
pub mod greetings;
pub mod health;

pub use health::{health_check, metrics, readiness_check};
