//! medai-service: AI tutoring, per-user quotas and cached study content.
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
