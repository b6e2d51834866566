pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, AuthUser, Claims, JwtVerifier};
pub use metrics::track_http_metrics;
