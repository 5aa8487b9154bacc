pub mod auth;
pub mod tracing;

pub use self::auth::{require_bearer_token, ApiClaims, BearerAuthConfig, JwtValidator};
pub use self::tracing::{http_request_span, request_id_middleware, REQUEST_ID_HEADER};
