pub mod error_responder;
pub mod rate_limit;
pub mod security_headers;

pub use error_responder::{error_responder, handle_panic};
pub use rate_limit::{ip_rate_limit_middleware, FixedWindowLimiter, IpRateLimiter};
pub use security_headers::security_headers_middleware;
