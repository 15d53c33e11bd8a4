use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;

pub type IpRateLimiter = Arc<FixedWindowLimiter>;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset: Duration },
    Limited { reset: Duration },
}

/// Counts requests per client IP in fixed windows. A client's window starts
/// with its first request and is replaced once it has fully elapsed.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    trust_proxy: bool,
    windows: DashMap<IpAddr, Window>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        FixedWindowLimiter {
            max_requests: config.max_requests.max(1),
            window: config.window,
            trust_proxy: config.trust_proxy,
            windows: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut window = self.windows.entry(ip).or_insert(Window { started: now, hits: 0 });

        if now.saturating_duration_since(window.started) >= self.window {
            *window = Window { started: now, hits: 0 };
        }

        window.hits = window.hits.saturating_add(1);
        let reset = self
            .window
            .saturating_sub(now.saturating_duration_since(window.started));

        if window.hits > self.max_requests {
            Decision::Limited { reset }
        } else {
            Decision::Allowed {
                remaining: self.max_requests - window.hits,
                reset,
            }
        }
    }

    /// Drops windows that have fully elapsed.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn rejection_message(&self) -> String {
        let secs = self.window.as_secs();
        let span = if secs >= 60 && secs % 60 == 0 {
            plural(secs / 60, "minute")
        } else {
            plural(secs, "second")
        };
        format!("Too many requests from this IP, please try again after {}", span)
    }

    /// Client address used for limiting and logging. `X-Forwarded-For` is
    /// honoured only when the limiter trusts a proxy.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        if self.trust_proxy {
            if let Some(ip) = forwarded_ip(headers) {
                return Some(ip);
            }
        }
        peer.map(|addr| addr.ip())
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn reset_secs(reset: Duration) -> u64 {
    let secs = reset.as_secs();
    if reset.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn insert_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    headers.insert(HeaderName::from_static("ratelimit-limit"), HeaderValue::from(limit));
    headers.insert(HeaderName::from_static("ratelimit-remaining"), HeaderValue::from(remaining));
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(reset_secs(reset)),
    );
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    let ip = match limiter.client_ip(request.headers(), peer) {
        Some(ip) => ip,
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            return next.run(request).await;
        }
    };

    match limiter.check(ip) {
        Decision::Allowed { remaining, reset } => {
            let mut response = next.run(request).await;
            insert_headers(response.headers_mut(), limiter.max_requests(), remaining, reset);
            response
        }
        Decision::Limited { reset } => {
            tracing::warn!(%ip, "Rate limit exceeded");
            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, limiter.rejection_message()).into_response();
            let headers = response.headers_mut();
            insert_headers(headers, limiter.max_requests(), 0, reset);
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(reset_secs(reset)),
            );
            response
        }
    }
}
