use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Limited,
    Banned,
}

struct IpWindow {
    started: Instant,
    count: u32,
    strikes: u32,
    banned_until: Option<Instant>,
}

/// Fixed-window per-IP limiter. Requests beyond the per-window quota are
/// rejected; an address rejected `ban_strikes` times within one window is
/// banned for a full window.
pub struct RateLimiter {
    windows: HashMap<String, IpWindow>,
    max_per_window: u32,
    window: Duration,
    ban_strikes: u32,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration, ban_strikes: u32) -> Self {
        Self {
            windows: HashMap::new(),
            max_per_window,
            window,
            ban_strikes,
        }
    }

    pub fn check(&mut self, ip: &str, now: Instant) -> Decision {
        let entry = self.windows.entry(ip.to_string()).or_insert(IpWindow {
            started: now,
            count: 0,
            strikes: 0,
            banned_until: None,
        });

        if let Some(until) = entry.banned_until {
            if now < until {
                return Decision::Banned;
            }
            entry.banned_until = None;
            entry.strikes = 0;
        }

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
            entry.strikes = 0;
        }

        entry.count += 1;
        if entry.count <= self.max_per_window {
            return Decision::Allow;
        }

        entry.strikes += 1;
        if entry.strikes >= self.ban_strikes {
            entry.banned_until = Some(now + self.window);
            return Decision::Banned;
        }
        Decision::Limited
    }
}

/// Client address as the original deployment resolved it: first
/// `x-forwarded-for` hop, then `x-real-ip`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    addr.ip().to_string()
}

fn is_loopback(ip: &str) -> bool {
    ip == "127.0.0.1" || ip == "::1"
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), addr);
    if is_loopback(&ip) {
        return next.run(request).await;
    }

    let decision = state.limiter.lock().unwrap().check(&ip, Instant::now());
    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Limited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Rate limit exceeded" })),
        )
            .into_response(),
        Decision::Banned => {
            warn!("Banned client {} is still sending requests", ip);
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Banned" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(3, Duration::from_secs(60), 2)
    }

    #[test]
    fn allows_up_to_the_window_quota() {
        let mut limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(limiter.check("198.51.100.7", now), Decision::Allow);
        }
        assert_eq!(limiter.check("198.51.100.7", now), Decision::Limited);
    }

    #[test]
    fn repeat_offenders_get_banned_for_a_window() {
        let mut limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check("198.51.100.7", now);
        }
        assert_eq!(limiter.check("198.51.100.7", now), Decision::Limited);
        assert_eq!(limiter.check("198.51.100.7", now), Decision::Banned);

        // Still banned just before the window ends
        let later = now + Duration::from_secs(59);
        assert_eq!(limiter.check("198.51.100.7", later), Decision::Banned);

        // Ban lapses with the window
        let expired = now + Duration::from_secs(61);
        assert_eq!(limiter.check("198.51.100.7", expired), Decision::Allow);
    }

    #[test]
    fn quota_resets_each_window() {
        let mut limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check("198.51.100.7", now);
        }
        let next_window = now + Duration::from_secs(60);
        assert_eq!(limiter.check("198.51.100.7", next_window), Decision::Allow);
    }

    #[test]
    fn addresses_are_tracked_independently() {
        let mut limiter = limiter();
        let now = Instant::now();
        for _ in 0..4 {
            limiter.check("198.51.100.7", now);
        }
        assert_eq!(limiter.check("203.0.113.9", now), Decision::Allow);
    }

    #[test]
    fn client_ip_prefers_the_first_forwarded_hop() {
        let addr: SocketAddr = "192.0.2.1:9999".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, addr), "198.51.100.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.9".parse().unwrap());
        assert_eq!(client_ip(&headers, addr), "203.0.113.9");

        assert_eq!(client_ip(&HeaderMap::new(), addr), "192.0.2.1");
    }
}
