use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::errors::AppError;
use crate::logging::{MaskedIp, SecurityEvent};

const SWEEP_THRESHOLD: usize = 4096;

/// Fixed-window request counter keyed by client IP. Clones share counters,
/// so one limiter guards one route no matter how often the router is cloned.
#[derive(Clone)]
pub struct RateLimiterState {
    limit: u32,
    window: Duration,
    windows: Arc<DashMap<IpAddr, Window>>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

impl RateLimiterState {
    /// `limit` requests per `window`; a zero limit is treated as one.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Records a request from `ip` at `now`. When the window is used up the
    /// error holds the time left until it reopens.
    fn admit(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.windows.len() >= SWEEP_THRESHOLD {
            self.evict_expired(now);
        }

        let mut window = self.windows.entry(ip).or_insert(Window { opened: now, used: 0 });

        let age = now.saturating_duration_since(window.opened);
        if age >= self.window {
            *window = Window { opened: now, used: 0 };
        } else if window.used >= self.limit {
            return Err(self.window - age);
        }

        window.used += 1;
        Ok(())
    }

    /// Drops windows that have closed; their clients start fresh anyway.
    fn evict_expired(&self, now: Instant) {
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.opened) < self.window);
    }
}

pub async fn enforce_rate_limit(
    State(limiter): State<RateLimiterState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers(), peer.ip());

    if let Err(wait) = limiter.admit(ip, Instant::now()) {
        crate::security_event!(
            SecurityEvent::RateLimitExceeded,
            client_ip = %MaskedIp(ip),
            path = %request.uri().path(),
            retry_after_secs = wait.as_secs(),
            "Too many requests"
        );
        return Err(AppError::RateLimitExceeded {
            retry_after: Some(wait),
        });
    }

    Ok(next.run(request).await)
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let raw = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For lists the originating client first.
    raw.split(',').next()?.trim().parse().ok()
}

/// Prefers proxy headers over the socket peer address.
fn client_ip(headers: &HeaderMap, peer: IpAddr) -> IpAddr {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .unwrap_or(peer)
}
