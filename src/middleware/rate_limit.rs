//! Burst limiting middleware
//!
//! Protects the sign-in endpoints against brute force with an in-memory
//! token bucket per client IP. Generation requests are limited separately by
//! the persistent fixed-window limiter.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::BurstSettings;
use crate::utils::error::AppError;

/// Per-IP rate limiter using governor
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Upper bound on tracked addresses before cleanup trims the map
const MAX_TRACKED_IPS: usize = 10_000;

/// Thread-safe map of IP addresses to their rate limiters
#[derive(Clone)]
pub struct BurstLimitState {
    limiters: Arc<RwLock<HashMap<IpAddr, Arc<IpRateLimiter>>>>,
    settings: BurstSettings,
    clock: DefaultClock,
}

impl BurstLimitState {
    pub fn new(settings: BurstSettings) -> Self {
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            settings,
            clock: DefaultClock::default(),
        }
    }

    /// Get or create a rate limiter for the given IP address
    async fn get_limiter(&self, ip: IpAddr) -> Arc<IpRateLimiter> {
        {
            let limiters = self.limiters.read().await;
            if let Some(limiter) = limiters.get(&ip) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().await;
        if let Some(limiter) = limiters.get(&ip) {
            return limiter.clone();
        }

        let quota = Quota::per_second(
            NonZeroU32::new(self.settings.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(self.settings.burst_size).unwrap_or(NonZeroU32::MIN));

        let limiter = Arc::new(RateLimiter::direct(quota));
        limiters.insert(ip, limiter.clone());
        limiter
    }

    /// Take one token for `ip`; on refusal returns whole seconds to wait
    pub async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let limiter = self.get_limiter(ip).await;
        match limiter.check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                Err(secs.max(1))
            }
        }
    }

    /// Trim the map once it tracks too many addresses
    pub async fn cleanup(&self) {
        let mut limiters = self.limiters.write().await;
        let initial_count = limiters.len();

        if initial_count > MAX_TRACKED_IPS {
            let to_remove: Vec<_> = limiters.keys().take(initial_count / 2).cloned().collect();
            for ip in to_remove {
                limiters.remove(&ip);
            }
            debug!(
                "Burst limiter cleanup: {} -> {} entries",
                initial_count,
                limiters.len()
            );
        }
    }
}

/// Client address from the connection, when the server was started with
/// connect info
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Burst limiting middleware for Axum
pub async fn burst_limit_middleware(
    State(limits): State<BurstLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match limits.check(ip).await {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            warn!(ip = %ip, retry_after_secs, "Authentication burst limit exceeded");
            AppError::TooManyRequests { retry_after_secs }.into_response()
        }
    }
}

/// Spawn a background task to periodically clean up rate limiters
pub fn spawn_burst_limit_cleanup(state: BurstLimitState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            state.cleanup().await;
        }
    });
}
