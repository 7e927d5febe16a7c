use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address.
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Allow `attempts` requests per `window_seconds` for each IP, with the whole allowance
/// available as a burst.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_millis((window_seconds.max(1) * 1000) / attempts.get() as u64)
        .max(Duration::from_millis(1));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Drop keys whose state has returned to a fresh allowance.
pub fn prune_idle_keys(limiter: &IpRateLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Prune `limiter` every `interval` for as long as the runtime lives.
pub fn spawn_pruning(limiter: IpRateLimiter, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            prune_idle_keys(&limiter);
            tracing::debug!(tracked_clients = limiter.len(), "Rate limiter pruned");
        }
    })
}

/// Limiter plus the rule for deciding which address a request is charged to.
///
/// Requests are charged to the socket peer. `x-forwarded-for` is only read when the peer
/// is one of `trusted_proxies`; the client is then the rightmost entry that is not itself
/// a trusted proxy.
#[derive(Clone)]
pub struct IpRateLimit {
    limiter: IpRateLimiter,
    trusted_proxies: Arc<[IpAddr]>,
}

impl IpRateLimit {
    pub fn new(limiter: IpRateLimiter, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            limiter,
            trusted_proxies: trusted_proxies.into(),
        }
    }

    pub fn limiter(&self) -> &IpRateLimiter {
        &self.limiter
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }

    fn client_ip(&self, request: &Request) -> Option<IpAddr> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())?;

        if !self.is_trusted(&peer) {
            return Some(peer);
        }

        let forwarded = request
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|s| s.trim().parse::<IpAddr>().ok())
            .collect::<Vec<_>>();

        Some(
            forwarded
                .into_iter()
                .rev()
                .find(|ip| !self.is_trusted(ip))
                .unwrap_or(peer),
        )
    }
}

/// Rejects with 429 once the caller's address exhausts its quota. Requests without a
/// socket peer share one bucket.
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = rate_limit.client_ip(&request).unwrap_or_else(|| {
        tracing::warn!("No peer address on request; charging the shared bucket");
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    });

    match rate_limit.limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(client_ip = %ip, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}
