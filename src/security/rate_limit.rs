//! Fixed-window rate limiting for public endpoints.
//!
//! One entry per client identifier holds the window start and the number of
//! admitted requests. The whole read-modify-write of an entry happens under
//! that key's shard lock, so concurrent requests from one client can never
//! both take the last slot.
//!
//! Windows open at the client's first request. Because windows are fixed, a
//! client can get up to twice the quota through in a short span straddling a
//! window boundary.

use arc_swap::ArcSwap;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::clock::{Clock, UnixSeconds};
use crate::config::RateLimitConfig;
use crate::error::GateError;
use crate::observability::metrics;

/// Quota per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub quota: u32,
    pub window_secs: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            quota: 5,
            window_secs: 3_600,
        }
    }
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            quota: config.quota,
            window_secs: config.window_secs,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    window_start: UnixSeconds,
    count: u32,
}

/// An admitted request and the client's standing in its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window closes.
    pub reset_after: u64,
}

impl Admission {
    fn unlimited() -> Self {
        Self {
            limit: u32::MAX,
            remaining: u32::MAX,
            reset_after: 0,
        }
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("ratelimit-reset", HeaderValue::from(self.reset_after));
    }
}

/// Per-client fixed-window counter table.
pub struct FixedWindowLimiter {
    entries: DashMap<String, WindowEntry>,
    policy: ArcSwap<RateLimitPolicy>,
}

impl FixedWindowLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        **self.policy.load()
    }

    /// Swap the policy. Open windows keep their start; the new quota and
    /// duration apply from the next check.
    pub fn reconfigure(&self, policy: RateLimitPolicy) {
        tracing::info!(
            enabled = policy.enabled,
            quota = policy.quota,
            window_secs = policy.window_secs,
            "Rate limit policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Count a request from `client` at `now`.
    ///
    /// Denied requests leave the counter untouched.
    pub fn check(&self, client: &str, now: UnixSeconds) -> Result<Admission, GateError> {
        let policy = self.policy();
        if !policy.enabled {
            return Ok(Admission::unlimited());
        }

        let mut entry = match self.entries.get_mut(client) {
            Some(entry) => entry,
            None => self.entries.entry(client.to_owned()).or_insert(WindowEntry {
                window_start: now,
                count: 0,
            }),
        };

        if now.saturating_sub(entry.window_start) >= policy.window_secs {
            entry.window_start = now;
            entry.count = 0;
        }

        let reset_after = entry
            .window_start
            .saturating_add(policy.window_secs)
            .saturating_sub(now);

        if entry.count >= policy.quota {
            return Err(GateError::RateLimited {
                limit: policy.quota,
                reset_after,
            });
        }

        entry.count += 1;
        Ok(Admission {
            limit: policy.quota,
            remaining: policy.quota - entry.count,
            reset_after,
        })
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self, now: UnixSeconds) -> usize {
        let window = self.policy().window_secs;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.window_start) < window);
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    /// Periodically sweep stale entries until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match clock.now() {
                            Ok(now) => {
                                let removed = self.sweep(now);
                                let remaining = self.tracked_clients();
                                metrics::record_rate_limit_clients(remaining);
                                if removed > 0 {
                                    tracing::debug!(removed, remaining, "Swept stale rate limit entries");
                                }
                            }
                            Err(e) => tracing::error!(error = %e, "Rate limit sweep skipped"),
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// State for [`rate_limit_middleware`].
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<FixedWindowLimiter>,
    pub clock: Arc<dyn Clock>,
    /// Key on the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
    /// Route label for logs and metrics.
    pub route: &'static str,
}

/// Derive the client identifier for a request.
pub fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the limiter on a route.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request, state.trust_forwarded_for);
    let now = match state.clock.now() {
        Ok(now) => now,
        Err(e) => return GateError::from(e).into_response(),
    };

    match state.limiter.check(&client, now) {
        Ok(admission) => {
            let mut response = next.run(request).await;
            if admission.limit != u32::MAX {
                admission.apply_headers(response.headers_mut());
            }
            response
        }
        Err(err) => {
            tracing::warn!(client = %client, route = state.route, "Rate limit exceeded");
            metrics::record_rate_limited(state.route);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    const HOUR: u64 = 3_600;

    fn limiter(quota: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitPolicy {
            enabled: true,
            quota,
            window_secs: HOUR,
        })
    }

    #[test]
    fn test_quota_within_window() {
        let limiter = limiter(5);
        for i in 0..5u32 {
            let admission = limiter.check("203.0.113.7", 1_000 + i as u64).unwrap();
            assert_eq!(admission.remaining, 4 - i);
        }
        let denied = limiter.check("203.0.113.7", 1_010).unwrap_err();
        assert!(matches!(denied, GateError::RateLimited { limit: 5, reset_after: 3_590 }));
    }

    #[test]
    fn test_denials_do_not_consume() {
        let limiter = limiter(2);
        limiter.check("c", 0).unwrap();
        limiter.check("c", 0).unwrap();
        for _ in 0..10 {
            assert!(limiter.check("c", 1).is_err());
        }
        assert_eq!(limiter.entries.get("c").unwrap().count, 2);
    }

    #[test]
    fn test_window_elapse_resets_counter() {
        let limiter = limiter(5);
        for _ in 0..5 {
            limiter.check("c", 0).unwrap();
        }
        assert!(limiter.check("c", HOUR - 1).is_err());

        let admission = limiter.check("c", HOUR).unwrap();
        assert_eq!(admission.remaining, 4);
        let entry = *limiter.entries.get("c").unwrap();
        assert_eq!(entry.window_start, HOUR);
        assert_eq!(entry.count, 1);
    }

    #[test]
    fn test_window_boundary_allows_double_burst() {
        let limiter = limiter(5);
        limiter.check("c", 0).unwrap();

        let mut admitted_near_boundary = 0;
        for _ in 0..5 {
            if limiter.check("c", HOUR - 1).is_ok() {
                admitted_near_boundary += 1;
            }
        }
        for _ in 0..5 {
            if limiter.check("c", HOUR).is_ok() {
                admitted_near_boundary += 1;
            }
        }
        // Nine admissions within two seconds under a quota of five.
        assert_eq!(admitted_near_boundary, 9);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("a", 0).is_ok());
        assert!(limiter.check("b", 0).is_ok());
        assert!(limiter.check("a", 0).is_err());
    }

    #[test]
    fn test_concurrent_admissions_are_exact() {
        for (threads, quota) in [(64usize, 5u32), (10, 20), (32, 32)] {
            let limiter = Arc::new(limiter(quota));
            let barrier = Arc::new(Barrier::new(threads));
            let admitted = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let limiter = limiter.clone();
                    let barrier = barrier.clone();
                    let admitted = admitted.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        if limiter.check("198.51.100.1", 500).is_ok() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(admitted.load(Ordering::SeqCst), threads.min(quota as usize));
        }
    }

    #[test]
    fn test_sweep_removes_only_stale_entries() {
        let limiter = limiter(5);
        limiter.check("old", 0).unwrap();
        limiter.check("fresh", HOUR).unwrap();

        assert_eq!(limiter.sweep(HOUR + 10), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.entries.contains_key("fresh"));
    }

    #[test]
    fn test_disabled_policy_admits_everything() {
        let limiter = FixedWindowLimiter::new(RateLimitPolicy {
            enabled: false,
            ..RateLimitPolicy::default()
        });
        for _ in 0..100 {
            assert!(limiter.check("c", 0).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_reconfigure_applies_new_quota() {
        let limiter = limiter(1);
        limiter.check("c", 0).unwrap();
        assert!(limiter.check("c", 1).is_err());

        limiter.reconfigure(RateLimitPolicy {
            enabled: true,
            quota: 3,
            window_secs: HOUR,
        });
        assert!(limiter.check("c", 2).is_ok());
        assert!(limiter.check("c", 3).is_ok());
        assert!(limiter.check("c", 4).is_err());
    }

    #[test]
    fn test_client_key_sources() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "192.0.2.44, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));

        assert_eq!(client_key(&request, false), "10.0.0.1");
        assert_eq!(client_key(&request, true), "192.0.2.44");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare, true), "unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let limiter = Arc::new(limiter(5));
        let clock = crate::clock::ManualClock::new(0);
        limiter.check("c", 0).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let handle = limiter
            .clone()
            .spawn_sweeper(Arc::new(clock.clone()), Duration::from_secs(60), rx);

        clock.set(2 * HOUR);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
