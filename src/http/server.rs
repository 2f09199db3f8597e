//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the gates from configuration (session, limiter)
//! - Create the Axum router with the routes and middleware stack
//! - Serve plain or TLS listeners with graceful shutdown
//! - Apply hot-reloaded configuration and run background sweeps

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{InMemoryDirectory, OwnershipResolver, SessionGate, SessionSecret, SessionSettings};
use crate::clock::{Clock, SystemClock};
use crate::config::{resolve_secret, ConfigError, Environment, GateConfig};
use crate::http::contact::{ContactSink, LoggingContactSink};
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::http::response::{error_boundary, not_found};
use crate::http::routes;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::security::rate_limit::{FixedWindowLimiter, RateLimitPolicy};

/// External collaborators the gates consume.
pub struct Dependencies {
    pub resolver: Arc<dyn OwnershipResolver>,
    pub contacts: Arc<dyn ContactSink>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Dependencies {
    fn default() -> Self {
        Self {
            resolver: Arc::new(InMemoryDirectory::new()),
            contacts: Arc::new(LoggingContactSink),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionGate>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub resolver: Arc<dyn OwnershipResolver>,
    pub contacts: Arc<dyn ContactSink>,
    pub clock: Arc<dyn Clock>,
    pub environment: Environment,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(config: &GateConfig, secret: SessionSecret, deps: Dependencies) -> Self {
        Self {
            sessions: Arc::new(SessionGate::new(SessionSettings::new(
                &config.session,
                config.environment,
                secret,
            ))),
            limiter: Arc::new(FixedWindowLimiter::new(RateLimitPolicy::from(
                &config.contact_rate_limit,
            ))),
            resolver: deps.resolver,
            contacts: deps.contacts,
            clock: deps.clock,
            environment: config.environment,
            trust_forwarded_for: config.contact_rate_limit.trust_forwarded_for,
        }
    }

    /// Apply a reloaded config to the swappable gates.
    ///
    /// A config without a secret keeps the current one so a development
    /// reload does not sign everybody out.
    pub fn reload(&self, config: &GateConfig) {
        let secret = match config.session.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => SessionSecret::new(secret),
            None => self.sessions.current().secret.clone(),
        };
        self.sessions.reconfigure(SessionSettings::new(
            &config.session,
            config.environment,
            secret,
        ));
        self.limiter
            .reconfigure(RateLimitPolicy::from(&config.contact_rate_limit));

        if config.environment != self.environment
            || config.contact_rate_limit.trust_forwarded_for != self.trust_forwarded_for
        {
            tracing::warn!("Environment and forwarded-for trust changes take effect after restart");
        }
    }
}

/// HTTP server for the gated API.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    state: AppState,
    config_updates: Option<mpsc::UnboundedReceiver<GateConfig>>,
}

impl HttpServer {
    /// Resolve the signing secret and build the server.
    pub fn new(config: GateConfig, deps: Dependencies) -> Result<Self, ConfigError> {
        let secret = resolve_secret(&config)?;
        Ok(Self::with_secret(config, secret, deps))
    }

    pub fn with_secret(config: GateConfig, secret: SessionSecret, deps: Dependencies) -> Self {
        let state = AppState::new(&config, secret, deps);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
            config_updates: None,
        }
    }

    /// Receive validated configs from a [`crate::config::ConfigWatcher`].
    pub fn with_config_updates(mut self, updates: mpsc::UnboundedReceiver<GateConfig>) -> Self {
        self.config_updates = Some(updates);
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        routes::api_router(&state)
            .fallback(not_found)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(middleware::from_fn_with_state(
                config.environment,
                error_boundary,
            ))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<axum::body::Body>))
            .layer(set_request_id_layer())
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;

        let sweeper = self.state.limiter.clone().spawn_sweeper(
            self.state.clock.clone(),
            Duration::from_secs(self.config.contact_rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        );

        if let Some(updates) = self.config_updates {
            tokio::spawn(apply_updates(self.state.clone(), updates, shutdown.clone()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                tracing::info!(address = %addr, "HTTPS server starting");

                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                let waiter = shutdown.clone();
                let grace = Duration::from_secs(self.config.timeouts.request_secs);
                tokio::spawn(async move {
                    waiter.wait().await;
                    drain.graceful_shutdown(Some(grace));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                let waiter = shutdown.clone();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { waiter.wait().await })
                    .await?;
            }
        }

        shutdown.trigger();
        let _ = sweeper.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<GateConfig>,
    shutdown: Arc<Shutdown>,
) {
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => state.reload(&config),
                None => break,
            },
            _ = stop.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{Identity, SubjectId};
    use crate::clock::ManualClock;

    fn deps(clock: Arc<ManualClock>) -> Dependencies {
        Dependencies {
            clock,
            ..Dependencies::default()
        }
    }

    fn identity() -> Identity {
        Identity {
            subject_id: SubjectId::new("u1"),
            display_name: "ada".into(),
            email: "ada@example.com".into(),
            is_admin: false,
        }
    }

    #[test]
    fn test_reload_keeps_generated_secret() {
        let config = GateConfig::default();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let state = AppState::new(&config, SessionSecret::generate(), deps(clock));

        let credential = state.sessions.issue(&identity(), 1_700_000_000).unwrap();

        let mut reloaded = config.clone();
        reloaded.contact_rate_limit.quota = 2;
        reloaded.session.lifetime_secs = 600;
        state.reload(&reloaded);

        assert_eq!(state.limiter.policy().quota, 2);
        assert_eq!(state.sessions.current().lifetime_secs, 600);
        assert!(state.sessions.verify(Some(&credential), 1_700_000_001).is_ok());
    }

    #[test]
    fn test_reload_with_new_secret_invalidates_sessions() {
        let config = GateConfig::default();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let state = AppState::new(&config, SessionSecret::new("a".repeat(32)), deps(clock));
        let credential = state.sessions.issue(&identity(), 1_700_000_000).unwrap();

        let mut reloaded = config.clone();
        reloaded.session.secret = Some("b".repeat(32));
        state.reload(&reloaded);

        assert!(state.sessions.verify(Some(&credential), 1_700_000_001).is_err());
    }

    struct StalledSink;

    #[async_trait::async_trait]
    impl ContactSink for StalledSink {
        async fn deliver(&self, _form: crate::http::ContactForm) -> Result<(), crate::http::SinkError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_renders_json_error() {
        use axum::{body::Body, extract::ConnectInfo, http::Request};
        use tower::ServiceExt;

        let mut config = GateConfig::default();
        config.timeouts.request_secs = 1;
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let deps = Dependencies {
            contacts: Arc::new(StalledSink),
            ..deps(clock)
        };
        let server = HttpServer::with_secret(config, SessionSecret::new("a".repeat(32)), deps);

        let form = serde_json::json!({
            "name": "Ada",
            "email": "ada@example.com",
            "message": "hello"
        });
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header("content-type", "application/json")
            .body(Body::from(form.to_string()))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 408);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 408);
        assert_eq!(body["success"], false);
    }
}
