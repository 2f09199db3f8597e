//! Shared harness for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use sitegate::auth::claims::{Identity, SubjectId};
use sitegate::auth::{InMemoryDirectory, SessionSecret};
use sitegate::clock::{Clock, ManualClock};
use sitegate::config::{Environment, GateConfig};
use sitegate::http::{AppState, ContactForm, ContactSink, Dependencies, HttpServer, SinkError};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const START: u64 = 1_700_000_000;
pub const HOUR: u64 = 3_600;
pub const DAY: u64 = 86_400;

/// Collects delivered contact messages.
#[derive(Default)]
pub struct RecordingSink {
    pub received: Mutex<Vec<ContactForm>>,
}

#[async_trait]
impl ContactSink for RecordingSink {
    async fn deliver(&self, form: ContactForm) -> Result<(), SinkError> {
        self.received.lock().unwrap().push(form);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryDirectory>,
    pub contacts: Arc<RecordingSink>,
}

impl TestApp {
    pub fn credential_for(&self, identity: &Identity) -> String {
        let now = self.clock.now().unwrap();
        self.state.sessions.issue(identity, now).unwrap()
    }
}

pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.environment = Environment::Test;
    config.session.secret = Some(SECRET.to_string());
    config
}

pub fn app() -> TestApp {
    app_with(test_config())
}

pub fn app_with(config: GateConfig) -> TestApp {
    let (server, parts) = server_with(config);
    TestApp {
        router: server.router(),
        state: server.state().clone(),
        clock: parts.0,
        directory: parts.1,
        contacts: parts.2,
    }
}

type Parts = (Arc<ManualClock>, Arc<InMemoryDirectory>, Arc<RecordingSink>);

pub fn server_with(config: GateConfig) -> (HttpServer, Parts) {
    let clock = Arc::new(ManualClock::new(START));
    let directory = Arc::new(InMemoryDirectory::new());
    let contacts = Arc::new(RecordingSink::default());

    let deps = Dependencies {
        resolver: directory.clone(),
        contacts: contacts.clone(),
        clock: clock.clone(),
    };
    let server = HttpServer::with_secret(config, SessionSecret::new(SECRET), deps);
    (server, (clock, directory, contacts))
}

pub fn user(id: &str) -> Identity {
    Identity {
        subject_id: SubjectId::new(id),
        display_name: format!("user-{id}"),
        email: format!("{id}@example.com"),
        is_admin: false,
    }
}

pub fn admin(id: &str) -> Identity {
    Identity {
        is_admin: true,
        ..user(id)
    }
}

pub fn peer(ip: &str) -> SocketAddr {
    format!("{ip}:40000").parse().unwrap()
}

/// Request builder with the peer address the server would normally attach.
pub fn request(method: Method, uri: &str, credential: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    request_from(peer("10.0.0.1"), method, uri, credential, body)
}

pub fn request_from(
    from: SocketAddr,
    method: Method,
    uri: &str,
    credential: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(credential) = credential {
        builder = builder.header(header::COOKIE, format!("access_token={credential}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(from));
    request
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The `access_token` Set-Cookie header, if the response carries one.
pub fn session_set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("access_token="))
        .map(str::to_string)
}

/// Value part of a Set-Cookie header.
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

pub fn is_removal(set_cookie: &str) -> bool {
    cookie_value(set_cookie).is_empty() && set_cookie.contains("Max-Age=0")
}
