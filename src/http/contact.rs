//! Public contact form.
//!
//! Delivery (email, ticketing) lives behind [`ContactSink`]; this module
//! only validates and hands off.

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GateError;

const MAX_NAME: usize = 100;
const MAX_EMAIL: usize = 254;
const MAX_MESSAGE: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

impl ContactForm {
    /// Trim fields and check them; the first problem is reported.
    pub fn validate(self) -> Result<ContactForm, GateError> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_string();
        let message = self.message.trim().to_string();
        let subject = self
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if name.is_empty() || name.chars().count() > MAX_NAME {
            return Err(GateError::BadRequest(format!(
                "name is required and must be at most {MAX_NAME} characters"
            )));
        }
        if email.len() > MAX_EMAIL || !looks_like_email(&email) {
            return Err(GateError::BadRequest("a valid email address is required".into()));
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE {
            return Err(GateError::BadRequest(format!(
                "message is required and must be at most {MAX_MESSAGE} characters"
            )));
        }

        Ok(ContactForm {
            name,
            email,
            subject,
            message,
        })
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("contact delivery failed: {0}")]
pub struct SinkError(pub String);

impl From<SinkError> for GateError {
    fn from(e: SinkError) -> Self {
        GateError::Internal(e.to_string())
    }
}

/// Destination for accepted contact messages.
#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn deliver(&self, form: ContactForm) -> Result<(), SinkError>;
}

/// Logs accepted messages. Used when no delivery backend is wired in.
#[derive(Debug, Default)]
pub struct LoggingContactSink;

#[async_trait]
impl ContactSink for LoggingContactSink {
    async fn deliver(&self, form: ContactForm) -> Result<(), SinkError> {
        tracing::info!(
            from = %form.email,
            subject = form.subject.as_deref().unwrap_or("(none)"),
            length = form.message.len(),
            "Contact message received"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ContactAccepted {
    pub success: bool,
    pub message: &'static str,
}

/// `POST /api/contact`
pub async fn submit_contact(
    State(sink): State<Arc<dyn ContactSink>>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactAccepted>), GateError> {
    let Json(form) = payload.map_err(GateError::from)?;
    let form = form.validate()?;
    sink.deliver(form).await?;

    Ok((
        StatusCode::OK,
        Json(ContactAccepted {
            success: true,
            message: "Thank you for your message. We will get back to you soon.",
        }),
    ))
}
