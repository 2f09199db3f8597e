//! Session cookie construction.
//!
//! Issuance and clearing share one attribute set; browsers only delete a
//! cookie when name, path and domain match the one they stored.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::Environment;

/// Attributes of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_secs: u64,
    pub path: String,
    pub domain: Option<String>,
}

impl CookiePolicy {
    /// Production allows cross-site use and requires TLS; elsewhere the cookie
    /// is same-site lax over plain HTTP.
    pub fn for_environment(
        environment: Environment,
        name: &str,
        max_age_secs: u64,
        domain: Option<String>,
    ) -> Self {
        let production = environment.is_production();
        Self {
            name: name.to_string(),
            secure: production,
            same_site: if production { SameSite::None } else { SameSite::Lax },
            max_age_secs,
            path: "/".to_string(),
            domain,
        }
    }

    /// Cookie carrying a freshly issued credential.
    pub fn session_cookie(&self, credential: String) -> Cookie<'static> {
        let max_age = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        self.build(credential, Duration::seconds(max_age))
    }

    /// Cookie instructing the browser to drop the credential.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        self.build(String::new(), Duration::ZERO)
    }

    /// Read the presented credential, if any. An empty value counts as absent.
    pub fn credential<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
        jar.get(&self.name)
            .map(|c| c.value())
            .filter(|v| !v.is_empty())
    }

    fn build(&self, value: String, max_age: Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path(self.path.clone())
            .max_age(max_age);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}
