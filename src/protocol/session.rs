// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authenticated cloud session.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ParseError, ProtocolError, Result};
use crate::event::{Account, EventBus, SessionEvent};

use super::ResolverCache;

/// Header carrying the session token on every authenticated request.
pub const CONTEXT_KEY_HEADER: &str = "X-MitsContextKey";

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Token sent with every request.
    pub context_key: String,
    /// Account holder name.
    pub account_name: String,
    /// Account country.
    pub country_name: String,
}

impl Session {
    /// The account this session belongs to.
    #[must_use]
    pub fn account(&self) -> Account {
        Account {
            name: self.account_name.clone(),
            country: self.country_name.clone(),
        }
    }
}

/// Configuration of the cloud connection.
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::protocol::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::default()
///     .with_base_url("http://127.0.0.1:8080")
///     .with_retry_delay(Duration::from_millis(10));
///
/// assert_eq!(config.url("User/ListDevices"), "http://127.0.0.1:8080/User/ListDevices");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    base_url: String,
    timeout: Duration,
    retry_delay: Duration,
    app_version: String,
}

impl SessionConfig {
    /// Production endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://app.melcloud.com/Mitsubishi.Wifi.Client";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default delay between login attempts.
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
    /// Client version announced at login.
    pub const DEFAULT_APP_VERSION: &'static str = "1.9.3.0";

    /// Sets the service base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the delay between login attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the client version announced at login.
    #[must_use]
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the delay between login attempts.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Builds the absolute URL of an endpoint path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            app_version: Self::DEFAULT_APP_VERSION.to_string(),
        }
    }
}

/// An authenticated request to the cloud.
#[derive(Debug, Clone)]
pub struct CloudRequest {
    method: Method,
    path: String,
    body: Option<Value>,
}

impl CloudRequest {
    /// Creates a `GET` request for an endpoint path, query included.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// Creates a `POST` request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Returns the endpoint path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Subset of the login answer we use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginResponse {
    #[serde(default)]
    error_id: Option<i64>,
    #[serde(default)]
    login_data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginData {
    context_key: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country_name: String,
}

/// Owns the cloud session and issues authenticated requests.
///
/// Login is retried at a fixed delay until it succeeds or
/// [`shutdown`](Self::shutdown) is called. Every attempt is reported on the
/// [`SessionEvent`] bus.
///
/// # Examples
///
/// ```no_run
/// use melcloud_mqtt::protocol::{CloudRequest, SessionConfig, SessionManager};
///
/// # async fn example() -> melcloud_mqtt::Result<()> {
/// let session = SessionManager::new(SessionConfig::default())?;
/// session.login("user@example.com", "secret").await?;
///
/// let locations = session.request(CloudRequest::get("User/ListDevices")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionManager {
    client: Client,
    config: SessionConfig,
    session: RwLock<Option<Session>>,
    events: EventBus<SessionEvent>,
    shutdown: CancellationToken,
}

impl SessionManager {
    /// Creates a manager whose HTTP client resolves through the system DNS.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_resolver(config, ResolverCache::system())
    }

    /// Creates a manager whose HTTP client resolves through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_resolver(config: SessionConfig, resolver: ResolverCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .dns_resolver(Arc::new(resolver))
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            client,
            config,
            session: RwLock::new(None),
            events: EventBus::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Returns the current session, if logged in.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Returns a token cancelled on [`shutdown`](Self::shutdown).
    ///
    /// Poll loops derive child tokens from it.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the login loop and every task watching the shutdown token.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Logs in, retrying until the service accepts the credentials.
    ///
    /// A transport failure or a rejection publishes
    /// [`SessionEvent::LoginFailed`] and is retried after the configured
    /// delay, without an attempt cap. On success the session replaces any
    /// previous one and [`SessionEvent::LoggedIn`] is published.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if [`shutdown`](Self::shutdown) is called
    /// before a login succeeds.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let outcome = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(Error::Shutdown),
                outcome = self.try_login(username, password) => outcome,
            };

            match outcome {
                Ok(session) => {
                    tracing::info!(
                        account = %session.account_name,
                        attempt,
                        "Logged in to cloud"
                    );
                    *self.session.write() = Some(session.clone());
                    self.events.publish(SessionEvent::LoggedIn {
                        account: session.account(),
                    });
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Login failed, retrying");
                    self.events.publish(SessionEvent::LoginFailed {
                        attempt,
                        message: e.to_string(),
                    });
                }
            }

            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(Error::Shutdown),
                () = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }

    /// One login attempt.
    async fn try_login(&self, username: &str, password: &str) -> Result<Session> {
        let form = [
            ("AppVersion", self.config.app_version.as_str()),
            ("CaptchaChallenge", ""),
            ("CaptchaResponse", ""),
            ("Email", username),
            ("Language", "0"),
            ("Password", password),
            ("Persist", "true"),
        ];

        let response = self
            .client
            .post(self.config.url("Login/ClientLogin"))
            .form(&form)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        if response.status() != StatusCode::OK {
            tracing::debug!(status = %response.status(), "Login rejected");
            return Err(ProtocolError::AuthenticationFailed.into());
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(ProtocolError::Http)?;

        let Some(data) = body.login_data else {
            tracing::debug!(error_id = ?body.error_id, "Login answered without session data");
            return Err(ProtocolError::AuthenticationFailed.into());
        };

        Ok(Session {
            context_key: data.context_key,
            account_name: data.name,
            country_name: data.country_name,
        })
    }

    /// Sends an authenticated request and returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// - [`Error::NotLoggedIn`] before the first successful login
    /// - [`ProtocolError::ConnectionFailed`] on a non-success status
    /// - [`ParseError::Json`] if the body is not JSON
    pub async fn request(&self, request: CloudRequest) -> Result<Value> {
        let context_key = self
            .session
            .read()
            .as_ref()
            .map(|s| s.context_key.clone())
            .ok_or(Error::NotLoggedIn)?;

        let url = self.config.url(&request.path);
        tracing::debug!(method = %request.method, url = %url, "Sending cloud request");

        let mut builder = self
            .client
            .request(request.method, &url)
            .header(CONTEXT_KEY_HEADER, context_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(ProtocolError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ))
            .into());
        }

        let body = response.text().await.map_err(ProtocolError::Http)?;
        tracing::debug!(url = %url, bytes = body.len(), "Received cloud response");

        serde_json::from_str(&body).map_err(|e| ParseError::Json(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.base_url(), SessionConfig::DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn url_joins_paths() {
        let config = SessionConfig::default().with_base_url("http://host/api/");
        assert_eq!(config.url("/Device/Get?id=1"), "http://host/api/Device/Get?id=1");
        assert_eq!(config.url("Device/SetAta"), "http://host/api/Device/SetAta");
    }

    #[test]
    fn login_response_without_data_parses() {
        let body: LoginResponse =
            serde_json::from_str(r#"{ "ErrorId": 1, "ErrorMessage": null, "LoginData": null }"#)
                .unwrap();
        assert_eq!(body.error_id, Some(1));
        assert!(body.login_data.is_none());
    }

    #[test]
    fn login_response_with_data_parses() {
        let body: LoginResponse = serde_json::from_str(
            r#"{ "ErrorId": null, "LoginData": { "ContextKey": "K", "Name": "Ada", "CountryName": "UK" } }"#,
        )
        .unwrap();
        let data = body.login_data.unwrap();
        assert_eq!(data.context_key, "K");
        assert_eq!(data.name, "Ada");
        assert_eq!(data.country_name, "UK");
    }

    #[tokio::test]
    async fn request_before_login_fails() {
        let manager = SessionManager::new(SessionConfig::default()).unwrap();
        let err = manager
            .request(CloudRequest::get("User/ListDevices"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn));
    }

    #[tokio::test]
    async fn shutdown_interrupts_login() {
        let manager = SessionManager::new(
            SessionConfig::default().with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        manager.shutdown();

        let err = manager.login("user", "pass").await.unwrap_err();
        assert!(matches!(err, Error::Shutdown));
    }
}
