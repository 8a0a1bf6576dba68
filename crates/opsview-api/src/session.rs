// Session authentication
//
// Opsview issues an `auth_tkt` cookie from its login form. The session guard
// below is the single place that decides whether a login POST is needed; the
// transport calls it before every request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::send_error;

/// Name of the session cookie issued on successful login.
pub const AUTH_COOKIE: &str = "auth_tkt";

/// Relative path of the login form.
pub const LOGIN_PATH: &str = "login";

/// Cookie-jar backed login state for one Opsview server.
pub struct Session {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    username: String,
    password: SecretString,
    timeout: Duration,
    /// Serializes login attempts between tasks sharing the client.
    login_lock: Mutex<()>,
}

impl Session {
    pub(crate) fn new(
        http: reqwest::Client,
        jar: Arc<Jar>,
        base_url: Url,
        username: String,
        password: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            jar,
            base_url,
            username,
            password,
            timeout,
            login_lock: Mutex::new(()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the jar currently holds an `auth_tkt` cookie for the server.
    pub fn is_authenticated(&self) -> bool {
        let Some(header) = self.jar.cookies(&self.base_url) else {
            return false;
        };
        header.to_str().is_ok_and(|cookies| {
            cookies
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .any(|(name, _)| name == AUTH_COOKIE)
        })
    }

    /// Make sure a session cookie is present, logging in if it is not.
    ///
    /// An HTTP error or redirect from the login form is not taken as failure:
    /// the jar is re-checked afterwards and only a missing cookie fails.
    pub async fn ensure_authenticated(&self) -> Result<(), Error> {
        if self.is_authenticated() {
            return Ok(());
        }

        let _guard = self.login_lock.lock().await;
        // Another task may have logged in while we waited.
        if self.is_authenticated() {
            return Ok(());
        }

        self.login().await?;

        if self.is_authenticated() {
            debug!(username = %self.username, "login successful");
            Ok(())
        } else {
            Err(Error::Authentication {
                message: format!("no {AUTH_COOKIE} cookie after login as {}", self.username),
            })
        }
    }

    /// POST the login form. Only connection-level failures are errors here.
    async fn login(&self) -> Result<(), Error> {
        let url = self.base_url.join(LOGIN_PATH)?;
        debug!("logging in at {}", url);

        let form = [
            ("login", "Log In"),
            ("back", self.base_url.as_str()),
            ("login_username", self.username.as_str()),
            ("login_password", self.password.expose_secret()),
        ];

        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "login form answered with an error, checking for session cookie");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
