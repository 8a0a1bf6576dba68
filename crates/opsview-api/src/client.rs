// Opsview HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, the session guard, and
// status-code checking. Status queries and admin commands are inherent
// methods in separate files to keep this module about transport mechanics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::document::Document;
use crate::error::Error;
use crate::session::Session;
use crate::transport::{TransportConfig, send_error};

pub(crate) const API_PATH: &str = "api";
pub(crate) const STATUS_SERVICE_PATH: &str = "api/status/service";
pub(crate) const STATUS_HOSTGROUP_PATH: &str = "api/status/hostgroup";
pub(crate) const ACKNOWLEDGE_PATH: &str = "status/service/acknowledge";

/// Content type sent unless the caller supplies one.
pub const XML_CONTENT_TYPE: &str = "text/xml";

/// Everything needed to talk to one Opsview server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `https://opsview.example.com/`.
    pub base_url: Url,
    pub username: String,
    pub password: SecretString,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(base_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url,
            username: username.into(),
            password,
            transport: TransportConfig::default(),
        }
    }
}

/// Session-authenticated client for one Opsview server.
///
/// Every request first passes through [`Session::ensure_authenticated`],
/// so callers never log in explicitly.
#[derive(Debug)]
pub struct OpsviewClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    timeout: Duration,
}

impl OpsviewClient {
    /// Create a client from a `ClientConfig`.
    ///
    /// A cookie jar is created when the transport config has none; the
    /// session cookie lives there.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let jar = config.transport.cookie_jar.clone().unwrap_or_default();
        let transport = TransportConfig {
            cookie_jar: Some(Arc::clone(&jar)),
            ..config.transport
        };
        let http = transport.build_client()?;
        Ok(Self::with_client(
            http,
            jar,
            config.base_url,
            config.username,
            config.password,
            transport.timeout,
        ))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// `jar` must be the cookie provider `http` was built with, otherwise the
    /// session guard never sees the login cookie.
    pub fn with_client(
        http: reqwest::Client,
        jar: Arc<Jar>,
        base_url: Url,
        username: String,
        password: SecretString,
        timeout: Duration,
    ) -> Self {
        let base_url = normalize_base(base_url);
        let session = Session::new(
            http.clone(),
            jar,
            base_url.clone(),
            username,
            password,
            timeout,
        );
        Self {
            http,
            base_url,
            session,
            timeout,
        }
    }

    /// The server root, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `path` with query parameters, returning the body text.
    pub async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<String, Error> {
        let url = self.url(path)?;
        self.session.ensure_authenticated().await?;
        debug!("GET {} ({} params)", url, query.len());

        let resp = self
            .http
            .get(url)
            .query(query)
            .headers(with_content_type(headers))
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        read_body(resp, self.timeout).await
    }

    /// POST `body` to `path`, returning the body text.
    pub async fn post(
        &self,
        path: &str,
        body: String,
        headers: HeaderMap,
    ) -> Result<String, Error> {
        let url = self.url(path)?;
        self.session.ensure_authenticated().await?;
        debug!("POST {} ({} bytes)", url, body.len());

        let resp = self
            .http
            .post(url)
            .headers(with_content_type(headers))
            .body(body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        read_body(resp, self.timeout).await
    }

    /// POST an `<opsview>` command to `api` and parse the reply.
    pub(crate) async fn send_command(&self, body: String) -> Result<Document, Error> {
        let reply = self.post(API_PATH, body, HeaderMap::new()).await?;
        Document::parse(&reply)
    }
}

impl fmt::Display for OpsviewClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_url.as_str())
    }
}

/// Relative paths join beneath the base only when it ends in `/`.
pub(crate) fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn with_content_type(mut headers: HeaderMap) -> HeaderMap {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
    }
    headers
}

/// Non-2xx responses become `RemoteRequest` errors carrying the body.
///
/// The request deadline also covers the body, so a stalled body is a timeout.
async fn read_body(resp: reqwest::Response, timeout: Duration) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| send_error(e, timeout))?;
    if status.is_success() {
        Ok(body)
    } else {
        debug!(%status, "remote request failed");
        Err(Error::RemoteRequest {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_a_trailing_slash() {
        let url = normalize_base(Url::parse("https://mon.example.com/opsview").unwrap());
        assert_eq!(url.as_str(), "https://mon.example.com/opsview/");
        assert_eq!(
            url.join(STATUS_SERVICE_PATH).unwrap().as_str(),
            "https://mon.example.com/opsview/api/status/service"
        );
    }

    #[test]
    fn caller_content_type_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let headers = with_content_type(headers);
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            with_content_type(HeaderMap::new()).get(CONTENT_TYPE).unwrap(),
            XML_CONTENT_TYPE
        );
    }
}
