// Token-authenticated JSON REST API
//
// Newer Opsview servers expose `rest/...` alongside the cookie-session pages.
// Login returns a token that is then sent as `X-Opsview-Username` and
// `X-Opsview-Token` on every call; bodies are JSON both ways.

use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::client::normalize_base;
use crate::error::Error;
use crate::transport::{TransportConfig, send_error};

const REST_PATH: &str = "rest/";
const JSON_CONTENT_TYPE: &str = "application/json";

pub const USERNAME_HEADER: &str = "X-Opsview-Username";
pub const TOKEN_HEADER: &str = "X-Opsview-Token";

struct RestToken {
    username: String,
    token: SecretString,
}

/// Client for the JSON REST API.
///
/// Call [`RestClient::authenticate`] once; later requests carry the token.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    auth: RwLock<Option<RestToken>>,
}

impl RestClient {
    /// Build a client for the server at `base_url`.
    ///
    /// The REST API needs no cookies, so any jar in `transport` is ignored.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let transport = TransportConfig {
            cookie_jar: None,
            ..transport.clone()
        };
        Ok(Self::with_client(
            transport.build_client()?,
            base_url,
            transport.timeout,
        ))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            timeout,
            auth: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.is_some()
    }

    /// `POST rest/login` and keep the returned token.
    pub async fn authenticate(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        debug!(username, "requesting REST token");
        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });
        let reply = self.send(Method::POST, "login", Some(&body), None).await?;

        let token = reply
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Authentication {
                message: format!("no token in REST login reply for {username}"),
            })?;

        *self.auth.write().await = Some(RestToken {
            username: username.to_owned(),
            token: SecretString::from(token.to_owned()),
        });
        Ok(())
    }

    /// Forget the token; later calls go out unauthenticated.
    pub async fn clear_token(&self) {
        *self.auth.write().await = None;
    }

    /// Send `method` to `rest/{path}` with an optional JSON body.
    ///
    /// Anything other than `200 OK` is a `RemoteRequest` error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let headers = self.auth_headers().await?;
        self.send(method, path, body, Some(headers)).await
    }

    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, Error> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, Error> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, Error> {
        self.request(Method::DELETE, path, None).await
    }

    async fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = self.auth.read().await.as_ref() {
            headers.insert(
                HeaderName::from_static("x-opsview-username"),
                header_value(&auth.username)?,
            );
            let mut token = header_value(auth.token.expose_secret())?;
            token.set_sensitive(true);
            headers.insert(HeaderName::from_static("x-opsview-token"), token);
        }
        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value, Error> {
        let url = self
            .base_url
            .join(REST_PATH)?
            .join(path.trim_start_matches('/'))?;
        debug!("{} {}", method, url);

        let mut req = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .headers(headers.unwrap_or_default());
        if let Some(body) = body {
            req = req.body(body.to_string());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        if status != StatusCode::OK {
            debug!(%status, "REST request failed");
            return Err(Error::RemoteRequest {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| Error::Parse {
            message: e.to_string(),
            body: text,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::Authentication {
        message: "credentials are not valid header text".into(),
    })
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_match_constants() {
        assert!(USERNAME_HEADER.eq_ignore_ascii_case("x-opsview-username"));
        assert!(TOKEN_HEADER.eq_ignore_ascii_case("x-opsview-token"));
    }
}
