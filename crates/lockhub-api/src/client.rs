// Cloud bridge HTTP client
//
// Wraps `reqwest::Client` with session management, `errcode` envelope
// checking, retry policy, and gateway serialization. Endpoint groups
// (locks, passcodes, records, webhook) are inherent methods implemented in
// their own modules to keep this one focused on transport mechanics.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::gateway::GatewayLock;
use crate::session::{LoginResponse, Session};
use crate::transport::{RetryPolicy, TransportConfig};

/// Account credentials exchanged for a session at login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Whether a call reads or mutates upstream state. Picks the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    Read,
    Write,
}

/// Whether a call is relayed through the physical gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Direct,
    Gateway,
}

#[derive(Debug, Clone, Copy, strum::Display)]
pub(crate) enum Verb {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
}

struct Call<'a> {
    verb: Verb,
    path: &'a str,
    params: &'a Map<String, Value>,
    route: Route,
    log_id: &'a str,
}

/// Authenticated client for one cloud account.
///
/// Holds exactly one [`Session`] and a handle to the [`GatewayLock`]. Two
/// clients only contend on the gateway if they share it via
/// [`LockApi::with_gateway`].
pub struct LockApi {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    /// Held across login so concurrent callers that all see an expired
    /// token produce exactly one login.
    session: Mutex<Option<Session>>,
    gateway: GatewayLock,
    transport: TransportConfig,
}

impl LockApi {
    /// Create a client for the bridge at `server` (e.g. `https://lock-api.example.com`).
    /// Requests go to `{server}/api/{path}`.
    pub fn new(
        server: &Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, server, credentials, transport.clone())
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        server: &Url,
        credentials: Credentials,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(&format!(
            "{}/api/",
            server.as_str().trim_end_matches('/')
        ))?;
        Ok(Self {
            http,
            base_url,
            credentials,
            session: Mutex::new(None),
            gateway: GatewayLock::new(),
            transport,
        })
    }

    /// Share an existing gateway lock (several accounts behind one gateway).
    pub fn with_gateway(mut self, gateway: GatewayLock) -> Self {
        self.gateway = gateway;
        self
    }

    /// The `{server}/api/` base every path is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn gateway(&self) -> &GatewayLock {
        &self.gateway
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Session management ───────────────────────────────────────────

    /// Exchange credentials for a fresh session.
    ///
    /// On failure any existing session is left exactly as it was.
    pub async fn login(&self) -> Result<(), Error> {
        let mut slot = self.session.lock().await;
        let session = self.authenticate().await?;
        *slot = Some(session);
        Ok(())
    }

    /// `true` if a session exists and is still inside its validity window.
    pub async fn has_valid_session(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.is_expired())
    }

    /// Return a token that is valid right now, logging in first if needed.
    async fn ensure_session(&self) -> Result<SecretString, Error> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref().filter(|s| !s.is_expired()) {
            return Ok(session.token().clone());
        }

        debug!("no valid session, logging in");
        let session = self.authenticate().await?;
        let token = session.token().clone();
        *slot = Some(session);
        Ok(token)
    }

    /// Drop the session if it still holds the token that was rejected.
    async fn invalidate_session(&self, rejected: &SecretString) {
        let mut slot = self.session.lock().await;
        if slot
            .as_ref()
            .is_some_and(|s| s.token().expose_secret() == rejected.expose_secret())
        {
            debug!("session rejected by server, discarding");
            *slot = None;
        }
    }

    async fn authenticate(&self) -> Result<Session, Error> {
        let url = self.api_url("login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
        });

        let resp = self.http.post(url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let body = resp.text().await?;
        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("unreadable login response: {e}"),
            })?;

        if login.errcode != 0 {
            return Err(Error::Authentication {
                message: login
                    .errmsg
                    .unwrap_or_else(|| format!("login refused (errcode {})", login.errcode)),
            });
        }

        let token = login
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no access_token".into(),
            })?;
        let validity = login
            .expires_in
            .map(Duration::from_millis)
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no expires_in".into(),
            })?;

        info!(validity_secs = validity.as_secs(), "login successful");
        Ok(Session::new(token.into(), validity))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one logical call: ensure a session, retry per the intent's
    /// policy, hold the gateway lock per attempt when routed through it,
    /// then decode the body into `T`.
    ///
    /// Reads are bounded by the transport's read budget across all retries.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        verb: Verb,
        path: &str,
        params: Value,
        intent: Intent,
        route: Route,
    ) -> Result<T, Error> {
        let params = into_params(params)?;
        let log_id = correlation_id();
        let call = Call {
            verb,
            path,
            params: &params,
            route,
            log_id: &log_id,
        };

        let value = match intent {
            Intent::Write => {
                self.with_retry(&self.transport.write_retry, &call)
                    .await?
            }
            Intent::Read => {
                let budget = self.transport.read_budget;
                tokio::time::timeout(budget, self.with_retry(&self.transport.read_retry, &call))
                    .await
                    .map_err(|_| {
                        warn!(log_id = %log_id, "{verb} {path} exceeded its {}s budget", budget.as_secs());
                        Error::BudgetExhausted {
                            budget_secs: budget.as_secs(),
                        }
                    })??
            }
        };

        decode(&value)
    }

    async fn with_retry(&self, policy: &RetryPolicy, call: &Call<'_>) -> Result<Value, Error> {
        let mut attempt = 1;
        loop {
            let token = self.ensure_session().await?;
            let result = match call.route {
                Route::Gateway => self.gateway.run(self.send(call, &token)).await,
                Route::Direct => self.send(call, &token).await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if policy.should_retry(&e) => {
                    if attempt >= policy.attempts {
                        warn!(
                            log_id = call.log_id,
                            attempts = attempt,
                            error = %e,
                            "giving up on {} {}", call.verb, call.path
                        );
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    let delay = policy.delay_after(attempt);
                    debug!(log_id = call.log_id, attempt, ?delay, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, call: &Call<'_>, token: &SecretString) -> Result<Value, Error> {
        let url = self.api_url(call.path)?;
        debug!(log_id = call.log_id, "{} {}", call.verb, url);

        let builder = match call.verb {
            Verb::Get => {
                let mut query: Vec<(&str, String)> = call
                    .params
                    .iter()
                    .map(|(k, v)| (k.as_str(), query_value(v)))
                    .collect();
                query.push(("access_token", token.expose_secret().to_owned()));
                self.http.get(url).query(&query)
            }
            Verb::Post => {
                let mut body = call.params.clone();
                body.insert(
                    "access_token".into(),
                    Value::String(token.expose_secret().to_owned()),
                );
                self.http.post(url).json(&body)
            }
        };

        let resp = builder.send().await?;
        self.parse_response(resp, token, call.log_id).await
    }

    /// Classify a response: HTTP >= 400 is a transport failure, a non-zero
    /// `errcode` is an application failure, anything else is the body.
    async fn parse_response(
        &self,
        resp: reqwest::Response,
        token: &SecretString,
        log_id: &str,
    ) -> Result<Value, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_session(token).await;
        }

        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            debug!(log_id, status = status.as_u16(), "request failed: {}", preview(&body));
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let body = resp.text().await?;
        trace!(log_id, "response body: {body}");

        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

        check_errcode(value).inspect_err(|e| debug!(log_id, "API returned: {e}"))
    }
}

// ── Wire helpers ─────────────────────────────────────────────────────

/// Reject a body whose `errcode` is present and non-zero.
pub(crate) fn check_errcode(value: Value) -> Result<Value, Error> {
    let (code, message) = match value.get("errcode") {
        None | Some(Value::Null) => return Ok(value),
        Some(raw) => {
            let code = raw
                .as_i64()
                .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()));
            let message = value
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            (code, message)
        }
    };

    match code {
        Some(0) => Ok(value),
        Some(code) => Err(Error::Api {
            code,
            message,
            payload: value,
        }),
        None => Err(Error::Validation {
            message: format!("errcode is not an integer in {value}"),
        }),
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

fn into_params(params: Value) -> Result<Map<String, Value>, Error> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::Validation {
            message: format!("request parameters must be an object, got {other}"),
        }),
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Short random tag tying together the log lines of one logical call.
pub(crate) fn correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().chars().take(4).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_missing_errcode_is_success() {
        assert!(check_errcode(json!({"errcode": 0, "list": []})).is_ok());
        assert!(check_errcode(json!({"list": []})).is_ok());
        assert!(check_errcode(json!({"errcode": "0"})).is_ok());
    }

    #[test]
    fn nonzero_errcode_carries_payload() {
        let err = check_errcode(json!({"errcode": -2012, "errmsg": "gateway offline"}))
            .unwrap_err();
        match err {
            Error::Api {
                code,
                message,
                payload,
            } => {
                assert_eq!(code, -2012);
                assert_eq!(message, "gateway offline");
                assert_eq!(payload["errcode"], -2012);
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_write_is_retried() {
        // Nothing listens on a port we just released.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let server = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        let transport = TransportConfig::default().with_retry_delay(Duration::from_millis(10));
        let api = LockApi::new(
            &server,
            Credentials {
                username: "owner@example.com".into(),
                password: "hunter2".to_string().into(),
            },
            &transport,
        )
        .unwrap();
        *api.session.lock().await = Some(Session::new(
            "tok-1".to_string().into(),
            Duration::from_secs(3600),
        ));

        let err = api.lock(crate::LockId(1)).await.unwrap_err();
        match err {
            Error::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, Error::Transport(ref e) if e.is_connect()));
            }
            other => panic!("expected retries to be exhausted, got {other:?}"),
        }
    }

    #[test]
    fn correlation_ids_are_short_hex() {
        let id = correlation_id();
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn query_values_are_unquoted() {
        assert_eq!(query_value(&json!("abc")), "abc");
        assert_eq!(query_value(&json!(42)), "42");
    }
}
