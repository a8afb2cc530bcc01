// HMI JSON-RPC client
//
// Wraps `reqwest::Client` with the JSON-RPC 2.0 envelope, session token
// injection and the handful of HMI methods the panel needs. Every call
// goes to `POST {base}/jrpc`.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, RPC_ACCESS_DENIED};
use crate::model::{
    ActionResult, ActionStatus, DashboardReply, DashboardWire, ItemState, LoginReply, RpcRequest,
    RpcResponse,
};
use crate::transport::TransportConfig;

/// How long the server holds an action call open waiting for completion.
const DEFAULT_ACTION_WAIT: Duration = Duration::from_secs(30);

/// Raw JSON-RPC client for the EVA ICS v4 HMI service.
///
/// Holds the session token once one is known and adds it as the `k`
/// parameter of every subsequent call. All methods return unwrapped
/// `result` payloads -- the envelope is stripped before the caller sees it.
pub struct EvaClient {
    http: reqwest::Client,
    base_url: Url,
    /// Session token, set from the `ehmi.get_config` reply and refreshed
    /// by `login`.
    token: RwLock<Option<SecretString>>,
    next_id: AtomicU64,
    action_wait: Duration,
}

impl EvaClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// The `base_url` is the HMI service root, e.g. `https://plant.local:7727`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
            next_id: AtomicU64::new(1),
            action_wait: DEFAULT_ACTION_WAIT,
        }
    }

    /// Override how long action calls wait for completion on the server.
    pub fn with_action_wait(mut self, wait: Duration) -> Self {
        self.action_wait = wait;
        self
    }

    /// The HMI service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Session token ────────────────────────────────────────────────

    /// Store the session token used for all further calls.
    pub fn set_token(&self, token: SecretString) {
        debug!("storing session token");
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token);
    }

    /// A copy of the current session token, if any.
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/jrpc`
    pub(crate) fn jrpc_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join("jrpc")?)
    }

    /// WebSocket URL for the state stream: `ws[s]://{host}/ws?k={token}`.
    pub fn ws_url(&self) -> Result<Url, Error> {
        let token = self.token().ok_or(Error::NotLoggedIn)?;
        let mut url = self.base_url.join("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive ws URL from {url}")))?;
        url.query_pairs_mut()
            .append_pair("k", token.expose_secret());
        Ok(url)
    }

    // ── JSON-RPC ─────────────────────────────────────────────────────

    /// Call a JSON-RPC method and unwrap its `result`.
    ///
    /// `params` must be a JSON object (or null). The session token is added
    /// as `k` unless the caller already set it.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        self.call_with(method, params, true).await
    }

    async fn call_with<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        with_token: bool,
    ) -> Result<T, Error> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::Deserialization {
                    message: format!("params for {method} must be an object"),
                    body: other.to_string(),
                });
            }
        };
        if with_token && !params.contains_key("k") {
            if let Some(token) = self.token() {
                params.insert("k".into(), Value::String(token.expose_secret().to_owned()));
            }
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: Value::Object(params),
        };

        let url = self.jrpc_url()?;
        debug!(method, id = request.id, "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_reply(method, resp).await
    }

    // ── HMI methods ──────────────────────────────────────────────────

    /// `ehmi.get_config`: fetch the dashboard configuration for a client key.
    ///
    /// The reply also carries a session token, which is stored.
    pub async fn get_dashboard_config(&self, client_key: &SecretString) -> Result<DashboardReply, Error> {
        let wire: DashboardWire = self
            .call("ehmi.get_config", json!({ "ck": client_key.expose_secret() }))
            .await?;
        let reply = DashboardReply::from(wire);
        self.set_token(reply.token.clone());
        Ok(reply)
    }

    /// `login` with an existing token (session restore).
    ///
    /// Any rejection is reported as [`Error::Authentication`].
    pub async fn login_with_token(&self, token: &SecretString) -> Result<(), Error> {
        let result: Result<LoginReply, Error> = self
            .call_with("login", json!({ "a": token.expose_secret() }), false)
            .await;
        match result {
            Ok(reply) => {
                self.set_token(SecretString::from(reply.token));
                debug!("token login successful");
                Ok(())
            }
            Err(Error::Rpc { code, message }) => {
                trace!(code, "login rejected");
                Err(Error::Authentication { message })
            }
            Err(e) => Err(e),
        }
    }

    /// `item.state` for an explicit list of OIDs.
    pub async fn item_state(&self, oids: &[String]) -> Result<Vec<ItemState>, Error> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        self.call("item.state", json!({ "i": oids })).await
    }

    /// `run`: invoke an lmacro with no arguments and wait for it.
    pub async fn run_lmacro(&self, oid: &str) -> Result<ActionResult, Error> {
        let result: ActionResult = self
            .call(
                "run",
                json!({
                    "i": oid,
                    "params": { "args": [], "kwargs": {} },
                    "wait": self.action_wait.as_secs_f64(),
                }),
            )
            .await?;
        check_action(oid, result)
    }

    /// `action.toggle`: flip a unit's binary status and wait for it.
    pub async fn action_toggle(&self, oid: &str) -> Result<ActionResult, Error> {
        let result: ActionResult = self
            .call(
                "action.toggle",
                json!({ "i": oid, "wait": self.action_wait.as_secs_f64() }),
            )
            .await?;
        check_action(oid, result)
    }

    /// `action`: set a unit's value and wait for it.
    pub async fn action_exec(&self, oid: &str, value: Value) -> Result<ActionResult, Error> {
        let result: ActionResult = self
            .call(
                "action",
                json!({
                    "i": oid,
                    "params": { "value": value },
                    "wait": self.action_wait.as_secs_f64(),
                }),
            )
            .await?;
        check_action(oid, result)
    }
}

/// Length of body excerpts carried in error messages, in chars.
const PREVIEW_CHARS: usize = 200;

/// Leading excerpt of a reply body, cut on a char boundary.
fn preview(body: &str) -> &str {
    body.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(body, |(end, _)| &body[..end])
}

/// Parse the JSON-RPC envelope, returning `result` on success.
async fn parse_reply<T: DeserializeOwned>(method: &str, resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("{method}: HTTP {status}"),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Rpc {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {status}: {}", preview(&body)),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    let envelope: RpcResponse<T> = serde_json::from_str(&body).map_err(|e| {
        Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        }
    })?;

    if let Some(err) = envelope.error {
        let message = err.message.unwrap_or_else(|| format!("code {}", err.code));
        if err.code == RPC_ACCESS_DENIED {
            trace!(method, "access denied");
        }
        return Err(Error::Rpc {
            code: err.code,
            message,
        });
    }

    match envelope.result {
        Some(result) => Ok(result),
        // Methods without a payload reply with `"result": null`.
        None => serde_json::from_value(Value::Null).map_err(|e| Error::Deserialization {
            message: format!("{method}: missing result ({e})"),
            body,
        }),
    }
}

/// Turn a non-completed action status into an error.
fn check_action(oid: &str, result: ActionResult) -> Result<ActionResult, Error> {
    if result.status == ActionStatus::Completed {
        Ok(result)
    } else {
        Err(Error::ActionFailed {
            oid: oid.to_owned(),
            status: result.status.as_str().to_owned(),
        })
    }
}
