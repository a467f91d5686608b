/// Remote channel: the wire contract shared by senders and listeners.
///
/// Submit:  POST <endpoint>  form `vibrate=<key>`          → 200 on success
/// Poll:    GET  <endpoint>?poll&t=<unix_ms>                → 200 + JSON
///
/// Poll payload:
///   {"id": "7", "pattern": "b"}   latest action (id may also be a number)
///   {} / {"pattern": null}        nothing issued yet
///
/// The id is opaque. It is only ever compared for equality.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const USER_AGENT: &str = "buzzlink";

/// Server-assigned identifier of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryId(String);

impl DeliveryId {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One (identifier, action) pair fetched by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: DeliveryId,
    pub action: String,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("poll timed out")]
    Timeout,
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("server responded with status {0}")]
    ServerError(u16),
    #[error("malformed poll response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("submit timed out")]
    Timeout,
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("server responded with status {0}")]
    ServerError(u16),
}

/// Both sides of the remote endpoint.
pub trait RemoteChannel: Send + Sync {
    /// Publish `action` as the latest action.
    fn submit(&self, action: &str) -> Result<(), SubmitError>;
    /// Fetch the latest action, if any. Bounded by the channel's poll timeout.
    fn poll(&self) -> Result<Option<Delivery>, PollError>;
}

/// Parse a poll response body into an optional delivery.
pub fn parse_poll_body(body: &str) -> Result<Option<Delivery>, PollError> {
    let json: serde_json::Value = serde_json::from_str(body.trim())
        .map_err(|e| PollError::MalformedResponse(e.to_string()))?;
    let obj = json
        .as_object()
        .ok_or_else(|| PollError::MalformedResponse("expected a JSON object".into()))?;

    let action = match obj.get("pattern") {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(PollError::MalformedResponse(format!("pattern is not a string: {other}")));
        }
    };

    let id = match obj.get("id") {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(PollError::MalformedResponse(format!("id is not a string or number: {other}")));
        }
    };
    if id.is_empty() {
        return Ok(None);
    }

    Ok(Some(Delivery { id: DeliveryId(id), action }))
}

/// Build the poll URL with a cache-busting timestamp.
pub fn poll_url(endpoint: &str, unix_ms: u128) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}poll&t={unix_ms}")
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Transport-level failure, before it is mapped to a poll or submit error.
enum Transport {
    Timeout,
    Status(u16),
    Unreachable(String),
}

impl Transport {
    fn classify(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => Transport::Timeout,
            ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => Transport::Timeout,
            ureq::Error::StatusCode(code) => Transport::Status(code),
            other => Transport::Unreachable(other.to_string()),
        }
    }

    fn into_poll(self) -> PollError {
        match self {
            Transport::Timeout => PollError::Timeout,
            Transport::Status(code) => PollError::ServerError(code),
            Transport::Unreachable(msg) => PollError::Unreachable(msg),
        }
    }

    fn into_submit(self) -> SubmitError {
        match self {
            Transport::Timeout => SubmitError::Timeout,
            Transport::Status(code) => SubmitError::ServerError(code),
            Transport::Unreachable(msg) => SubmitError::Unreachable(msg),
        }
    }
}

/// HTTP implementation over `ureq` (blocking; call from a worker thread).
pub struct HttpChannel {
    endpoint: String,
    poll_agent: ureq::Agent,
    submit_agent: ureq::Agent,
}

impl HttpChannel {
    pub fn new(endpoint: impl Into<String>, poll_timeout: Duration, submit_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            poll_agent: agent_with_timeout(poll_timeout),
            submit_agent: agent_with_timeout(submit_timeout),
        }
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

impl RemoteChannel for HttpChannel {
    fn submit(&self, action: &str) -> Result<(), SubmitError> {
        let resp = self
            .submit_agent
            .post(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .send_form([("vibrate", action)])
            .map_err(|e| Transport::classify(e).into_submit())?;
        match resp.status().as_u16() {
            200 => Ok(()),
            code => Err(SubmitError::ServerError(code)),
        }
    }

    fn poll(&self) -> Result<Option<Delivery>, PollError> {
        let url = poll_url(&self.endpoint, unix_millis());
        let mut resp = self
            .poll_agent
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| Transport::classify(e).into_poll())?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(PollError::ServerError(status));
        }
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| Transport::classify(e).into_poll())?;
        parse_poll_body(&body)
    }
}
