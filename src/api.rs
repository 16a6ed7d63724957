// API client module: a small blocking HTTP client for the fir.im API.
// Every call hands back the raw status and the decoded JSON body. What a
// status means is decided by the workflow, not here; the only failures
// raised by this layer are transport ones (timeouts, dropped connections).

use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::redirect::Policy;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::errors::FirError;
use crate::workflow::BuildArtifact;

pub const DEFAULT_API_BASE: &str = "http://api.fir.im";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Binaries can be large, so the multipart upload gets a much longer deadline.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(360);

/// Status code and decoded body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        ApiResponse { status, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The service reports failures as `{"error": ...}`. Falls back to a
    /// plain-text body, then to the bare status.
    pub fn error_message(&self) -> String {
        match self.body.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => match &self.body {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => format!("HTTP {}", self.status),
            },
            Some(other) => other.to_string(),
        }
    }
}

/// Failures that happen before a status code is available.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection lost")]
    ConnectionLost,
    #[error("cannot open {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        // reqwest wraps hyper which wraps the socket error; the io kind is
        // only visible somewhere down the chain.
        let mut cur: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(e) = cur {
            if let Some(ioe) = e.downcast_ref::<io::Error>() {
                match ioe.kind() {
                    io::ErrorKind::TimedOut => return TransportError::Timeout,
                    io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof => return TransportError::ConnectionLost,
                    _ => {}
                }
            }
            cur = e.source();
        }
        TransportError::Other(err.to_string())
    }
}

/// Authenticated transport used by the upload workflow.
///
/// `get`, `put` and `post` talk to the configured API host and carry the
/// API token. `post_multipart` targets an arbitrary absolute URL, usually a
/// pre-signed storage endpoint, and sends no token.
pub trait HttpApi {
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, TransportError>;
    fn put(&self, path: &str, body: Map<String, Value>) -> Result<ApiResponse, TransportError>;
    fn post(&self, path: &str, body: Map<String, Value>) -> Result<ApiResponse, TransportError>;
    fn post_multipart(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        artifact: &BuildArtifact,
    ) -> Result<ApiResponse, TransportError>;
}

/// Timeouts and host for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub upload_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

/// Blocking `reqwest` client bound to one API host and one user token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    upload_timeout: Duration,
}

impl ApiClient {
    /// Fails only when the HTTP stack cannot be set up (TLS backend), which
    /// counts as a configuration problem.
    pub fn new(token: &str, settings: &ClientSettings) -> Result<Self, FirError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| FirError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(ApiClient {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            upload_timeout: settings.upload_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_token(&self, mut body: Map<String, Value>) -> Map<String, Value> {
        body.insert("api_token".into(), Value::String(self.token.clone()));
        body
    }

    fn send(&self, req: RequestBuilder) -> Result<ApiResponse, TransportError> {
        self.send_with(req, TransportError::from)
    }

    fn send_with(
        &self,
        req: RequestBuilder,
        classify: fn(reqwest::Error) -> TransportError,
    ) -> Result<ApiResponse, TransportError> {
        let res = req.send().map_err(classify)?;
        let status = res.status().as_u16();
        let text = res.text().map_err(classify)?;
        debug!(status, len = text.len(), "http.response");
        Ok(ApiResponse::new(status, decode_body(&text)))
    }
}

/// Once the connection to the upload endpoint is up, any failure short of
/// a timeout means the transfer was cut off somewhere along the way. hyper
/// reports those as "connection closed before message completed" or a
/// closed body channel, neither of which carries an io error kind.
fn classify_upload_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_connect() || err.is_builder() {
        return TransportError::from(err);
    }
    debug!(error = %err, "http.upload.interrupted");
    TransportError::ConnectionLost
}

impl HttpApi for ApiClient {
    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        debug!(method = "GET", %url, "http.request");
        let req = self
            .client
            .get(&url)
            .query(query)
            .query(&[("api_token", self.token.as_str())]);
        self.send(req)
    }

    fn put(&self, path: &str, body: Map<String, Value>) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        debug!(method = "PUT", %url, "http.request");
        self.send(self.client.put(&url).json(&self.with_token(body)))
    }

    fn post(&self, path: &str, body: Map<String, Value>) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        debug!(method = "POST", %url, "http.request");
        self.send(self.client.post(&url).json(&self.with_token(body)))
    }

    fn post_multipart(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        artifact: &BuildArtifact,
    ) -> Result<ApiResponse, TransportError> {
        let open_err = |source: io::Error| TransportError::Artifact { path: artifact.path.clone(), source };
        let file = File::open(&artifact.path).map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();

        // Storage endpoints tend to refuse chunked bodies, so the part is
        // sized up front instead of streamed with an unknown length.
        let part = multipart::Part::reader_with_length(file, len)
            .file_name(artifact.file_name())
            .mime_str(&artifact.content_type)?;
        let form = fields
            .iter()
            .fold(multipart::Form::new(), |form, (name, value)| {
                form.text(name.to_string(), value.to_string())
            })
            .part("file", part);

        debug!(method = "POST", %url, bytes = len, "http.upload");
        self.send_with(
            self.client.post(url).timeout(self.upload_timeout).multipart(form),
            classify_upload_error,
        )
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
