// Upload workflow: fetch the app record, request a fresh upload
// certificate, push the binary to the certificate's pre-signed URL, and
// build the public download link.
//
// Every step returns a `FirError` on failure and the run stops at the first
// one. Nothing is retried and nothing outlives a single `run`.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::{debug, info, info_span};

use crate::api::{ApiResponse, HttpApi, TransportError};
use crate::errors::{FirError, Stage};

pub const IPA_CONTENT_TYPE: &str = "application/octet-stream";

/// Local binary to distribute.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub content_type: String,
}

impl BuildArtifact {
    pub fn ipa(path: impl Into<PathBuf>) -> Self {
        BuildArtifact { path: path.into(), content_type: IPA_CONTENT_TYPE.to_string() }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("build.ipa")
            .to_string()
    }
}

/// App record as returned by `GET /apps/{id}`. Kept as the raw JSON object
/// since the service adds fields freely; accessors cover what the upload
/// needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppInfo(Map<String, Value>);

impl AppInfo {
    fn from_body(body: Value, stage: Stage) -> Result<Self, FirError> {
        match body {
            Value::Object(map) => Ok(AppInfo(map)),
            other => Err(FirError::MalformedResponse {
                stage,
                detail: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn short(&self) -> Option<&str> {
        self.str_field("short")
    }

    /// Bundle identifier, either top level or inside the `bundle` object.
    pub fn bundle_id(&self) -> Option<&str> {
        self.str_field("bundle_id").or_else(|| {
            let bundle = self.0.get("bundle")?;
            bundle
                .get("bundle_id")
                .or_else(|| bundle.get("id"))
                .and_then(Value::as_str)
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn bind_to(&mut self, app_id: &str) {
        if self.id() != Some(app_id) {
            debug!(fetched = ?self.0.get("id"), app_id, "app_info.id.rebound");
        }
        self.0.insert("id".into(), Value::String(app_id.to_string()));
    }
}

/// Pre-signed destination for one binary transfer. Deliberately not
/// `Clone`: the upload consumes it.
#[derive(Debug, PartialEq, Deserialize)]
pub struct UploadCertificate {
    pub binary: BinaryTarget,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct BinaryTarget {
    pub upload_url: String,
    pub key: String,
    pub token: String,
}

#[derive(Deserialize)]
struct CertificateEnvelope {
    cert: UploadCertificate,
}

/// Optional metadata written to the app record once the build is up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseNotes {
    pub changelog: Option<String>,
    pub version: Option<String>,
    pub short_version: Option<String>,
}

impl ReleaseNotes {
    pub fn is_empty(&self) -> bool {
        self.changelog.is_none() && self.version.is_none() && self.short_version.is_none()
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let pairs = [
            ("changelog", &self.changelog),
            ("version", &self.version),
            ("versionShort", &self.short_version),
        ];
        for (key, value) in pairs {
            if let Some(v) = value {
                fields.insert(key.into(), Value::String(v.clone()));
            }
        }
        fields
    }
}

/// Everything one invocation needs, resolved before the workflow starts.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub app_id: String,
    pub artifact: BuildArtifact,
    pub release: ReleaseNotes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub public_url: String,
    pub short: String,
}

pub type UploadResult = Result<Published, FirError>;

fn transport_failure(stage: Stage, err: TransportError) -> FirError {
    match err {
        TransportError::Timeout => FirError::TransportTimeout { stage },
        TransportError::ConnectionLost => FirError::ConnectionLost { stage },
        TransportError::Artifact { path, source } => FirError::Artifact { path, source },
        TransportError::Other(message) => FirError::Transport { stage, message },
    }
}

fn rejected(stage: Stage, res: &ApiResponse) -> FirError {
    FirError::RemoteRejected { stage, status: res.status, message: res.error_message() }
}

pub struct UploadWorkflow<H> {
    api: H,
    public_base: String,
}

impl<H: HttpApi> UploadWorkflow<H> {
    /// `public_base` prefixes the short slug in the published link.
    pub fn new(api: H, public_base: &str) -> Self {
        UploadWorkflow { api, public_base: public_base.trim_end_matches('/').to_string() }
    }

    pub fn api(&self) -> &H {
        &self.api
    }

    pub fn fetch_app_info(&self, app_id: &str) -> Result<AppInfo, FirError> {
        let stage = Stage::FetchingAppInfo;
        let res = self
            .api
            .get(&format!("/apps/{app_id}"), &[])
            .map_err(|e| transport_failure(stage, e))?;
        if !res.is_ok() {
            return Err(rejected(stage, &res));
        }
        AppInfo::from_body(res.body, stage)
    }

    pub fn update_app_info(&self, app_id: &str, fields: Map<String, Value>) -> Result<AppInfo, FirError> {
        let stage = Stage::UpdatingAppInfo;
        let mut body = fields;
        body.insert("id".into(), Value::String(app_id.to_string()));
        let res = self
            .api
            .put(&format!("/apps/{app_id}"), body)
            .map_err(|e| transport_failure(stage, e))?;
        if !res.is_ok() {
            return Err(rejected(stage, &res));
        }
        AppInfo::from_body(res.body, stage)
    }

    fn request_upload_certificate(&self, bundle_id: &str) -> Result<UploadCertificate, FirError> {
        let stage = Stage::RequestingCertificate;
        let mut body = Map::new();
        body.insert("type".into(), json!("ios"));
        body.insert("bundle_id".into(), json!(bundle_id));
        let res = self.api.post("/apps", body).map_err(|e| transport_failure(stage, e))?;
        if !res.is_ok() {
            return Err(rejected(stage, &res));
        }
        serde_json::from_value::<CertificateEnvelope>(res.body)
            .map(|envelope| envelope.cert)
            .map_err(|e| FirError::MalformedResponse { stage, detail: e.to_string() })
    }

    /// Requests a fresh certificate for the app's bundle and posts the
    /// binary to it. The upload endpoint's status is returned as is.
    pub fn upload_binary(&self, artifact: &BuildArtifact, info: &AppInfo) -> Result<ApiResponse, FirError> {
        let bundle_id = info.bundle_id().ok_or_else(|| FirError::MalformedResponse {
            stage: Stage::RequestingCertificate,
            detail: "app info carries no bundle id".into(),
        })?;
        let cert = self.request_upload_certificate(bundle_id)?;
        debug!(bundle_id, "upload_cert.issued");
        self.send_binary(artifact, cert)
    }

    fn send_binary(&self, artifact: &BuildArtifact, cert: UploadCertificate) -> Result<ApiResponse, FirError> {
        let BinaryTarget { upload_url, key, token } = cert.binary;
        info!(file = %artifact.path.display(), "build.uploading");
        self.api
            .post_multipart(&upload_url, &[("key", key.as_str()), ("token", token.as_str())], artifact)
            .map_err(|e| transport_failure(Stage::Uploading, e))
    }

    pub fn run(&self, request: &UploadRequest) -> UploadResult {
        let _span = info_span!("upload", app_id = %request.app_id).entered();

        let mut info = self.fetch_app_info(&request.app_id)?;
        info.bind_to(&request.app_id);
        let short = info
            .short()
            .ok_or_else(|| FirError::MalformedResponse {
                stage: Stage::FetchingAppInfo,
                detail: "app info carries no short slug".into(),
            })?
            .to_string();
        info!(short = %short, bundle_id = ?info.bundle_id(), "app_info.fetched");

        let res = self.upload_binary(&request.artifact, &info)?;
        if !res.is_ok() {
            return Err(rejected(Stage::Uploading, &res));
        }
        info!("build.uploaded");

        if !request.release.is_empty() {
            self.update_app_info(&request.app_id, request.release.to_fields())?;
            info!("app_info.updated");
        }

        Ok(Published { public_url: format!("{}/{}", self.public_base, short), short })
    }
}
