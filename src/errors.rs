// Error types shared by the workflow and the binary.
//
// `FirError` is the single terminal failure of an upload run. Each variant
// renders a message the user can act on and maps to a process exit code,
// so `main` only has to find it in the error chain.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Public site where users can check what the service actually received.
pub const SERVICE_SITE: &str = "https://fir.im";

/// The step of the workflow a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchingAppInfo,
    RequestingCertificate,
    Uploading,
    UpdatingAppInfo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::FetchingAppInfo => "getting app info",
            Stage::RequestingCertificate => "requesting upload certificate",
            Stage::Uploading => "uploading build",
            Stage::UpdatingAppInfo => "updating app info",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum FirError {
    #[error("{0}")]
    Usage(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("cannot read build {}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}", timeout_message(.stage))]
    TransportTimeout { stage: Stage },
    #[error("{}", connection_lost_message(.stage))]
    ConnectionLost { stage: Stage },
    #[error("{}", transport_message(.stage, .message))]
    Transport { stage: Stage, message: String },
    #[error("{}", rejected_message(.stage, .status, .message))]
    RemoteRejected {
        stage: Stage,
        status: u16,
        message: String,
    },
    #[error("unexpected response while {stage}: {detail}")]
    MalformedResponse { stage: Stage, detail: String },
}

impl FirError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 10,
            Self::RemoteRejected { .. } | Self::MalformedResponse { .. } => 20,
            Self::Artifact { .. } => 30,
            Self::TransportTimeout { .. } | Self::ConnectionLost { .. } | Self::Transport { .. } => 40,
        }
    }

    /// Stage the failure happened in, if it came from the remote workflow.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::TransportTimeout { stage }
            | Self::ConnectionLost { stage }
            | Self::Transport { stage, .. }
            | Self::RemoteRejected { stage, .. }
            | Self::MalformedResponse { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Exit code for anything that is neither a `FirError` nor an I/O error.
pub const UNCLASSIFIED_EXIT_CODE: i32 = 1;

/// Walks the error chain for the first `FirError` (its own code) or
/// `io::Error` (local I/O, 30).
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(fir) = cause.downcast_ref::<FirError>() {
            tracing::debug!(?fir, code = fir.code(), "exit.classified");
            return fir.code();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return 30;
        }
    }
    tracing::debug!(error = %err, "exit.unclassified");
    UNCLASSIFIED_EXIT_CODE
}

fn timeout_message(stage: &Stage) -> String {
    match stage {
        Stage::Uploading => format!(
            "Timed out while uploading build. The transfer may have completed anyway, check {SERVICE_SITE} to see if the upload went through."
        ),
        Stage::UpdatingAppInfo => format!(
            "Timed out while updating app info. The build was uploaded, check {SERVICE_SITE} for the release notes."
        ),
        other => format!("Timed out while {other}."),
    }
}

fn connection_lost_message(stage: &Stage) -> String {
    match stage {
        Stage::Uploading => format!(
            "Upload failed, the connection was lost. Check your internet connection, then check {SERVICE_SITE} to see if the upload was completed."
        ),
        other => format!("Connection lost while {other}. Check your internet connection."),
    }
}

fn transport_message(stage: &Stage, message: &str) -> String {
    match stage {
        Stage::Uploading => format!(
            "Network error while uploading build: {message}. Check {SERVICE_SITE} to see if the upload was completed."
        ),
        other => format!("Network error while {other}: {message}"),
    }
}

fn rejected_message(stage: &Stage, status: &u16, message: &str) -> String {
    match stage {
        Stage::FetchingAppInfo => format!("Error getting app information ({status}): {message}"),
        Stage::RequestingCertificate => format!("Error getting upload cert ({status}): {message}"),
        Stage::Uploading => format!("Error uploading to fir.im ({status}): {message}"),
        Stage::UpdatingAppInfo => {
            format!("Build uploaded, but updating app info failed ({status}): {message}")
        }
    }
}
