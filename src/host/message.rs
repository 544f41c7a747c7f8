use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::worker::{describe_exit, WorkerOutcome};

/// The only action this host acts on.
pub const PREVIEW_ACTION: &str = "preview";

pub const INVALID_MESSAGE_FORMAT: &str = "Invalid message format";
pub const PROCESSED_MESSAGE: &str = "Package processed successfully";
pub const INTERNAL_ERROR: &str = "Internal error";

/// A validated `{"action": "preview", "packageName": ...}` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub package_name: String,
}

/// Why an inbound payload was not actionable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMessage {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("unsupported action {0:?}")]
    UnsupportedAction(Option<String>),
    #[error("missing or empty packageName")]
    MissingPackageName,
}

impl PreviewRequest {
    /// Validate a decoded payload. The package name is taken verbatim.
    pub fn from_value(value: &Value) -> Result<Self, InvalidMessage> {
        let obj = value.as_object().ok_or(InvalidMessage::NotAnObject)?;

        let action = obj.get("action").and_then(Value::as_str);
        if action != Some(PREVIEW_ACTION) {
            return Err(InvalidMessage::UnsupportedAction(action.map(str::to_owned)));
        }

        match obj.get("packageName").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => Ok(Self {
                package_name: name.to_owned(),
            }),
            _ => Err(InvalidMessage::MissingPackageName),
        }
    }
}

/// The single reply written for every request.
///
/// Absent fields are omitted from the JSON rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl Response {
    pub fn processed(package_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: true,
            package_name: Some(package_name.into()),
            message: Some(PROCESSED_MESSAGE.to_owned()),
            output: Some(output.into()),
            error: None,
            stderr: None,
        }
    }

    pub fn failed(package_name: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            package_name,
            message: None,
            output: None,
            error: Some(error.into()),
            stderr: None,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// Reply for a well-formed frame that is not an actionable request.
    pub fn invalid_format() -> Self {
        Self::failed(None, INVALID_MESSAGE_FORMAT)
    }

    /// Reply for a frame whose payload could not be parsed at all.
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::failed(None, format!("Malformed message: {detail}"))
    }

    /// Map a worker's terminal outcome onto the wire shape.
    pub fn from_outcome(package_name: String, outcome: WorkerOutcome) -> Self {
        match outcome {
            WorkerOutcome::Completed { stdout } => Self::processed(package_name, stdout),
            WorkerOutcome::ProcessFailed {
                code,
                signal,
                stderr,
            } => Self::failed(Some(package_name), describe_exit(code, signal)).with_stderr(stderr),
            WorkerOutcome::LaunchFailed { reason } | WorkerOutcome::SupervisionFailed { reason } => {
                Self::failed(Some(package_name), reason)
            }
        }
    }
}
