//! Error taxonomy
//!
//! Every failure the core can produce is a variant of [`AdbwError`]. Errors
//! that have to cross a serialization boundary (workflow reports, the JSON
//! command API) are flattened into an [`ErrorDetail`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AdbwError>;

#[derive(Debug, Clone, Error)]
pub enum AdbwError {
    #[error("failed to launch {program}: {reason}")]
    LaunchFailure { program: String, reason: String },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("action '{action}' requires parameter '{param}'")]
    MissingParameter { action: String, param: String },

    #[error("invalid parameter '{param}': {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("no devices connected")]
    NoDevice,

    #[error("multiple devices connected ({}), pick one with --device", .0.join(", "))]
    AmbiguousDevice(Vec<String>),

    #[error("device not connected: {0}")]
    DeviceNotFound(String),

    #[error("action '{0}' is already registered")]
    RegistrationConflict(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AdbwError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Machine-readable classification of an [`AdbwError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LaunchFailure,
    Timeout,
    NonZeroExit,
    MissingParameter,
    InvalidParameter,
    UnknownAction,
    NoDevice,
    AmbiguousDevice,
    DeviceNotFound,
    RegistrationConflict,
    Plugin,
    Config,
    Store,
    Io,
}

impl AdbwError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LaunchFailure { .. } => ErrorKind::LaunchFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Self::MissingParameter { .. } => ErrorKind::MissingParameter,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
            Self::NoDevice => ErrorKind::NoDevice,
            Self::AmbiguousDevice(_) => ErrorKind::AmbiguousDevice,
            Self::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            Self::RegistrationConflict(_) => ErrorKind::RegistrationConflict,
            Self::Plugin(_) => ErrorKind::Plugin,
            Self::Config(_) => ErrorKind::Config,
            Self::Store(_) => ErrorKind::Store,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn missing(action: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingParameter {
            action: action.into(),
            param: param.into(),
        }
    }

    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

/// Serializable error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AdbwError> for ErrorDetail {
    fn from(err: &AdbwError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<AdbwError> for ErrorDetail {
    fn from(err: AdbwError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_device_message_lists_serials() {
        let err = AdbwError::AmbiguousDevice(vec!["a".into(), "b".into()]);
        assert_eq!(err.kind(), ErrorKind::AmbiguousDevice);
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_error_detail_serializes_kind_in_snake_case() {
        let detail = ErrorDetail::from(AdbwError::missing("install_apk", "apk_path"));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "missing_parameter");
        assert!(json["message"].as_str().unwrap().contains("apk_path"));
    }
}
