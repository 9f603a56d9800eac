//! Error taxonomy shared by the pipeline, the worker boundary and the solver

use henry_cad::CadError;
use serde::{Deserialize, Serialize};

/// Errors produced by henry-core
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("CAD backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Import failed: {0}")]
    ImportFailure(String),

    #[error("{what} timed out after {secs} s")]
    Timeout { what: String, secs: u64 },

    #[error("Solver failed with exit code {code:?}: {stderr}")]
    SolverFailure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for henry-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable discriminant of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    InvalidInput,
    ImportFailure,
    Timeout,
    SolverFailure,
    Io,
    Json,
    Config,
}

/// Structured error as it crosses a process boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub error: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::ImportFailure(_) => ErrorKind::ImportFailure,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::SolverFailure { .. } => ErrorKind::SolverFailure,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// The message without the kind prefix that `Display` adds
    pub fn message(&self) -> String {
        match self {
            Error::BackendUnavailable(msg)
            | Error::InvalidInput(msg)
            | Error::ImportFailure(msg)
            | Error::Io(msg)
            | Error::Json(msg)
            | Error::Config(msg) => msg.clone(),
            Error::Timeout { .. } => self.to_string(),
            Error::SolverFailure { stderr, .. } => stderr.clone(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            error: self.message(),
        }
    }
}

impl From<ErrorPayload> for Error {
    /// Rebuild an error on the receiving side of the worker boundary
    fn from(payload: ErrorPayload) -> Self {
        let message = payload.error;
        match payload.kind {
            ErrorKind::BackendUnavailable => Error::BackendUnavailable(message),
            ErrorKind::InvalidInput => Error::InvalidInput(message),
            ErrorKind::Timeout => {
                let parsed = message
                    .strip_suffix(" s")
                    .and_then(|rest| rest.rsplit_once(" timed out after "))
                    .and_then(|(what, secs)| {
                        Some((what.to_string(), secs.parse::<u64>().ok()?))
                    });
                match parsed {
                    Some((what, secs)) => Error::Timeout { what, secs },
                    None => Error::Timeout {
                        what: message,
                        secs: 0,
                    },
                }
            }
            ErrorKind::SolverFailure => Error::SolverFailure {
                code: None,
                stdout: String::new(),
                stderr: message,
            },
            ErrorKind::Io => Error::Io(message),
            ErrorKind::Json => Error::Json(message),
            ErrorKind::Config => Error::Config(message),
            ErrorKind::ImportFailure => Error::ImportFailure(message),
        }
    }
}

impl From<CadError> for Error {
    fn from(err: CadError) -> Self {
        match err {
            CadError::KernelNotAvailable(msg) => Error::BackendUnavailable(msg),
            CadError::InvalidFormat(msg) => Error::InvalidInput(msg),
            other => Error::ImportFailure(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use henry_cad::EntityId;

    use super::*;

    #[test]
    fn test_cad_error_mapping() {
        assert_eq!(
            Error::from(CadError::InvalidFormat("line 1".into())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            Error::from(CadError::KernelNotAvailable("none".into())).kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            Error::from(CadError::MissingEntity(EntityId(4))).kind(),
            ErrorKind::ImportFailure
        );
    }

    #[test]
    fn test_payload_keeps_kind() {
        let payload = Error::InvalidInput("empty file".into()).to_payload();
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"kind":"invalid_input","error":"empty file"}"#);

        let back: ErrorPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(Error::from(back), Error::InvalidInput(_)));
    }

    #[test]
    fn test_rebuilt_error_displays_once() {
        let errors = [
            Error::InvalidInput("line 3: expected ';'".into()),
            Error::ImportFailure("Unresolved entity reference #9".into()),
            Error::BackendUnavailable("no kernel".into()),
            Error::Timeout {
                what: "geometry import".into(),
                secs: 120,
            },
            Error::SolverFailure {
                code: None,
                stdout: String::new(),
                stderr: "no ports".into(),
            },
        ];
        for err in errors {
            let rebuilt = Error::from(err.to_payload());
            assert_eq!(rebuilt.to_string(), err.to_string());
            assert_eq!(rebuilt.kind(), err.kind());
        }
    }
}
