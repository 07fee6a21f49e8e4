#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use thiserror::Error;

/// Error code constants for type-safe error handling
pub mod code {
    pub const EXISTS: &str = "EXISTS";
    pub const NOTFOUND: &str = "NOTFOUND";
    pub const INVALID: &str = "INVALID";
    pub const CONFLICT: &str = "CONFLICT";
    pub const DEPENDENCY: &str = "DEPENDENCY";
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown contract kind: {0}")]
    UnknownKind(String),

    #[error("Contract kind already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Method '{method}' declared more than once on {kind}")]
    DuplicateMethod { kind: String, method: String },

    #[error("No contract deployed at {0}")]
    ContractNotFound(String),

    #[error("Method '{method}' not found on {kind}")]
    MethodNotFound {
        kind: String,
        method: String,
        suggestion: Option<String>,
    },

    #[error("Method '{method}' is a {declared} method and cannot be called as {requested}")]
    VisibilityMismatch {
        method: String,
        declared: &'static str,
        requested: &'static str,
    },

    #[error("Invalid arguments for '{method}': {reason}")]
    InvalidArguments { method: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HostError {
    /// Returns the protocol error code for this error
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidArguments { .. } | Self::Serialization(_) => {
                code::INVALID
            }
            Self::UnknownKind(_) | Self::ContractNotFound(_) | Self::MethodNotFound { .. } => {
                code::NOTFOUND
            }
            Self::AlreadyRegistered(_) | Self::DuplicateMethod { .. } => code::EXISTS,
            Self::VisibilityMismatch { .. } => code::CONFLICT,
            Self::Io(_) => code::DEPENDENCY,
        }
    }

    /// Returns the exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::UnknownKind(_) | Self::ContractNotFound(_) | Self::MethodNotFound { .. } => 3,
            Self::AlreadyRegistered(_) | Self::DuplicateMethod { .. } => 4,
            Self::VisibilityMismatch { .. } => 5,
            Self::InvalidArguments { .. } => 6,
            Self::Io(_) => 7,
            Self::Serialization(_) => 8,
        }
    }

    /// Remediation hint shown alongside protocol errors.
    #[must_use]
    pub fn fix(&self) -> Option<String> {
        match self {
            Self::MethodNotFound {
                suggestion: Some(name),
                ..
            } => Some(format!("Did you mean '{name}'?")),
            Self::MethodNotFound { kind, .. } => {
                Some(format!("Run {{\"cmd\":\"schema\",\"kind\":\"{kind}\"}} to list methods"))
            }
            Self::VisibilityMismatch { declared, .. } => {
                Some(format!("Use the '{declared}' command for this method"))
            }
            Self::ContractNotFound(_) => {
                Some("Run {\"cmd\":\"contracts\"} to list deployed addresses".to_string())
            }
            Self::UnknownKind(_) => Some("Run {\"cmd\":\"kinds\"} to list kinds".to_string()),
            _ => None,
        }
    }
}

/// Protocol error codes with description and generic fix, listed by `?`.
pub const ERROR_CODES: &[(&str, &str, &str)] = &[
    (
        code::EXISTS,
        "Resource already exists",
        "Use a different kind name or method name",
    ),
    (
        code::NOTFOUND,
        "Resource was not found",
        "List kinds, contracts or methods and verify the identifier",
    ),
    (
        code::INVALID,
        "Invalid request payload",
        "Validate JSON syntax and ensure all required fields are present",
    ),
    (
        code::CONFLICT,
        "Method called with the wrong visibility",
        "Call views with 'view' and mutators with 'write'",
    ),
    (
        code::DEPENDENCY,
        "State storage unavailable",
        "Check the state directory exists and is writable",
    ),
];

/// Get error code details (description and fix) for a given error code
#[must_use]
pub fn get_error_info(error_code: &str) -> Option<(&'static str, &'static str)> {
    ERROR_CODES
        .iter()
        .find(|(code, _, _)| *code == error_code)
        .map(|(_, desc, fix)| (*desc, *fix))
}

pub type Result<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_mismatch_maps_to_conflict() {
        let err = HostError::VisibilityMismatch {
            method: "write_method".to_string(),
            declared: "write",
            requested: "view",
        };
        assert_eq!(err.code(), code::CONFLICT);
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.fix().as_deref(), Some("Use the 'write' command for this method"));
    }

    #[test]
    fn method_not_found_fix_prefers_suggestion() {
        let err = HostError::MethodNotFound {
            kind: "string_contract".to_string(),
            method: "read_methd".to_string(),
            suggestion: Some("read_method".to_string()),
        };
        assert_eq!(err.code(), code::NOTFOUND);
        assert_eq!(err.fix().as_deref(), Some("Did you mean 'read_method'?"));
    }

    #[test]
    fn every_code_has_documented_info() {
        [
            code::EXISTS,
            code::NOTFOUND,
            code::INVALID,
            code::CONFLICT,
            code::DEPENDENCY,
        ]
        .iter()
        .for_each(|c| assert!(get_error_info(c).is_some(), "missing info for {c}"));
    }
}
