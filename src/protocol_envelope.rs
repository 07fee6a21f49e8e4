#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::{get_error_info, HostError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtocolEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Box<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<Box<ProtocolError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtocolError {
    pub code: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Box<Value>>,
}

impl ProtocolEnvelope {
    #[must_use]
    pub fn success(rid: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            rid,
            t: Utc::now().timestamp_millis(),
            ms: None,
            d: Some(Box::new(data)),
            err: None,
            fix: None,
        }
    }

    #[must_use]
    pub fn error(rid: Option<String>, code: String, msg: String) -> Self {
        Self {
            ok: false,
            rid,
            t: Utc::now().timestamp_millis(),
            ms: None,
            d: None,
            err: Some(Box::new(ProtocolError {
                code,
                msg,
                ctx: None,
            })),
            fix: None,
        }
    }

    /// Builds an error envelope carrying the host error's code and fix hint,
    /// falling back to the generic fix documented for the code.
    #[must_use]
    pub fn from_host_error(rid: Option<String>, err: &HostError) -> Self {
        let envelope = Self::error(rid, err.code().to_string(), err.to_string());
        let fix = err
            .fix()
            .or_else(|| get_error_info(err.code()).map(|(_, fix)| fix.to_string()));
        match fix {
            Some(fix) => envelope.with_fix(fix),
            None => envelope,
        }
    }

    #[must_use]
    pub fn with_ms(mut self, ms: i64) -> Self {
        self.ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_fix(mut self, fix: String) -> Self {
        self.fix = Some(fix);
        self
    }

    #[must_use]
    pub fn with_ctx(mut self, ctx: Value) -> Self {
        if let Some(ref mut err) = self.err {
            err.ctx = Some(Box::new(ctx));
        }
        self
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.err.as_ref().map(|e| e.code.as_str())
    }
}
