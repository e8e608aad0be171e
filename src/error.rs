//! Error types for the fingerprint scan engine
//!
//! The taxonomy mirrors the recovery model of the engine: every probe-level
//! fault is locally recoverable (it degrades to an unsupported sentinel or a
//! fallback digest), and only an orchestrator-internal fault is allowed to
//! fail a scan.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Capability errors (1xx)
    UnsupportedCapability = 100,

    // Digest errors (2xx)
    DigestFailure = 200,

    // Probe errors (3xx)
    ProbeFault = 300,

    // Internal errors (9xx)
    InternalError = 900,
}

/// Main error type for the scan engine
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    /// A required platform capability is absent. Non-fatal: the probe
    /// records the unsupported sentinel result.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// The cryptographic digest primitive threw or is unavailable.
    /// Non-fatal: the digest service falls back to the rolling hash.
    #[error("Digest failure: {0}")]
    DigestFailure(String),

    /// Unexpected exception during feature extraction. Caught at the probe
    /// boundary, logged, and downgraded to an unsupported result.
    #[error("Probe fault in {probe}: {detail}")]
    ProbeFault { probe: String, detail: String },

    /// Orchestrator-internal fault. The only path to a failed scan.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            ScanError::UnsupportedCapability(_) => ErrorCode::UnsupportedCapability,
            ScanError::DigestFailure(_) => ErrorCode::DigestFailure,
            ScanError::ProbeFault { .. } => ErrorCode::ProbeFault,
            ScanError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error aborts the scan.
    ///
    /// Probe-level faults never do; they are isolated per probe and the
    /// affected probe is recorded as unsupported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Internal(_))
    }

    /// Build a probe fault from a JS exception value.
    pub fn probe_fault(probe: &str, err: &JsValue) -> Self {
        let detail = err.as_string().unwrap_or_else(|| format!("{:?}", err));
        ScanError::ProbeFault {
            probe: probe.to_string(),
            detail,
        }
    }
}

impl From<ScanError> for JsValue {
    fn from(err: ScanError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Error information for JavaScript consumption
#[derive(Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub is_fatal: bool,
}

impl From<&ScanError> for ErrorInfo {
    fn from(err: &ScanError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            is_fatal: err.is_fatal(),
        }
    }
}
