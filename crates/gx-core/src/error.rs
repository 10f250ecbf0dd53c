//! Error types shared by every gx-viewer crate.
//!
//! Two layers are defined here:
//!
//! - [`SdkError`]: what a camera SDK binding reports for a single call. It
//!   carries an [`SdkErrorKind`] so callers can tell a dequeue timeout (which
//!   is retried) from a real device fault.
//! - [`GxError`]: the application taxonomy surfaced by the session controller
//!   and the acquisition loop.
//!
//! ## Error Policy
//!
//! - Open, configure and start failures are returned synchronously and leave
//!   the session in the state it had before the call.
//! - Mid-stream faults are reported asynchronously by the acquisition loop as
//!   [`GxError::AcquisitionError`]; the loop stops, the session falls back to
//!   `Open`.
//! - Nothing is retried automatically.

use thiserror::Error;

// =============================================================================
// SDK Errors
// =============================================================================

/// Classification of an SDK call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkErrorKind {
    /// Library or device could not be initialized.
    Initialization,
    /// Device index or handle does not refer to an open device.
    InvalidHandle,
    /// Link to the device was lost.
    Communication,
    /// A bounded wait elapsed without a result.
    Timeout,
    /// The device reported a hardware fault.
    Hardware,
    /// The parameter is not implemented by this device.
    NotImplemented,
    /// The call was rejected because of the current device mode.
    InvalidCall,
    /// Parameter value out of range.
    InvalidParameter,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for SdkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SdkErrorKind::Initialization => "initialization",
            SdkErrorKind::InvalidHandle => "invalid_handle",
            SdkErrorKind::Communication => "communication",
            SdkErrorKind::Timeout => "timeout",
            SdkErrorKind::Hardware => "hardware",
            SdkErrorKind::NotImplemented => "not_implemented",
            SdkErrorKind::InvalidCall => "invalid_call",
            SdkErrorKind::InvalidParameter => "invalid_parameter",
            SdkErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Failure of a single SDK call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("SDK {kind} error in '{operation}': {message}")]
pub struct SdkError {
    /// SDK entry point that failed (e.g. `dequeue_frame`).
    pub operation: &'static str,
    /// Failure class.
    pub kind: SdkErrorKind,
    /// Human readable description from the SDK.
    pub message: String,
}

impl SdkError {
    /// Build an error for `operation`.
    pub fn new(operation: &'static str, kind: SdkErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a timeout on `operation`.
    pub fn timeout(operation: &'static str) -> Self {
        Self::new(operation, SdkErrorKind::Timeout, "wait timed out")
    }

    /// True when the failure is a bounded-wait timeout rather than a fault.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == SdkErrorKind::Timeout
    }
}

// =============================================================================
// Application Errors
// =============================================================================

/// Convenience alias for results using the application error type.
pub type GxResult<T> = std::result::Result<T, GxError>;

/// Primary error type for gx-viewer.
#[derive(Error, Debug)]
pub enum GxError {
    /// The SDK refused to open the requested device.
    ///
    /// The session stays `Closed`.
    #[error("Failed to open device {index}: {source}")]
    DeviceOpenFailed {
        /// Index that was requested.
        index: u32,
        /// Underlying SDK failure.
        #[source]
        source: SdkError,
    },

    /// The device reports a payload size of zero, so no buffers can be sized.
    #[error("Set acquisition buffer number failed: payload size is 0")]
    ZeroPayload,

    /// Buffer sizing was asked for a zero payload.
    #[error("Invalid payload size: must be greater than 0")]
    InvalidPayload,

    /// Buffer pool allocation or acquisition thread start failed.
    ///
    /// Any partially acquired resource has already been released.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The acquisition loop stopped on a hard device fault.
    #[error("Acquisition error: {0}")]
    AcquisitionError(String),

    /// The operation is not valid in the current session state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State name at the time of the call.
        state: &'static str,
    },

    /// The device does not support the requested feature.
    #[error("Feature not supported by device: {0}")]
    Unsupported(&'static str),

    /// A raw frame failed validation and cannot be displayed.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Any other SDK call failure.
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// Writing a snapshot image failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GxError {
    /// Stable short name for logs and UI messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            GxError::DeviceOpenFailed { .. } => "device_open_failed",
            GxError::ZeroPayload => "zero_payload",
            GxError::InvalidPayload => "invalid_payload",
            GxError::ResourceExhausted(_) => "resource_exhausted",
            GxError::AcquisitionError(_) => "acquisition_error",
            GxError::InvalidState { .. } => "invalid_state",
            GxError::Unsupported(_) => "unsupported",
            GxError::InvalidFrame(_) => "invalid_frame",
            GxError::Sdk(_) => "sdk",
            GxError::Snapshot(_) => "snapshot",
            GxError::Configuration(_) => "configuration",
            GxError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_timeout_is_recognized() {
        let err = SdkError::timeout("dequeue_frame");
        assert!(err.is_timeout());
        assert_eq!(err.kind, SdkErrorKind::Timeout);

        let fault = SdkError::new("dequeue_frame", SdkErrorKind::Hardware, "sensor fault");
        assert!(!fault.is_timeout());
    }

    #[test]
    fn sdk_error_display_includes_operation_and_kind() {
        let err = SdkError::new("stream_on", SdkErrorKind::Communication, "link down");
        let text = err.to_string();
        assert!(text.contains("stream_on"));
        assert!(text.contains("communication"));
        assert!(text.contains("link down"));
    }

    #[test]
    fn open_failure_keeps_source() {
        let err = GxError::DeviceOpenFailed {
            index: 2,
            source: SdkError::new("open", SdkErrorKind::InvalidHandle, "no such device"),
        };
        assert_eq!(err.kind_name(), "device_open_failed");
        assert!(err.to_string().contains("device 2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn sdk_error_converts_with_question_mark() {
        fn call() -> GxResult<()> {
            Err(SdkError::new("stream_off", SdkErrorKind::Hardware, "busy"))?;
            Ok(())
        }
        assert!(matches!(call(), Err(GxError::Sdk(_))));
    }
}
