//! Error types
//!
//! Every fallible operation on the control plane returns [`DevCtlError`].
//! Device capability implementations report failures with [`DeviceError`],
//! and the control-request codec uses [`ControlError`].

use crate::routing::ClientType;

/// Result alias for control-plane operations
pub type Result<T> = std::result::Result<T, DevCtlError>;

/// Errors returned by control-plane operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DevCtlError {
    /// Unknown device or listener
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Session id beyond the per-kind capacity, or an unknown device in a route
    #[error("{what} {id} out of range")]
    OutOfRange {
        /// What the id names ("decoder session", "device", ...)
        what: &'static str,
        /// Offending id
        id: u32,
    },

    /// Device capabilities do not allow the requested route
    #[error("device {device_id} cannot carry this route")]
    InvalidDevice {
        /// Device that was rejected
        device_id: u32,
    },

    /// Sample rate outside the supported set
    #[error("unsupported sample rate {0}Hz")]
    InvalidRate(u32),

    /// Device is shared across client types and cannot move to this rate
    #[error("device {device_id} is shared across client types, cannot switch to {rate}Hz")]
    RateConflict {
        /// Device that refused the rate
        device_id: u32,
        /// Requested rate
        rate: u32,
    },

    /// Voice rx or tx device is not routed
    #[error("voice route not configured")]
    NoVoiceRoute,

    /// Device table is full
    #[error("device table full ({0} devices)")]
    CapacityExceeded(usize),

    /// Device does not implement the requested capability
    #[error("device {device_id} does not support this operation")]
    Unsupported {
        /// Device that lacks the capability
        device_id: u32,
    },

    /// Listener allocation failed
    #[error("out of memory")]
    OutOfMemory,

    /// Malformed argument on the control surface
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A device capability call failed
    #[error("device {device_id} failed: {source}")]
    Device {
        /// Device whose capability call failed
        device_id: u32,
        /// Failure reported by the device
        #[source]
        source: DeviceError,
    },
}

impl DevCtlError {
    /// Session id outside the capacity of its client type
    pub fn session_out_of_range(client_type: ClientType, session_id: u32) -> Self {
        let what = match client_type {
            ClientType::Voice => "voice session",
            ClientType::Decoder => "decoder session",
            ClientType::Encoder => "encoder session",
            ClientType::Calibration => "calibration session",
        };
        DevCtlError::OutOfRange {
            what,
            id: session_id,
        }
    }

    /// Negative status code used on the control wire format
    pub fn status_code(&self) -> i32 {
        match self {
            DevCtlError::RateConflict { .. } => -1,
            DevCtlError::Device { .. } => -5,
            DevCtlError::OutOfMemory => -12,
            DevCtlError::NotFound(_) => -19,
            DevCtlError::InvalidDevice { .. } => -22,
            DevCtlError::CapacityExceeded(_) => -28,
            DevCtlError::InvalidRate(_) => -33,
            DevCtlError::OutOfRange { .. } => -34,
            DevCtlError::NoVoiceRoute => -61,
            DevCtlError::InvalidArgument(_) => -71,
            DevCtlError::Unsupported { .. } => -95,
        }
    }
}

/// Failure reported by a device capability implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The device has no implementation of this capability
    #[error("capability not implemented")]
    Unsupported,

    /// The hardware operation failed
    #[error("{reason}")]
    Failed {
        /// Description of the failure
        reason: String,
    },
}

impl DeviceError {
    /// Creates a failure with the given reason
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Errors decoding or encoding control-surface messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// Message ended before all fields were read
    #[error("unexpected end of message")]
    UnexpectedEof,

    /// Command code not recognised
    #[error("unknown command {0}")]
    UnknownCommand(u32),

    /// Stream type not recognised
    #[error("unknown stream type {0}")]
    UnknownStreamType(u32),

    /// Bytes left over after the last field
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// The peer answered with a non-zero status
    #[error("request rejected with status {0}")]
    Rejected(i32),
}
