use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Numeric code for failures the bridge can't classify
pub const ERROR_UNKNOWN: u8 = 0;
/// Numeric code for "no fix could be obtained for this request"
pub const ERROR_LOCATION_CANNOT_GET: u8 = 1;
/// Numeric code for "location services are off and the user declined to enable them"
pub const ERROR_LOCATION_SERVICE_DISABLED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Classification of a request-level failure
pub enum ErrorCode {
    /// Unclassified: an unexpected settings status or a prompt that couldn't launch
    Unknown,
    /// No fix could be obtained for this request
    CannotGet,
    /// Location services are disabled and the user declined to enable them
    ServiceDisabled,
}

impl ErrorCode {
    /// The numeric code the host layer keys its handling on.
    /// These values are a contract with existing callers, never renumber them.
    pub const fn code(self) -> u8 {
        match self {
            Self::Unknown => ERROR_UNKNOWN,
            Self::CannotGet => ERROR_LOCATION_CANNOT_GET,
            Self::ServiceDisabled => ERROR_LOCATION_SERVICE_DISABLED,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown error",
            Self::CannotGet => "Location could not be retrieved",
            Self::ServiceDisabled => "Location services are disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
/// A request-level failure handed to the host layer, carrying both the
/// numeric code and a human-readable message
pub struct BridgeError {
    pub code: u8,
    pub kind: ErrorCode,
    pub message: String,
}

impl BridgeError {
    /// Same as the [From] impl but with a message replacing the stock one
    pub fn with_message(kind: ErrorCode, message: String) -> Self {
        Self {
            code: kind.code(),
            kind,
            message,
        }
    }
}

impl From<ErrorCode> for BridgeError {
    fn from(kind: ErrorCode) -> Self {
        Self {
            code: kind.code(),
            kind,
            message: kind.message().to_string(),
        }
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}
