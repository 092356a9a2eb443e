use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// A "part" of a fix
pub type FixComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A single measurement as reported by the platform's fused provider
pub struct Fix {
    /// Latitude in degrees
    pub latitude: FixComponent,
    /// Longitude in degrees
    pub longitude: FixComponent,
    /// Heading in degrees (clockwise from north), the provider can't always determine this
    pub heading: Option<FixComponent>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
#[serde(rename_all = "camelCase")]
/// The payload handed to the host layer for both one-shot and watch results
pub struct Position {
    /// The fix itself
    pub coords: Fix,
    /// When the bridge took delivery of the fix
    pub timestamp: UtcDT,
}

impl Position {
    /// Wrap a fix with the current time, called at the moment of delivery
    pub fn now(coords: Fix) -> Self {
        Self {
            coords,
            timestamp: Utc::now(),
        }
    }
}
