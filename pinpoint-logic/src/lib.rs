mod bridge;
mod callbacks;
mod client;
mod codes;
mod fix;
mod profile;
mod resolution;
#[cfg(test)]
mod tests;

pub use bridge::LocationBridge;
pub use callbacks::PositionSink;
pub use client::{LocationClient, SettingsVerdict};
pub use codes::{
    BridgeError, ERROR_LOCATION_CANNOT_GET, ERROR_LOCATION_SERVICE_DISABLED, ERROR_UNKNOWN,
    ErrorCode,
};
pub use fix::{Fix, FixComponent, Position, UtcDT};
pub use profile::{AccuracyPriority, RequestProfile, WatchOptions};
pub use resolution::{ActivityResults, ResolutionOutcome, ResolutionToken, SettingsResolver};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
