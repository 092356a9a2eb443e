use serde::{Deserialize, Serialize};

/// Interval for one-shot requests. The fused provider treats these as mostly
/// passive, piggybacking on whatever other apps have asked for, so the
/// interval is deliberately long.
const fn one_shot_interval_ms() -> u64 {
    if let Some(ms) = option_env!("PINPOINT_INTERVAL_MS") {
        const_str::parse!(ms, u64)
    } else {
        30 * 60 * 1000
    }
}

/// Interval for watch registrations, which the UI expects to feel live
const fn watch_interval_ms() -> u64 {
    if let Some(ms) = option_env!("PINPOINT_WATCH_INTERVAL_MS") {
        const_str::parse!(ms, u64)
    } else {
        2000
    }
}

const ONE_SHOT_INTERVAL_MS: u64 = one_shot_interval_ms();
const WATCH_INTERVAL_MS: u64 = watch_interval_ms();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// How aggressively the platform should source fixes
pub enum AccuracyPriority {
    /// GPS and other high-power sources
    High,
    /// Trade precision for battery
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// The accuracy/interval profile a request asks the platform to satisfy.
/// Also what device settings get validated against before any fix is served.
pub struct RequestProfile {
    /// Preferred milliseconds between fixes
    pub interval_ms: u64,
    /// Floor on milliseconds between fixes when other apps request faster updates
    pub fastest_interval_ms: u64,
    /// Source priority
    pub priority: AccuracyPriority,
}

impl RequestProfile {
    pub fn from_watch_options(options: &WatchOptions) -> Self {
        Self {
            interval_ms: options.interval_ms,
            fastest_interval_ms: options.interval_ms / 2,
            priority: if options.enable_high_accuracy {
                AccuracyPriority::High
            } else {
                AccuracyPriority::Balanced
            },
        }
    }
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            interval_ms: ONE_SHOT_INTERVAL_MS,
            fastest_interval_ms: ONE_SHOT_INTERVAL_MS / 2,
            priority: AccuracyPriority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase", default)]
/// Options the host layer may pass when registering a watch
pub struct WatchOptions {
    /// Ask for GPS-grade fixes, when false the platform may serve cheaper sources
    pub enable_high_accuracy: bool,
    /// Preferred milliseconds between stream fixes
    pub interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            interval_ms: WATCH_INTERVAL_MS,
        }
    }
}
