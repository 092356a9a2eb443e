mod fused;
mod session;

pub use fused::FusedClient;
pub use session::{
    ChannelSession, FusedSession, SETTINGS_CHANGE_UNAVAILABLE, SETTINGS_RESOLUTION_REQUIRED,
    SETTINGS_SUCCESS, SessionCommand, SessionDriver, SessionEvent,
};
