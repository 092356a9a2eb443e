use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use pinpoint_logic::{Fix, RequestProfile, SettingsVerdict};

/// Device settings already satisfy the profile
pub const SETTINGS_SUCCESS: i32 = 0;
/// Settings fall short but the platform can prompt the user to fix them
pub const SETTINGS_RESOLUTION_REQUIRED: i32 = 6;
/// Settings can't be brought up to the profile on this device
pub const SETTINGS_CHANGE_UNAVAILABLE: i32 = 8502;

/// Map a raw settings status to a verdict. Statuses we don't recognize are
/// treated like [SETTINGS_CHANGE_UNAVAILABLE] rather than rejected.
pub(crate) fn verdict_from_status(status: i32) -> SettingsVerdict {
    match status {
        SETTINGS_SUCCESS => SettingsVerdict::Satisfied,
        SETTINGS_RESOLUTION_REQUIRED => SettingsVerdict::Resolvable,
        _ => SettingsVerdict::Unavailable,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Command sent down to the platform side of the session
pub enum SessionCommand {
    /// Open (or reopen) the connection to the location service
    Connect,
    /// Validate device settings against a profile, answered by
    /// [SessionEvent::SettingsChecked] carrying the same token
    CheckSettings { token: Uuid, profile: RequestProfile },
    /// Ask for the platform's cached fix, answered by [SessionEvent::LastKnown]
    QueryLastKnown { token: Uuid },
    /// Register the update listener, replacing any active registration
    StartUpdates { profile: RequestProfile },
    /// Drop the update listener
    StopUpdates,
    /// Tear the connection down for good
    Disconnect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Event pushed up from the platform side of the session
pub enum SessionEvent {
    /// The connection is up
    Connected,
    /// The connection dropped out, with the platform's cause code
    Suspended { cause: i32 },
    /// The connection attempt failed, with the platform's error code
    Failed { code: i32 },
    /// Answer to [SessionCommand::CheckSettings]
    SettingsChecked { token: Uuid, status: i32 },
    /// Answer to [SessionCommand::QueryLastKnown]
    LastKnown { token: Uuid, fix: Option<Fix> },
    /// A fix from the update listener
    FixUpdate(Fix),
}

/// The raw seam between [FusedClient](crate::FusedClient) and whatever is
/// actually talking to the vendor SDK. Commands go down, events come up, and
/// neither side assumes the other answers promptly.
pub trait FusedSession: Send + Sync + 'static {
    /// Hand a command to the platform side.
    fn submit(&self, cmd: SessionCommand) -> impl Future<Output = ()> + Send;

    /// Await the next batch of events from the platform side. An empty batch
    /// means the platform side is gone.
    fn poll_events(&self) -> impl Future<Output = Vec<SessionEvent>> + Send;
}

const QUEUE_DEPTH: usize = 32;
const MAX_EVENT_BATCH: usize = 16;

/// In-process [FusedSession] backed by a pair of queues. The platform shim
/// (or a desktop stand-in) drives the other end through [SessionDriver].
pub struct ChannelSession {
    commands: mpsc::Sender<SessionCommand>,
    events: Mutex<mpsc::Receiver<SessionEvent>>,
}

/// Platform-side handle of a [ChannelSession]
pub struct SessionDriver {
    commands: Mutex<mpsc::Receiver<SessionCommand>>,
    events: mpsc::Sender<SessionEvent>,
}

impl ChannelSession {
    pub fn pair() -> (Self, SessionDriver) {
        let (command_tx, command_rx) = mpsc::channel(QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel(QUEUE_DEPTH);

        (
            Self {
                commands: command_tx,
                events: Mutex::new(event_rx),
            },
            SessionDriver {
                commands: Mutex::new(command_rx),
                events: event_tx,
            },
        )
    }
}

impl FusedSession for ChannelSession {
    async fn submit(&self, cmd: SessionCommand) {
        // A gone driver is reported through poll_events, not here
        self.commands.send(cmd).await.ok();
    }

    async fn poll_events(&self) -> Vec<SessionEvent> {
        let mut events = self.events.lock().await;
        let mut buf = Vec::with_capacity(MAX_EVENT_BATCH);
        events.recv_many(&mut buf, MAX_EVENT_BATCH).await;
        buf
    }
}

impl SessionDriver {
    /// Next command from the client, or None once the client side is gone
    pub async fn next_command(&self) -> Option<SessionCommand> {
        self.commands.lock().await.recv().await
    }

    /// Push an event up to the client. Returns false when the client is gone.
    pub async fn push(&self, event: SessionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use tokio::test;

    use super::*;

    #[test]
    async fn test_status_mapping() {
        assert_eq!(verdict_from_status(SETTINGS_SUCCESS), SettingsVerdict::Satisfied);
        assert_eq!(
            verdict_from_status(SETTINGS_RESOLUTION_REQUIRED),
            SettingsVerdict::Resolvable
        );
        assert_eq!(
            verdict_from_status(SETTINGS_CHANGE_UNAVAILABLE),
            SettingsVerdict::Unavailable
        );
        // Unrecognized statuses fall through to unavailable
        assert_eq!(verdict_from_status(17), SettingsVerdict::Unavailable);
    }

    #[test]
    async fn test_channel_session_round_trip() {
        let (session, driver) = ChannelSession::pair();

        session.submit(SessionCommand::Connect).await;
        assert!(matches!(
            driver.next_command().await,
            Some(SessionCommand::Connect)
        ));

        assert!(driver.push(SessionEvent::Connected).await);
        let events = session.poll_events().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::Connected));
    }

    #[test]
    async fn test_poll_reports_gone_driver() {
        let (session, driver) = ChannelSession::pair();
        drop(driver);
        assert!(session.poll_events().await.is_empty());
    }
}
