use tokio::sync::mpsc;

use crate::{fix::Fix, prelude::*, profile::RequestProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of validating device settings against a [RequestProfile]
pub enum SettingsVerdict {
    /// Settings already satisfy the profile
    Satisfied,
    /// Settings fall short but the platform can prompt the user to fix that
    Resolvable,
    /// Settings can't be brought up to the profile on this device
    Unavailable,
}

/// Seam over the vendor location client. Implementations own the platform
/// connection and keep it alive for the life of the value.
pub trait LocationClient: Send + Sync {
    /// Ask the platform whether current device settings satisfy `profile`.
    /// Errors mean the question couldn't be asked at all, not a bad verdict.
    fn check_settings(
        &self,
        profile: &RequestProfile,
    ) -> impl Future<Output = Result<SettingsVerdict>> + Send;

    /// The platform's cached fix, if it has one. Never blocks on a new fix.
    fn last_known(&self) -> impl Future<Output = Option<Fix>> + Send;

    /// Register for a stream of fixes. The platform has a single listener
    /// slot, a new registration replaces the previous one and the replaced
    /// receiver sees its channel close.
    fn start_updates(
        &self,
        profile: &RequestProfile,
    ) -> impl Future<Output = mpsc::Receiver<Fix>> + Send;

    /// Unregister the active stream, if any.
    fn stop_updates(&self) -> impl Future<Output = ()> + Send;

    /// Tear down the platform connection.
    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
