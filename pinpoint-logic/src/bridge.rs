use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    callbacks::PositionSink,
    client::{LocationClient, SettingsVerdict},
    codes::{BridgeError, ErrorCode},
    fix::{Fix, Position},
    profile::{RequestProfile, WatchOptions},
    resolution::{ActivityResults, ResolutionOutcome, SettingsResolver},
};

/// A one-shot request occupying the single in-flight slot
struct PendingRequest {
    id: Uuid,
    cancel: CancellationToken,
}

/// The active watch. The stream is taken by [LocationBridge::watch_loop],
/// the token stays behind so the watch can be cleared.
struct WatchRegistration {
    cancel: CancellationToken,
    stream: Option<mpsc::Receiver<Fix>>,
}

/// Adapter between the platform's fused location services and the host
/// runtime's request/response conventions.
///
/// One-shot requests resolve as futures, watch fixes flow through the bound
/// [PositionSink]. Device settings are validated against the request's
/// [RequestProfile] before any fix is served, and when the platform reports
/// the shortfall as fixable the user is prompted through the
/// [SettingsResolver] first.
///
/// Requests never time out on their own. They end with a fix, a
/// [BridgeError], or by being superseded or closed.
pub struct LocationBridge<C: LocationClient, R: SettingsResolver, S: PositionSink> {
    client: Arc<C>,
    resolver: R,
    sink: Mutex<Option<Arc<S>>>,
    /// Built on the first request that needs it, then reused
    profile: OnceLock<RequestProfile>,
    /// Consumed by the next one-shot before the platform is consulted
    last_fix: Mutex<Option<Fix>>,
    pending: Mutex<Option<PendingRequest>>,
    watch: Mutex<Option<WatchRegistration>>,
    results: Arc<ActivityResults>,
    closed: CancellationToken,
}

impl<C: LocationClient, R: SettingsResolver, S: PositionSink> LocationBridge<C, R, S> {
    /// Put the bridge in front of an already-connected client.
    /// Primes the fix cache from the platform so the first one-shot can be
    /// answered without waiting on a fresh fix.
    pub async fn open(client: Arc<C>, resolver: R) -> Arc<Self> {
        let bridge = Arc::new(Self {
            client,
            resolver,
            sink: Mutex::new(None),
            profile: OnceLock::new(),
            last_fix: Mutex::new(None),
            pending: Mutex::new(None),
            watch: Mutex::new(None),
            results: Arc::new(ActivityResults::default()),
            closed: CancellationToken::new(),
        });

        let primed = bridge.client.last_known().await;
        *bridge.last_fix.lock().await = primed;

        bridge
    }

    /// Bind (or replace) the callbacks watch results are delivered through.
    /// Fixes streamed while no sink is bound are dropped.
    pub async fn set_callbacks(&self, sink: S) {
        *self.sink.lock().await = Some(Arc::new(sink));
    }

    /// Router for the activity results that settings-resolution prompts
    /// produce. The host layer feeds outcomes in here.
    pub fn activity_results(&self) -> Arc<ActivityResults> {
        self.results.clone()
    }

    /// Resolve a single fix. Waits as long as it takes for the settings
    /// check, the user prompt, and the fix itself; the only early exits are
    /// a newer one-shot claiming the slot or the bridge closing, both of
    /// which resolve this request with [ErrorCode::CannotGet].
    pub async fn current_position(&self) -> Result<Position, BridgeError> {
        if self.closed.is_cancelled() {
            return Err(ErrorCode::CannotGet.into());
        }

        let id = Uuid::new_v4();
        let cancel = self.closed.child_token();
        {
            let mut pending = self.pending.lock().await;
            if let Some(prev) = pending.replace(PendingRequest {
                id,
                cancel: cancel.clone(),
            }) {
                prev.cancel.cancel();
            }
        }

        let res = tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ErrorCode::CannotGet.into()),

            res = self.acquire_position() => res,
        };

        // Release the slot unless a newer request already claimed it
        let mut pending = self.pending.lock().await;
        if pending.as_ref().is_some_and(|request| request.id == id) {
            *pending = None;
        }

        res
    }

    /// Register a watch. On success the fix stream is parked in the
    /// registration and [Self::watch_loop] is expected to be spawned to
    /// drain it. A previous watch is replaced outright.
    ///
    /// Settings failures go to the error callback as well as the returned
    /// error, watches report through the sink once they're running.
    pub async fn watch_position(&self, options: WatchOptions) -> Result<(), BridgeError> {
        if self.closed.is_cancelled() {
            return Err(ErrorCode::CannotGet.into());
        }

        let profile = RequestProfile::from_watch_options(&options);
        if let Err(err) = self.gate_settings(&profile).await {
            self.send_error(err.clone()).await;
            return Err(err);
        }

        let stream = self.client.start_updates(&profile).await;
        let cancel = self.closed.child_token();

        let mut watch = self.watch.lock().await;
        if let Some(prev) = watch.replace(WatchRegistration {
            cancel,
            stream: Some(stream),
        }) {
            prev.cancel.cancel();
        }

        Ok(())
    }

    /// Forward stream fixes to the bound callbacks until the watch is
    /// cleared, replaced, or the bridge closes. Spawn this right after
    /// [Self::watch_position] returns Ok.
    pub async fn watch_loop(&self) {
        let Some((cancel, mut stream)) = self.claim_watch_stream().await else {
            return;
        };

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                fix = stream.recv() => match fix {
                    Some(fix) => self.send_position(Position::now(fix)).await,
                    // The platform replaced or dropped the listener slot
                    None => break,
                },
            }
        }
    }

    /// Drop the active watch. Safe to call when nothing is registered, a
    /// cleared watch never invokes the callbacks again.
    pub async fn clear_watch(&self) {
        let registration = self.watch.lock().await.take();
        if let Some(registration) = registration {
            registration.cancel.cancel();
            self.client.stop_updates().await;
        }
    }

    /// Tear the bridge down. In-flight one-shots resolve with
    /// [ErrorCode::CannotGet], the watch stops, and the platform connection
    /// is released. Further requests fail immediately.
    pub async fn close(&self) {
        self.closed.cancel();
        self.clear_watch().await;
        *self.pending.lock().await = None;
        self.client.disconnect().await;
    }

    /// The profile one-shots are validated and served under
    fn request_profile(&self) -> &RequestProfile {
        self.profile.get_or_init(RequestProfile::default)
    }

    async fn acquire_position(&self) -> Result<Position, BridgeError> {
        let profile = self.request_profile();
        self.gate_settings(profile).await?;
        self.fetch_fix(profile).await
    }

    /// Validate device settings against `profile`, prompting the user when
    /// the platform says the shortfall is fixable
    async fn gate_settings(&self, profile: &RequestProfile) -> Result<(), BridgeError> {
        match self.client.check_settings(profile).await {
            Ok(SettingsVerdict::Satisfied) => Ok(()),
            Ok(SettingsVerdict::Resolvable) => match self.resolve_settings().await {
                ResolutionOutcome::Enabled => Ok(()),
                ResolutionOutcome::Declined => Err(ErrorCode::ServiceDisabled.into()),
                ResolutionOutcome::Failed => Err(ErrorCode::Unknown.into()),
            },
            // No dedicated code was ever allocated for this status, it
            // surfaces as Unknown
            Ok(SettingsVerdict::Unavailable) => Err(ErrorCode::Unknown.into()),
            Err(why) => Err(BridgeError::with_message(
                ErrorCode::Unknown,
                format!("Settings check failed: {why}"),
            )),
        }
    }

    /// Run one settings-resolution prompt and wait for the user's answer
    async fn resolve_settings(&self) -> ResolutionOutcome {
        let token = Uuid::new_v4();
        let outcome = self.results.expect(token).await;

        if let Err(why) = self.resolver.launch(token) {
            self.results.forget(token).await;
            eprintln!("Couldn't launch the settings resolution prompt: {why:?}");
            return ResolutionOutcome::Failed;
        }

        // No deadline here, the prompt stays up until the user answers it
        outcome.await.unwrap_or(ResolutionOutcome::Failed)
    }

    /// Produce one fix: the bridge cache first, then the platform's cache,
    /// then a temporary stream registration for a single fresh fix
    async fn fetch_fix(&self, profile: &RequestProfile) -> Result<Position, BridgeError> {
        // Consumed on read so a later request can't replay it
        if let Some(cached) = self.last_fix.lock().await.take() {
            return Ok(Position::now(cached));
        }

        if let Some(fresh) = self.client.last_known().await {
            return Ok(Position::now(fresh));
        }

        let mut stream = self.client.start_updates(profile).await;
        let fix = stream.recv().await;
        self.client.stop_updates().await;

        fix.map(Position::now)
            .ok_or_else(|| ErrorCode::CannotGet.into())
    }

    async fn claim_watch_stream(&self) -> Option<(CancellationToken, mpsc::Receiver<Fix>)> {
        let mut watch = self.watch.lock().await;
        let registration = watch.as_mut()?;
        let stream = registration.stream.take()?;
        Some((registration.cancel.clone(), stream))
    }

    async fn send_position(&self, position: Position) {
        let sink = self.sink.lock().await.clone();
        if let Some(sink) = sink {
            sink.send_position(position);
        }
    }

    async fn send_error(&self, error: BridgeError) {
        let sink = self.sink.lock().await.clone();
        if let Some(sink) = sink {
            sink.send_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::{sync::mpsc, task::yield_now, test};

    use super::*;
    use crate::{
        ResolutionToken,
        tests::{FailingResolver, MockClient, MockResolver, RecordingSink, mock_fix},
    };

    async fn mk_bridge(
        client: Arc<MockClient>,
    ) -> (
        Arc<LocationBridge<MockClient, MockResolver, RecordingSink>>,
        mpsc::UnboundedReceiver<ResolutionToken>,
    ) {
        let (resolver, launches) = MockResolver::new();
        let bridge = LocationBridge::open(client, resolver).await;
        (bridge, launches)
    }

    #[test]
    async fn test_cached_fix_resolves_one_shot() {
        let client = MockClient::new();
        client.put_last_known(mock_fix(37.0)).await;

        let (bridge, _launches) = mk_bridge(client.clone()).await;

        let position = bridge.current_position().await.unwrap();
        assert_eq!(position.coords.latitude, 37.0);
        // Served from the primed cache, the stream was never touched
        assert!(!client.stream_active().await);
    }

    #[test]
    async fn test_fresh_fix_when_cache_consumed() {
        let client = MockClient::new();
        client.put_last_known(mock_fix(1.0)).await;

        let (bridge, _launches) = mk_bridge(client.clone()).await;

        let first = bridge.current_position().await.unwrap();
        assert_eq!(first.coords.latitude, 1.0);

        // The cache was consumed, so the second request has to go to the
        // platform and wait on a fresh fix instead of replaying the old one
        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.current_position().await }
        });
        yield_now().await;
        assert!(client.stream_active().await);
        assert!(client.feed_fix(mock_fix(2.0)).await);

        let second = second.await.unwrap().unwrap();
        assert_eq!(second.coords.latitude, 2.0);
        // Single-fix registrations are dropped once served
        assert!(!client.stream_active().await);
    }

    #[test]
    async fn test_unresolvable_settings_is_unknown() {
        let client = MockClient::new();
        client.put_last_known(mock_fix(5.0)).await;

        let (bridge, _launches) = mk_bridge(client.clone()).await;
        client.script_verdict(SettingsVerdict::Unavailable).await;

        let err = bridge.current_position().await.unwrap_err();
        assert_eq!(err.kind, ErrorCode::Unknown);
        assert_eq!(err.code, 0);

        // The failed attempt must not have eaten the cached fix
        let position = bridge.current_position().await.unwrap();
        assert_eq!(position.coords.latitude, 5.0);
    }

    #[test]
    async fn test_settings_check_failure_is_unknown() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;
        client.script_check_failure().await;

        let err = bridge.current_position().await.unwrap_err();
        assert_eq!(err.kind, ErrorCode::Unknown);
        assert!(err.message.contains("Settings check failed"));
    }

    #[test]
    async fn test_declined_resolution_is_service_disabled() {
        let client = MockClient::new();
        let (bridge, mut launches) = mk_bridge(client.clone()).await;
        client.script_verdict(SettingsVerdict::Resolvable).await;

        let request = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.current_position().await }
        });
        yield_now().await;

        let token = launches.recv().await.unwrap();
        assert!(
            bridge
                .activity_results()
                .deliver(token, ResolutionOutcome::Declined)
                .await
        );

        let err = request.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorCode::ServiceDisabled);
        assert_eq!(err.code, 2);
    }

    #[test]
    async fn test_granted_resolution_proceeds_to_fix() {
        let client = MockClient::new();
        client.put_last_known(mock_fix(12.0)).await;

        let (bridge, mut launches) = mk_bridge(client.clone()).await;
        client.script_verdict(SettingsVerdict::Resolvable).await;

        let request = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.current_position().await }
        });
        yield_now().await;

        let token = launches.recv().await.unwrap();
        bridge
            .activity_results()
            .deliver(token, ResolutionOutcome::Enabled)
            .await;

        let position = request.await.unwrap().unwrap();
        assert_eq!(position.coords.latitude, 12.0);
    }

    #[test]
    async fn test_failed_prompt_launch_is_unknown() {
        let client = MockClient::new();
        client.script_verdict(SettingsVerdict::Resolvable).await;

        let bridge = LocationBridge::open(client, FailingResolver).await;
        bridge.set_callbacks(RecordingSink::default()).await;

        let err = bridge.current_position().await.unwrap_err();
        assert_eq!(err.kind, ErrorCode::Unknown);
    }

    #[test]
    async fn test_newer_one_shot_supersedes_older() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;

        let first = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.current_position().await }
        });
        yield_now().await;

        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.current_position().await }
        });
        yield_now().await;

        assert!(client.feed_fix(mock_fix(9.0)).await);

        let first = first.await.unwrap().unwrap_err();
        assert_eq!(first.kind, ErrorCode::CannotGet);
        assert_eq!(first.code, 1);

        let second = second.await.unwrap().unwrap();
        assert_eq!(second.coords.latitude, 9.0);
    }

    #[test]
    async fn test_watch_streams_to_sink_in_order() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;
        let sink = RecordingSink::default();
        bridge.set_callbacks(sink.clone()).await;

        bridge.watch_position(WatchOptions::default()).await.unwrap();
        let forward = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.watch_loop().await }
        });
        yield_now().await;

        assert!(client.feed_fix(mock_fix(1.0)).await);
        assert!(client.feed_fix(mock_fix(2.0)).await);
        assert!(client.feed_fix(mock_fix(3.0)).await);
        for _ in 0..4 {
            yield_now().await;
        }

        let positions = sink.positions();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].coords.latitude, 1.0);
        assert_eq!(positions[1].coords.latitude, 2.0);
        assert_eq!(positions[2].coords.latitude, 3.0);

        bridge.clear_watch().await;
        // Once cleared, the platform slot is gone and nothing more arrives
        assert!(!client.feed_fix(mock_fix(4.0)).await);
        forward.await.unwrap();
        assert_eq!(sink.positions().len(), 3);
    }

    #[test]
    async fn test_new_watch_replaces_old() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;
        let sink = RecordingSink::default();
        bridge.set_callbacks(sink.clone()).await;

        bridge.watch_position(WatchOptions::default()).await.unwrap();
        let first_loop = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.watch_loop().await }
        });
        yield_now().await;
        assert!(client.feed_fix(mock_fix(1.0)).await);
        yield_now().await;

        bridge
            .watch_position(WatchOptions {
                enable_high_accuracy: false,
                interval_ms: 1000,
            })
            .await
            .unwrap();
        // The first forwarder ends when its registration is replaced
        first_loop.await.unwrap();

        let second_loop = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.watch_loop().await }
        });
        yield_now().await;
        assert!(client.feed_fix(mock_fix(2.0)).await);
        for _ in 0..4 {
            yield_now().await;
        }

        let positions = sink.positions();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1].coords.latitude, 2.0);

        bridge.clear_watch().await;
        second_loop.await.unwrap();
    }

    #[test]
    async fn test_watch_settings_error_hits_sink() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;
        let sink = RecordingSink::default();
        bridge.set_callbacks(sink.clone()).await;

        client.script_verdict(SettingsVerdict::Unavailable).await;
        let err = bridge
            .watch_position(WatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorCode::Unknown);

        assert_eq!(sink.errors().len(), 1);
        assert!(sink.positions().is_empty());
        assert!(!client.stream_active().await);
    }

    #[test]
    async fn test_unbound_sink_drops_fixes() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;

        bridge.watch_position(WatchOptions::default()).await.unwrap();
        let forward = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.watch_loop().await }
        });
        yield_now().await;

        // Nothing bound yet, this one vanishes
        assert!(client.feed_fix(mock_fix(1.0)).await);
        for _ in 0..4 {
            yield_now().await;
        }

        let sink = RecordingSink::default();
        bridge.set_callbacks(sink.clone()).await;
        assert!(client.feed_fix(mock_fix(2.0)).await);
        for _ in 0..4 {
            yield_now().await;
        }

        let positions = sink.positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].coords.latitude, 2.0);

        bridge.clear_watch().await;
        forward.await.unwrap();
    }

    #[test]
    async fn test_close_tears_everything_down() {
        let client = MockClient::new();
        let (bridge, _launches) = mk_bridge(client.clone()).await;
        let sink = RecordingSink::default();
        bridge.set_callbacks(sink.clone()).await;

        bridge.watch_position(WatchOptions::default()).await.unwrap();
        let forward = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.watch_loop().await }
        });
        yield_now().await;
        assert!(client.feed_fix(mock_fix(1.0)).await);
        for _ in 0..4 {
            yield_now().await;
        }

        bridge.close().await;
        forward.await.unwrap();
        assert!(client.is_disconnected());
        assert!(!client.feed_fix(mock_fix(2.0)).await);

        let err = bridge.current_position().await.unwrap_err();
        assert_eq!(err.kind, ErrorCode::CannotGet);
        assert_eq!(sink.positions().len(), 1);
    }
}
