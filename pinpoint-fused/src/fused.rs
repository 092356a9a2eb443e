use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, anyhow};
use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pinpoint_logic::{Fix, LocationClient, RequestProfile, SettingsVerdict, prelude::*};

use crate::session::{self, FusedSession, SessionCommand, SessionEvent};

type VerdictTx = oneshot::Sender<SettingsVerdict>;
type FixQueryTx = oneshot::Sender<Option<Fix>>;

const FIX_QUEUE_DEPTH: usize = 8;

/// Client for the platform's fused location provider. Owns the session pump
/// and keeps the connection alive: suspensions reconnect unconditionally and
/// connection-level failures are logged without failing whatever is in
/// flight. Answers are matched to callers by token, so overlapping requests
/// can't steal each other's replies.
pub struct FusedClient<S: FusedSession> {
    session: S,
    pending_checks: Mutex<HashMap<Uuid, VerdictTx>>,
    pending_queries: Mutex<HashMap<Uuid, FixQueryTx>>,
    /// The single update listener slot
    updates: Mutex<Option<mpsc::Sender<Fix>>>,
    /// Token whose LastKnown answer re-primes the cache instead of a caller
    prime_token: Mutex<Option<Uuid>>,
    /// Platform cache snapshot taken on reconnect, consumed by last_known
    primed: Mutex<Option<Fix>>,
    cancel_token: CancellationToken,
}

impl<S: FusedSession> FusedClient<S> {
    /// Connect to the location service and spawn the session pump. Doesn't
    /// hand the client out until the platform reports the connection up.
    pub async fn connect(session: S) -> Result<Arc<Self>> {
        session.submit(SessionCommand::Connect).await;

        // Events racing ahead of the handshake get replayed after it
        let mut parked = Vec::new();
        let res = 'handshake: loop {
            let events = session.poll_events().await;
            if events.is_empty() {
                break Err(anyhow!("Session closed before the connection came up"));
            }

            let mut connected = false;
            for event in events {
                match event {
                    SessionEvent::Connected if !connected => connected = true,
                    SessionEvent::Failed { code } if !connected => {
                        break 'handshake Err(anyhow!("Connection failed with code {code}"));
                    }
                    other => parked.push(other),
                }
            }

            if connected {
                break Ok(());
            }
        };
        res.context("While connecting to location services")?;

        let client = Arc::new(Self {
            session,
            pending_checks: Mutex::default(),
            pending_queries: Mutex::default(),
            updates: Mutex::default(),
            prime_token: Mutex::default(),
            primed: Mutex::default(),
            cancel_token: CancellationToken::new(),
        });

        tokio::spawn({
            let client = client.clone();
            async move {
                client.pump(parked).await;
            }
        });

        Ok(client)
    }

    async fn pump(&self, parked: Vec<SessionEvent>) {
        for event in parked {
            self.consume_event(event).await;
        }

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    self.session.submit(SessionCommand::Disconnect).await;
                    break;
                }

                events = self.session.poll_events() => {
                    if events.is_empty() {
                        warn!("Location session closed from the platform side");
                        break;
                    }
                    for event in events {
                        self.consume_event(event).await;
                    }
                }
            }
        }

        self.cancel_token.cancel();
        self.drain_pending().await;
    }

    async fn consume_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                info!("Location services connected");
                // Snapshot the platform cache like the first connect did, the
                // answer comes back tagged with the prime token
                let token = Uuid::new_v4();
                *self.prime_token.lock().await = Some(token);
                self.session
                    .submit(SessionCommand::QueryLastKnown { token })
                    .await;
            }
            SessionEvent::Suspended { cause } => {
                // Reconnect right away, the platform owns any further pacing
                info!("Location services connection suspended (cause {cause}), reconnecting");
                self.session.submit(SessionCommand::Connect).await;
            }
            SessionEvent::Failed { code } => {
                // Connection-level failures never fail a request, requests
                // keep waiting until the connection comes back
                error!("Location services connection failed: code {code}");
            }
            SessionEvent::SettingsChecked { token, status } => {
                if let Some(tx) = self.pending_checks.lock().await.remove(&token) {
                    tx.send(session::verdict_from_status(status)).ok();
                } else {
                    warn!("Settings verdict for unknown token {token}");
                }
            }
            SessionEvent::LastKnown { token, fix } => {
                if self
                    .prime_token
                    .lock()
                    .await
                    .take_if(|prime| *prime == token)
                    .is_some()
                {
                    *self.primed.lock().await = fix;
                } else if let Some(tx) = self.pending_queries.lock().await.remove(&token) {
                    tx.send(fix).ok();
                } else {
                    warn!("Cached fix answer for unknown token {token}");
                }
            }
            SessionEvent::FixUpdate(fix) => {
                let updates = self.updates.lock().await.clone();
                if let Some(tx) = updates {
                    // A full queue drops the fix, the stream only promises freshness
                    tx.try_send(fix).ok();
                }
            }
        }
    }

    /// Wake everything still waiting on the pump so nothing hangs across a
    /// dead session
    async fn drain_pending(&self) {
        self.pending_checks.lock().await.clear();
        self.pending_queries.lock().await.clear();
        *self.updates.lock().await = None;
    }
}

impl<S: FusedSession> LocationClient for FusedClient<S> {
    async fn check_settings(&self, profile: &RequestProfile) -> Result<SettingsVerdict> {
        if self.cancel_token.is_cancelled() {
            return Err(anyhow!("Location services connection is closed"));
        }

        let token = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending_checks.lock().await.insert(token, tx);
        self.session
            .submit(SessionCommand::CheckSettings {
                token,
                profile: *profile,
            })
            .await;

        rx.await.context("Settings check went unanswered")
    }

    async fn last_known(&self) -> Option<Fix> {
        if let Some(fix) = self.primed.lock().await.take() {
            return Some(fix);
        }

        if self.cancel_token.is_cancelled() {
            return None;
        }

        let token = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending_queries.lock().await.insert(token, tx);
        self.session
            .submit(SessionCommand::QueryLastKnown { token })
            .await;

        rx.await.unwrap_or(None)
    }

    async fn start_updates(&self, profile: &RequestProfile) -> mpsc::Receiver<Fix> {
        let (tx, rx) = mpsc::channel(FIX_QUEUE_DEPTH);

        if !self.cancel_token.is_cancelled() {
            // Single listener slot, the replaced stream's sender drops here
            *self.updates.lock().await = Some(tx);
            self.session
                .submit(SessionCommand::StartUpdates { profile: *profile })
                .await;
        }

        rx
    }

    async fn stop_updates(&self) {
        *self.updates.lock().await = None;
        self.session.submit(SessionCommand::StopUpdates).await;
    }

    async fn disconnect(&self) {
        self.cancel_token.cancel();
    }
}
