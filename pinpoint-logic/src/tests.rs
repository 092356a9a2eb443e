use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::anyhow;
use tokio::sync::{Mutex, mpsc};

use crate::{
    callbacks::PositionSink,
    client::{LocationClient, SettingsVerdict},
    codes::BridgeError,
    fix::{Fix, Position},
    prelude::*,
    profile::RequestProfile,
    resolution::{ResolutionToken, SettingsResolver},
};

pub fn mock_fix(latitude: f64) -> Fix {
    Fix {
        latitude,
        longitude: -122.08,
        heading: None,
    }
}

pub struct MockClient {
    verdicts: Mutex<VecDeque<Result<SettingsVerdict>>>,
    last_known: Mutex<Option<Fix>>,
    stream: Mutex<Option<mpsc::Sender<Fix>>>,
    disconnected: AtomicBool,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::default(),
            last_known: Mutex::default(),
            stream: Mutex::default(),
            disconnected: AtomicBool::new(false),
        })
    }

    pub async fn script_verdict(&self, verdict: SettingsVerdict) {
        self.verdicts.lock().await.push_back(Ok(verdict));
    }

    pub async fn script_check_failure(&self) {
        self.verdicts
            .lock()
            .await
            .push_back(Err(anyhow!("Scripted check failure")));
    }

    // Consumed on read so tests can tell a fresh query from a replay
    pub async fn put_last_known(&self, fix: Fix) {
        *self.last_known.lock().await = Some(fix);
    }

    pub async fn feed_fix(&self, fix: Fix) -> bool {
        let stream = self.stream.lock().await.clone();
        match stream {
            Some(tx) => tx.send(fix).await.is_ok(),
            None => false,
        }
    }

    pub async fn stream_active(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl LocationClient for MockClient {
    async fn check_settings(&self, _profile: &RequestProfile) -> Result<SettingsVerdict> {
        self.verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(SettingsVerdict::Satisfied))
    }

    async fn last_known(&self) -> Option<Fix> {
        self.last_known.lock().await.take()
    }

    async fn start_updates(&self, _profile: &RequestProfile) -> mpsc::Receiver<Fix> {
        let (tx, rx) = mpsc::channel(8);
        *self.stream.lock().await = Some(tx);
        rx
    }

    async fn stop_updates(&self) {
        *self.stream.lock().await = None;
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        *self.stream.lock().await = None;
    }
}

pub struct MockResolver {
    launches: mpsc::UnboundedSender<ResolutionToken>,
}

impl MockResolver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResolutionToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { launches: tx }, rx)
    }
}

impl SettingsResolver for MockResolver {
    fn launch(&self, token: ResolutionToken) -> Result {
        self.launches
            .send(token)
            .context("Test dropped the launch listener")
    }
}

pub struct FailingResolver;

impl SettingsResolver for FailingResolver {
    fn launch(&self, _token: ResolutionToken) -> Result {
        Err(anyhow!("No UI to prompt with"))
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    positions: Arc<std::sync::Mutex<Vec<Position>>>,
    errors: Arc<std::sync::Mutex<Vec<BridgeError>>>,
}

impl RecordingSink {
    pub fn positions(&self) -> Vec<Position> {
        self.positions.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<BridgeError> {
        self.errors.lock().unwrap().clone()
    }
}

impl PositionSink for RecordingSink {
    fn send_position(&self, position: Position) {
        self.positions.lock().unwrap().push(position);
    }

    fn send_error(&self, error: BridgeError) {
        self.errors.lock().unwrap().push(error);
    }
}
