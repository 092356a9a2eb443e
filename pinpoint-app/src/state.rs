use std::sync::Arc;

use anyhow::Context;
use log::error;
use pinpoint_fused::{ChannelSession, FusedClient, SessionDriver};
use pinpoint_logic::{
    BridgeError, LocationBridge as BaseBridge, Position, PositionSink, ResolutionToken,
    SettingsResolver, prelude::Result as LogicResult,
};
use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_specta::Event;
use tokio::sync::RwLock;

use crate::Result;

/// A new fix from the active watch
#[derive(Serialize, Deserialize, Clone, Debug, specta::Type, tauri_specta::Event)]
pub struct PositionUpdate(pub Position);

/// A request-level failure from the active watch
#[derive(Serialize, Deserialize, Clone, Debug, specta::Type, tauri_specta::Event)]
pub struct PositionError(pub BridgeError);

/// The UI should run the platform's enable-location flow and report back
/// through [complete_resolution](crate::complete_resolution) with this token
#[derive(Serialize, Deserialize, Clone, Debug, specta::Type, tauri_specta::Event)]
pub struct ResolutionPrompt {
    pub token: ResolutionToken,
}

pub struct TauriPositionSink(AppHandle);

impl PositionSink for TauriPositionSink {
    fn send_position(&self, position: Position) {
        if let Err(why) = PositionUpdate(position).emit(&self.0) {
            error!("Error sending position update to UI: {why:?}");
        }
    }

    fn send_error(&self, error: BridgeError) {
        if let Err(why) = PositionError(error).emit(&self.0) {
            error!("Error sending position error to UI: {why:?}");
        }
    }
}

pub struct TauriResolver(AppHandle);

impl SettingsResolver for TauriResolver {
    fn launch(&self, token: ResolutionToken) -> LogicResult {
        ResolutionPrompt { token }
            .emit(&self.0)
            .context("Failed to hand the resolution prompt to the UI")
    }
}

type Client = FusedClient<ChannelSession>;
pub type Bridge = BaseBridge<Client, TauriResolver, TauriPositionSink>;

pub enum AppState {
    /// The platform session isn't wired up yet
    Starting,
    Ready(Arc<Bridge>),
}

pub type AppStateHandle = RwLock<AppState>;

pub fn error_dialog(app: &AppHandle, msg: &str) {
    app.dialog()
        .message(msg)
        .kind(MessageDialogKind::Error)
        .show(|_| {});
}

impl AppState {
    pub fn get_bridge(&self) -> Result<Arc<Bridge>> {
        if let AppState::Ready(bridge) = self {
            Ok(bridge.clone())
        } else {
            Err("Location bridge is not ready".to_string())
        }
    }

    /// Wire the session to the platform, connect the client, and open the
    /// bridge with the UI-facing callbacks already bound
    pub async fn initialize(app: &AppHandle) -> LogicResult<Arc<Bridge>> {
        let (session, driver) = ChannelSession::pair();
        attach_platform(driver);

        let client = Client::connect(session).await?;
        let bridge = Bridge::open(client, TauriResolver(app.clone())).await;
        bridge.set_callbacks(TauriPositionSink(app.clone())).await;

        Ok(bridge)
    }
}

#[cfg(mobile)]
static PLATFORM_DRIVER: std::sync::OnceLock<Arc<SessionDriver>> = std::sync::OnceLock::new();

/// Session driver for the native shim to pump vendor SDK callbacks through.
/// None until [AppState::initialize] has run.
#[cfg(mobile)]
pub fn platform_driver() -> Option<Arc<SessionDriver>> {
    PLATFORM_DRIVER.get().cloned()
}

fn attach_platform(driver: SessionDriver) {
    #[cfg(mobile)]
    if PLATFORM_DRIVER.set(Arc::new(driver)).is_err() {
        log::warn!("Platform session driver attached twice");
    }

    #[cfg(not(mobile))]
    tokio::spawn(crate::dev::drive(driver));
}
