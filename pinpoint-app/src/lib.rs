#[cfg(not(mobile))]
mod dev;
mod state;

#[cfg(mobile)]
pub use crate::state::platform_driver;

use std::collections::HashMap;

use log::{LevelFilter, error, warn};
use pinpoint_logic::{
    ERROR_LOCATION_CANNOT_GET, ERROR_LOCATION_SERVICE_DISABLED, ERROR_UNKNOWN, Position,
    ResolutionOutcome, ResolutionToken, WatchOptions,
};
use tauri::{Manager, State};
use tauri_specta::{ErrorHandlingMode, collect_commands, collect_events};
use tokio::sync::RwLock;

use std::result::Result as StdResult;

use crate::state::{
    AppState, AppStateHandle, PositionError, PositionUpdate, ResolutionPrompt, error_dialog,
};

type Result<T = (), E = String> = StdResult<T, E>;

#[tauri::command]
#[specta::specta]
/// Resolve a single fix. Settles only once there is a fix or a definite
/// failure, there is no timeout; a newer call supersedes this one and makes
/// it reject with code 1.
async fn get_current_location(state: State<'_, AppStateHandle>) -> Result<Position> {
    let bridge = state.read().await.get_bridge()?;
    bridge
        .current_position()
        .await
        .map_err(|err| err.to_string())
}

#[tauri::command]
#[specta::specta]
/// Stream fixes to the UI as [PositionUpdate] events until [clear_watch].
/// Failures arrive as [PositionError] events. A new watch replaces the
/// previous one.
async fn watch_position(options: WatchOptions, state: State<'_, AppStateHandle>) -> Result {
    let bridge = state.read().await.get_bridge()?;
    bridge
        .watch_position(options)
        .await
        .map_err(|err| err.to_string())?;

    tokio::spawn(async move { bridge.watch_loop().await });
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// Stop the active stream, safe to call when nothing is streaming
async fn clear_watch(state: State<'_, AppStateHandle>) -> Result {
    state.read().await.get_bridge()?.clear_watch().await;
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// Report how the enable-location flow requested by [ResolutionPrompt]
/// ended. Unknown tokens are logged and dropped.
async fn complete_resolution(
    token: ResolutionToken,
    outcome: ResolutionOutcome,
    state: State<'_, AppStateHandle>,
) -> Result {
    let bridge = state.read().await.get_bridge()?;
    if !bridge.activity_results().deliver(token, outcome).await {
        warn!("Resolution outcome for unknown token {token}");
    }
    Ok(())
}

#[tauri::command]
#[specta::specta]
/// The numeric codes [PositionError] payloads carry, keyed by name
fn bridge_error_codes() -> HashMap<String, u8> {
    HashMap::from([
        ("UNKNOWN".to_string(), ERROR_UNKNOWN),
        ("LOCATION_CANNOT_GET".to_string(), ERROR_LOCATION_CANNOT_GET),
        (
            "LOCATION_SERVICE_DISABLED".to_string(),
            ERROR_LOCATION_SERVICE_DISABLED,
        ),
    ])
}

pub fn mk_specta() -> tauri_specta::Builder {
    tauri_specta::Builder::<tauri::Wry>::new()
        .error_handling(ErrorHandlingMode::Throw)
        .commands(collect_commands![
            get_current_location,
            watch_position,
            clear_watch,
            complete_resolution,
            bridge_error_codes,
        ])
        .events(collect_events![
            PositionUpdate,
            PositionError,
            ResolutionPrompt
        ])
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let state = RwLock::new(AppState::Starting);

    let builder = mk_specta();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(LevelFilter::Debug)
                .build(),
        )
        .invoke_handler(builder.invoke_handler())
        .manage(state)
        .setup(move |app| {
            builder.mount_events(app);

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                match AppState::initialize(&handle).await {
                    Ok(bridge) => {
                        let state_handle = handle.state::<AppStateHandle>();
                        let mut state = state_handle.write().await;
                        *state = AppState::Ready(bridge);
                    }
                    Err(why) => {
                        error!("Failed to open the location bridge: {why:?}");
                        error_dialog(&handle, "Couldn't connect to location services");
                    }
                }
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
