//! Desktop stand-in for the platform session so the app can run off-device.
//! Always reports satisfied settings and serves a fixed dev fix.

use std::time::Duration;

use log::info;
use pinpoint_fused::{SETTINGS_SUCCESS, SessionCommand, SessionDriver, SessionEvent};
use pinpoint_logic::Fix;

const DEV_FIX: Fix = Fix {
    latitude: 0.0,
    longitude: 0.0,
    heading: None,
};

pub(crate) async fn drive(driver: SessionDriver) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut streaming = false;

    loop {
        tokio::select! {
            cmd = driver.next_command() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    SessionCommand::Connect => {
                        driver.push(SessionEvent::Connected).await;
                    }
                    SessionCommand::CheckSettings { token, .. } => {
                        driver
                            .push(SessionEvent::SettingsChecked {
                                token,
                                status: SETTINGS_SUCCESS,
                            })
                            .await;
                    }
                    SessionCommand::QueryLastKnown { token } => {
                        driver
                            .push(SessionEvent::LastKnown {
                                token,
                                fix: Some(DEV_FIX),
                            })
                            .await;
                    }
                    SessionCommand::StartUpdates { profile } => {
                        let period = Duration::from_millis(profile.interval_ms.max(100));
                        ticker = tokio::time::interval(period);
                        streaming = true;
                    }
                    SessionCommand::StopUpdates => streaming = false,
                    SessionCommand::Disconnect => break,
                }
            }

            _ = ticker.tick(), if streaming => {
                if !driver.push(SessionEvent::FixUpdate(DEV_FIX)).await {
                    break;
                }
            }
        }
    }

    info!("Dev location feed stopped");
}
