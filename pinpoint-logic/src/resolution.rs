use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use crate::prelude::*;

/// Correlates a settings-resolution prompt with its eventual activity result
pub type ResolutionToken = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// What came of the platform's enable-location prompt
pub enum ResolutionOutcome {
    /// The user enabled location services
    Enabled,
    /// The user declined
    Declined,
    /// The prompt flow fell over some other way
    Failed,
}

/// Seam for launching the platform's settings-resolution UI. The outcome
/// arrives separately through [ActivityResults], tagged with the same token.
pub trait SettingsResolver: Send + Sync {
    /// Kick off the resolution UI for `token`. An error here means the prompt
    /// couldn't be launched at all, not that the user declined.
    fn launch(&self, token: ResolutionToken) -> Result;
}

#[derive(Default)]
/// Routes activity results back to the request that launched the prompt.
/// Keyed by per-flow tokens so overlapping resolutions can't collide.
pub struct ActivityResults {
    pending: Mutex<HashMap<ResolutionToken, oneshot::Sender<ResolutionOutcome>>>,
}

impl ActivityResults {
    /// Register interest in `token`, called before launching its prompt
    pub(crate) async fn expect(
        &self,
        token: ResolutionToken,
    ) -> oneshot::Receiver<ResolutionOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(token, tx);
        rx
    }

    /// Withdraw interest in `token`, for when the launch never happened
    pub(crate) async fn forget(&self, token: ResolutionToken) {
        self.pending.lock().await.remove(&token);
    }

    /// Deliver the outcome for `token`. Returns false when nobody is waiting
    /// on that token, results for prompts we didn't launch are ignored.
    pub async fn deliver(&self, token: ResolutionToken, outcome: ResolutionOutcome) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(&token) {
            tx.send(outcome).is_ok()
        } else {
            false
        }
    }
}
