use crate::{codes::BridgeError, fix::Position};

/// Host-layer callback pair for streamed results. Implementations forward to
/// whatever result channel the host runtime uses (events, FFI callbacks).
pub trait PositionSink: Send + Sync {
    /// A new fix from the active watch
    fn send_position(&self, position: Position);

    /// A request-level failure
    fn send_error(&self, error: BridgeError);
}
