//! Connection lifecycle states.
//!
//! ```text
//! Disconnected -> Connecting -> Connected        (connect succeeded)
//! Connecting   -> Disconnected                   (connect failed or cancelled)
//! Connected    -> Disconnecting -> Disconnected  (disconnect succeeded)
//! Disconnecting -> Connected                     (disconnect failed)
//! ```

use std::fmt;

use tokio::sync::watch;

/// Lifecycle state of a [`Database`](super::Database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    /// True while a connect or disconnect is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Disconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-flight transition.
///
/// Publishes the intermediate state on creation. If dropped before
/// [`commit`](Transition::commit), the fallback state is published instead,
/// so a failed or cancelled operation never leaves the client mid-transition.
pub(crate) struct Transition<'a> {
    state: &'a watch::Sender<ConnectionState>,
    fallback: ConnectionState,
    committed: bool,
}

impl<'a> Transition<'a> {
    pub(crate) fn begin(
        state: &'a watch::Sender<ConnectionState>,
        during: ConnectionState,
        fallback: ConnectionState,
    ) -> Self {
        state.send_replace(during);
        Self {
            state,
            fallback,
            committed: false,
        }
    }

    pub(crate) fn commit(mut self, target: ConnectionState) {
        self.state.send_replace(target);
        self.committed = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.send_replace(self.fallback);
        }
    }
}
