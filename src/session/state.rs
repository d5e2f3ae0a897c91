//! Session state and pending-request records

use crate::processing::codec::RemoteCommand;
use std::fmt;

/// Protocol phase of the device session
///
/// The handshake walks the `Awaiting*` states in order on every connection
/// open; `Ready` is the only state in which autonomous ranging queries are
/// issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AwaitingDeviceInfo,
    AwaitingSettingsAck,
    AwaitingAmbientConfigAck,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::AwaitingDeviceInfo => "AWAITING_DEVICE_INFO",
            SessionState::AwaitingSettingsAck => "AWAITING_SETTINGS_ACK",
            SessionState::AwaitingAmbientConfigAck => "AWAITING_AMBIENT_CONFIG_ACK",
            SessionState::Ready => "READY",
        };
        write!(f, "{}", name)
    }
}

/// An outbound command awaiting its response
///
/// At most one exists per tier: the local tier waits for the device's own
/// acknowledgement, the remote tier for the acoustic round trip. Created on
/// send, destroyed on matching response or timeout; a close discards both
/// without timing them out.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Acoustic command code for remote-tier requests
    pub command: Option<RemoteCommand>,
    /// Coordinator tick at which the command was sent
    pub sent_at_tick: u64,
    /// Whether this record tracks the acoustic round trip
    pub is_remote: bool,
    /// Operator-readable description for timeout logs
    pub description: String,
}

impl PendingRequest {
    /// Ticks elapsed since the command was sent
    pub fn elapsed(&self, current_tick: u64) -> u64 {
        current_tick.saturating_sub(self.sent_at_tick)
    }
}
