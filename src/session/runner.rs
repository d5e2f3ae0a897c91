//! Single-owner event loop for the coordinator
//!
//! All coordinator state is mutated from exactly one thread: a ticker
//! thread feeds 1 Hz tick events through a channel, and the owning loop
//! interleaves them with transport polling. Handlers therefore never
//! interleave their reads and writes of shared aggregates.

use crate::session::coordinator::SessionCoordinator;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Events driving the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Periodic scheduler tick
    Tick,
    /// Stop the event loop
    Shutdown,
}

/// Poll interval between event-channel checks
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawn a thread that emits `Tick` at a fixed period until the receiver is
/// dropped
pub fn spawn_ticker(period: Duration, events: Sender<SessionEvent>) {
    thread::spawn(move || {
        loop {
            thread::sleep(period);
            if events.send(SessionEvent::Tick).is_err() {
                break;
            }
        }
        debug!("ticker stopped");
    });
}

/// Create the event channel for a session
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    mpsc::channel()
}

/// Run the coordinator until `Shutdown` arrives or every sender is gone
///
/// Between events the transport is drained, so inbound sentences are
/// handled with bounded latency without a dedicated reader thread touching
/// coordinator state.
pub fn run(coordinator: &mut SessionCoordinator, events: Receiver<SessionEvent>) {
    loop {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(SessionEvent::Tick) => coordinator.handle_tick(),
            Ok(SessionEvent::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        coordinator.pump();
    }
    debug!("event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockTransport;
    use crate::session::coordinator::SessionConfig;
    use crate::session::sink::NullSink;
    use crate::session::state::SessionState;

    #[test]
    fn test_run_exits_on_shutdown() {
        let transport = MockTransport::new();
        let mut coordinator = SessionCoordinator::new(
            SessionConfig::default(),
            Box::new(transport.clone()),
            Box::new(NullSink),
        );
        coordinator.open().unwrap();

        let (tx, rx) = event_channel();
        tx.send(SessionEvent::Tick).unwrap();
        tx.send(SessionEvent::Shutdown).unwrap();
        run(&mut coordinator, rx);

        // The tick before shutdown issued the first handshake query
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(coordinator.state(), SessionState::AwaitingDeviceInfo);
    }

    #[test]
    fn test_run_exits_when_senders_drop() {
        let transport = MockTransport::new();
        let mut coordinator = SessionCoordinator::new(
            SessionConfig::default(),
            Box::new(transport),
            Box::new(NullSink),
        );
        let (tx, rx) = event_channel();
        drop(tx);
        run(&mut coordinator, rx);
    }
}
