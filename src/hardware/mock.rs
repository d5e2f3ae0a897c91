//! In-memory transport for driving the coordinator in tests
//!
//! State lives behind an `Arc`, so a clone kept by the test keeps feeding
//! and inspecting the transport after the coordinator has taken ownership
//! of the original.

use crate::hardware::error::{LinkError, LinkResult};
use crate::hardware::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    open: bool,
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    fail_next_open: bool,
    fail_next_send: bool,
}

/// Script-driven transport: queue inbound sentences, record outbound ones,
/// inject failures
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a sentence for delivery through `poll`
    pub fn push_inbound(&self, sentence: &str) {
        self.lock().inbound.push_back(sentence.as_bytes().to_vec());
    }

    /// Everything sent so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    pub fn fail_next_send(&self) {
        self.lock().fail_next_send = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> LinkResult<()> {
        let mut state = self.lock();
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(LinkError::OpenFailed {
                port: "mock".to_string(),
                details: "injected failure".to_string(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn send(&mut self, data: &[u8]) -> LinkResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        if state.fail_next_send {
            state.fail_next_send = false;
            return Err(LinkError::SendFailed {
                details: "injected failure".to_string(),
            });
        }
        state.sent.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn poll(&mut self) -> LinkResult<Option<Vec<u8>>> {
        let mut state = self.lock();
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        Ok(state.inbound.pop_front())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
