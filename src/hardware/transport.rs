//! Transport abstraction over the half-duplex device link

use crate::hardware::error::LinkResult;

/// A byte-stream link to the device, framed into complete sentences
///
/// Implementations deliver one complete CRLF-terminated sentence per
/// [`poll`](Transport::poll) call and must never block: `poll` returns
/// `Ok(None)` when nothing has arrived yet.
pub trait Transport: Send {
    /// Open the link
    fn open(&mut self) -> LinkResult<()>;

    /// Close the link; safe to call when already closed
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Write one outbound sentence, fire-and-forget
    fn send(&mut self, data: &[u8]) -> LinkResult<()>;

    /// Fetch the next complete inbound sentence, if any
    fn poll(&mut self) -> LinkResult<Option<Vec<u8>>>;

    /// Human-readable link identifier for logs
    fn name(&self) -> &str;
}
