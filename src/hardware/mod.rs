//! Hardware abstraction for the device link
//!
//! The coordinator talks to the device through the [`Transport`] trait; the
//! serial implementation drives a real tty, the mock drives tests.

pub mod error;
pub mod mock;
pub mod serial;
pub mod transport;

pub use error::{LinkError, LinkResult};
pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use transport::Transport;
