//! Serial transport over a tty device node
//!
//! Sentences are line-framed; a background reader thread performs the
//! blocking reads and hands complete lines to `poll` through a channel, so
//! the transport itself never blocks the coordinator. Port parameters
//! (baud rate, parity) are assumed to be configured on the device node
//! before the link is opened.

use crate::hardware::error::{LinkError, LinkResult};
use crate::hardware::transport::Transport;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use tracing::debug;

pub struct SerialTransport {
    port_name: String,
    writer: Option<File>,
    inbound: Option<Receiver<std::io::Result<Vec<u8>>>>,
    running: Arc<AtomicBool>,
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            writer: None,
            inbound: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> LinkResult<()> {
        if self.writer.is_some() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.port_name)
            .map_err(|e| LinkError::OpenFailed {
                port: self.port_name.clone(),
                details: e.to_string(),
            })?;
        let reader_file = file.try_clone().map_err(|e| LinkError::OpenFailed {
            port: self.port_name.clone(),
            details: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let port_name = self.port_name.clone();

        thread::spawn(move || {
            let mut reader = BufReader::new(reader_file);
            while thread_running.load(Ordering::Relaxed) {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
            debug!(port = %port_name, "serial reader stopped");
        });

        self.writer = Some(file);
        self.inbound = Some(rx);
        self.running = running;
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.writer = None;
        self.inbound = None;
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn send(&mut self, data: &[u8]) -> LinkResult<()> {
        let writer = self.writer.as_mut().ok_or(LinkError::NotOpen)?;
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| LinkError::SendFailed {
                details: e.to_string(),
            })
    }

    fn poll(&mut self) -> LinkResult<Option<Vec<u8>>> {
        let inbound = self.inbound.as_ref().ok_or(LinkError::NotOpen)?;
        match inbound.try_recv() {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(LinkError::ReceiveFailed {
                details: e.to_string(),
            }),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::ReceiveFailed {
                details: "reader thread terminated".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_port_fails() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-0");
        let result = transport.open();
        assert!(matches!(result, Err(LinkError::OpenFailed { .. })));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_operations_on_closed_link() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-0");
        assert_eq!(transport.send(b"$PUWV?,0*27\r\n"), Err(LinkError::NotOpen));
        assert_eq!(transport.poll(), Err(LinkError::NotOpen));
        // close on a closed link is a no-op
        transport.close();
    }
}
