//! Transport infrastructure: turning an endpoint path into a byte stream.
//!
//! The device hangs off a point-to-point serial link with a fixed line
//! configuration; there is no negotiation. Everything above this module is
//! transport-agnostic: connection management and the operation catalog only
//! require something that implements `AsyncRead + AsyncWrite`, so tests swap
//! the serial port for an in-memory duplex pipe via [`mock::MockOpener`].
//!
//! Endpoint *enumeration* is an external capability of the serial stack;
//! [`available_endpoints`] is the thin wrapper the discovery layer consumes.

pub mod mock;

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Fixed line rate of the device link.
pub const BAUD_RATE: u32 = 115_200;

/// Opens a byte-stream endpoint from a path identifier.
///
/// The seam between connection management and the concrete transport. The
/// production implementation is [`SerialOpener`]; tests use scripted openers
/// to exercise the retry and timeout paths without hardware.
#[async_trait]
pub trait EndpointOpener: Send + Sync {
    /// The byte stream produced by a successful open.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Opens the endpoint at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the endpoint cannot be opened
    /// (missing device node, permission denied, port already claimed, …).
    async fn open(&self, path: &str) -> io::Result<Self::Stream>;
}

/// Opens serial endpoints at the fixed device configuration.
#[derive(Debug, Clone)]
pub struct SerialOpener {
    baud_rate: u32,
}

impl SerialOpener {
    /// An opener at the standard [`BAUD_RATE`].
    pub fn new() -> Self {
        Self {
            baud_rate: BAUD_RATE,
        }
    }
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointOpener for SerialOpener {
    type Stream = SerialStream;

    async fn open(&self, path: &str) -> io::Result<Self::Stream> {
        tokio_serial::new(path, self.baud_rate)
            .open_native_async()
            .map_err(io::Error::from)
    }
}

/// Lists candidate endpoint paths in enumeration order.
///
/// Delegates to the serial stack's port enumeration; the discovery layer
/// walks this list with `connect` + `identify` to find a device.
///
/// # Errors
///
/// Returns an I/O error when the platform enumeration fails outright; an
/// empty list is not an error.
pub fn available_endpoints() -> io::Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(io::Error::from)?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_opener_defaults_to_fixed_baud_rate() {
        let opener = SerialOpener::new();
        assert_eq!(opener.baud_rate, BAUD_RATE);
    }

    #[tokio::test]
    async fn test_serial_opener_fails_on_nonexistent_path() {
        let opener = SerialOpener::new();
        let result = opener.open("/dev/lumenlink-does-not-exist").await;
        assert!(result.is_err(), "opening a missing device node must fail");
    }
}
