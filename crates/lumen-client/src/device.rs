//! The device handle and its operation catalog.
//!
//! A [`Device`] owns one exclusively held byte-stream endpoint. Request
//! operations follow one shape: arm the response slot with the operation's
//! completion state machine, write the framed message (header, then payload,
//! as two writes), and await the reply under a timeout. Fire-and-forget
//! writes skip the slot entirely and resolve once the bytes are written.
//!
//! At most one request may be in flight per device; arming an occupied slot
//! fails fast with [`DeviceError::Busy`] instead of corrupting the earlier
//! operation's state. On timeout the slot is disarmed, so a reply arriving
//! late is discarded by the reader task rather than resolved into a
//! subsequent operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use lumen_core::protocol::codec::{
    parse_address_value_list, parse_mask_universe_data, parse_masked_value_list, parse_patch_list,
    parse_port_list, parse_universe_data, parse_universe_list,
};
use lumen_core::{
    frame_header, parse_identify, AddressPack, AddressValuePair, ChannelMask, DeviceInfo,
    IdentifyError, MaskUniverseData, MaskedAddressValue, Patch, Port, Request, ResponseAssembler,
    ResponseShape, WireError, UNIVERSE_SIZE,
};

use crate::connection::{self, PendingResponse, Shared};
use crate::transport::{EndpointOpener, SerialOpener};

/// Errors surfaced by [`Device`] operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The endpoint open did not complete within the connect budget.
    #[error("connection to {endpoint} timed out after {budget:?}")]
    ConnectionTimeout { endpoint: String, budget: Duration },

    /// The endpoint open kept erroring until the connect budget ran out.
    #[error("could not open {endpoint}: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// No complete reply arrived within the operation budget.
    #[error("no response to {operation} within {budget:?}")]
    OperationTimeout {
        operation: &'static str,
        budget: Duration,
    },

    /// The identify reply was malformed or carried no version.
    #[error("invalid identify response: {0}")]
    InvalidIdentify(#[from] IdentifyError),

    /// Another operation is already in flight on this device.
    #[error("another operation is already in flight on this device")]
    Busy,

    /// The endpoint reached EOF or a read error; the device is unusable.
    #[error("connection to {endpoint} is closed")]
    Closed { endpoint: String },

    /// A reply did not match its expected layout.
    #[error("malformed response: {0}")]
    Wire(#[from] WireError),

    /// Writing to the endpoint failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-device tuning knobs.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Budget for each catalog operation that awaits a reply.
    pub response_timeout: Duration,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(1000),
        }
    }
}

/// A handle to one lighting-control device on one endpoint.
///
/// Created by [`Device::connect`] (serial) or [`Device::attach`] (any byte
/// stream, used by tests and custom transports). Dropping the handle aborts
/// the reader task and closes the endpoint.
pub struct Device {
    endpoint: String,
    options: DeviceOptions,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    info: Mutex<Option<DeviceInfo>>,
}

impl Device {
    /// Connects to the serial endpoint at `endpoint` within `budget`.
    ///
    /// Failed opens retry on the fixed 100 ms cadence until the budget is
    /// exhausted; an open that hangs past the budget fails with
    /// [`DeviceError::ConnectionTimeout`] and closes the endpoint.
    ///
    /// # Errors
    ///
    /// [`DeviceError::ConnectionTimeout`] or
    /// [`DeviceError::ConnectionFailed`].
    pub async fn connect(endpoint: &str, budget: Duration) -> Result<Self, DeviceError> {
        Self::connect_with(&SerialOpener::new(), endpoint, budget, DeviceOptions::default()).await
    }

    /// Connects through an explicit opener and options.
    ///
    /// # Errors
    ///
    /// Same as [`Device::connect`].
    pub async fn connect_with<O: EndpointOpener>(
        opener: &O,
        endpoint: &str,
        budget: Duration,
        options: DeviceOptions,
    ) -> Result<Self, DeviceError> {
        let stream = connection::open_endpoint(opener, endpoint, budget).await?;
        info!(endpoint, "connected");
        Ok(Self::attach(stream, endpoint, options))
    }

    /// Wraps an already open byte stream as a device.
    ///
    /// Spawns the inbound reader task, so this must run inside a tokio
    /// runtime.
    pub fn attach<S>(stream: S, endpoint: &str, options: DeviceOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shared = Arc::new(Shared::new());
        let reader =
            connection::spawn_reader(read_half, endpoint.to_string(), Arc::clone(&shared));
        Self {
            endpoint: endpoint.to_string(),
            options,
            writer: tokio::sync::Mutex::new(Box::new(write_half)),
            shared,
            reader,
            info: Mutex::new(None),
        }
    }

    /// The endpoint path this device was opened on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Identity reported by the most recent successful [`identify`](Self::identify).
    pub fn info(&self) -> Option<DeviceInfo> {
        self.lock_info().clone()
    }

    /// Whether the endpoint is still readable.
    pub fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    // ── Identify ──────────────────────────────────────────────────────────────

    /// Reads the device's identity record within `budget` and caches it.
    ///
    /// # Errors
    ///
    /// [`DeviceError::InvalidIdentify`] for a malformed or version-less
    /// record, [`DeviceError::OperationTimeout`] when no complete record
    /// arrives in time.
    pub async fn identify(&self, budget: Duration) -> Result<DeviceInfo, DeviceError> {
        let bytes = self.transact(Request::Identify, budget).await?;
        let parsed = parse_identify(&bytes)?;
        info!(endpoint = %self.endpoint, version = %parsed.version, "device identified");
        *self.lock_info() = Some(parsed.clone());
        Ok(parsed)
    }

    // ── Universe data ─────────────────────────────────────────────────────────

    /// Replaces all 512 channel values of a universe.
    pub async fn set_universe_data(
        &self,
        universe: u16,
        data: &[u8; UNIVERSE_SIZE],
    ) -> Result<(), DeviceError> {
        self.send_only(Request::SetUniverseData {
            universe,
            data: *data,
        })
        .await
    }

    /// Writes sparse channel values across universes.
    pub async fn set_address_values(
        &self,
        values: &[AddressValuePair],
    ) -> Result<(), DeviceError> {
        self.send_only(Request::SetAddressValues {
            values: values.to_vec(),
        })
        .await
    }

    /// Reads the full 512-byte value buffer of a universe.
    pub async fn get_universe_data(
        &self,
        universe: u16,
    ) -> Result<[u8; UNIVERSE_SIZE], DeviceError> {
        let bytes = self
            .transact(
                Request::GetUniverseData { universe },
                self.options.response_timeout,
            )
            .await?;
        Ok(parse_universe_data(&bytes)?)
    }

    /// Copies one universe's values onto another.
    pub async fn copy_universe(&self, source: u16, destination: u16) -> Result<(), DeviceError> {
        self.send_only(Request::CopyUniverse {
            source,
            destination,
        })
        .await
    }

    /// Reads values at explicit universe/address pairs.
    pub async fn get_values_by_address(
        &self,
        addresses: &[AddressPack],
    ) -> Result<Vec<AddressValuePair>, DeviceError> {
        let bytes = self
            .transact(
                Request::GetValuesByAddress {
                    addresses: addresses.to_vec(),
                },
                self.options.response_timeout,
            )
            .await?;
        Ok(parse_address_value_list(&bytes)?)
    }

    // ── Framerate ─────────────────────────────────────────────────────────────

    /// Sets the device's output framerate.
    pub async fn set_framerate(&self, rate: u8) -> Result<(), DeviceError> {
        self.send_only(Request::SetFramerate { rate }).await
    }

    /// Reads the device's output framerate.
    pub async fn get_framerate(&self) -> Result<u8, DeviceError> {
        let bytes = self
            .transact(Request::GetFramerate, self.options.response_timeout)
            .await?;
        bytes.first().copied().ok_or(DeviceError::Wire(WireError::Truncated {
            needed: 1,
            available: 0,
        }))
    }

    // ── Mask universes ────────────────────────────────────────────────────────

    /// Creates a mask universe.
    pub async fn create_mask_universe(&self, universe: u16) -> Result<(), DeviceError> {
        self.send_only(Request::CreateMaskUniverse { universe }).await
    }

    /// Deletes a mask universe.
    pub async fn delete_mask_universe(&self, universe: u16) -> Result<(), DeviceError> {
        self.send_only(Request::DeleteMaskUniverse { universe }).await
    }

    /// Zeroes a mask universe's mask and values.
    pub async fn clear_mask_universe(&self, universe: u16) -> Result<(), DeviceError> {
        self.send_only(Request::ClearMaskUniverse { universe }).await
    }

    /// Lists the existing mask universes.
    pub async fn get_mask_universes(&self) -> Result<Vec<u16>, DeviceError> {
        let bytes = self
            .transact(Request::GetMaskUniverses, self.options.response_timeout)
            .await?;
        Ok(parse_universe_list(&bytes)?)
    }

    /// Replaces a mask universe's mask bits and channel values.
    pub async fn set_mask_universe_data(
        &self,
        universe: u16,
        mask: &ChannelMask,
        data: &[u8; UNIVERSE_SIZE],
    ) -> Result<(), DeviceError> {
        self.send_only(Request::SetMaskUniverseData {
            universe,
            mask: mask.clone(),
            data: *data,
        })
        .await
    }

    /// Writes sparse mask bits and values into a mask universe.
    pub async fn set_mask_address_values(
        &self,
        universe: u16,
        values: &[MaskedAddressValue],
    ) -> Result<(), DeviceError> {
        self.send_only(Request::SetMaskAddressValues {
            universe,
            values: values.to_vec(),
        })
        .await
    }

    /// Reads a mask universe's mask bits and channel values.
    pub async fn get_mask_universe_data(
        &self,
        universe: u16,
    ) -> Result<MaskUniverseData, DeviceError> {
        let bytes = self
            .transact(
                Request::GetMaskUniverseData { universe },
                self.options.response_timeout,
            )
            .await?;
        Ok(parse_mask_universe_data(&bytes)?)
    }

    /// Reads mask bits and values at explicit addresses of a mask universe.
    pub async fn get_mask_values_by_address(
        &self,
        universe: u16,
        addresses: &[u16],
    ) -> Result<Vec<MaskedAddressValue>, DeviceError> {
        let bytes = self
            .transact(
                Request::GetMaskValuesByAddress {
                    universe,
                    addresses: addresses.to_vec(),
                },
                self.options.response_timeout,
            )
            .await?;
        Ok(parse_masked_value_list(&bytes)?)
    }

    /// Sets every masked channel of a universe to one value.
    pub async fn set_addresses_to_value(
        &self,
        universe: u16,
        value: u8,
        mask: &ChannelMask,
    ) -> Result<(), DeviceError> {
        self.send_only(Request::SetAddressesToValue {
            universe,
            value,
            mask: mask.clone(),
        })
        .await
    }

    // ── Patching ──────────────────────────────────────────────────────────────

    /// Installs a patch.
    pub async fn patch(&self, patch: Patch) -> Result<(), DeviceError> {
        self.send_only(Request::Patch(patch)).await
    }

    /// Removes a patch.
    pub async fn unpatch(&self, patch: Patch) -> Result<(), DeviceError> {
        self.send_only(Request::Unpatch(patch)).await
    }

    /// Lists the installed patches.
    pub async fn list_patches(&self) -> Result<Vec<Patch>, DeviceError> {
        let bytes = self
            .transact(Request::ListPatches, self.options.response_timeout)
            .await?;
        Ok(parse_patch_list(&bytes)?)
    }

    // ── Ports ─────────────────────────────────────────────────────────────────

    /// Lists the device's universe port bindings.
    pub async fn list_ports(&self) -> Result<Vec<Port>, DeviceError> {
        let bytes = self
            .transact(Request::ListPorts, self.options.response_timeout)
            .await?;
        Ok(parse_port_list(&bytes)?)
    }

    // ── Request plumbing ──────────────────────────────────────────────────────

    /// Runs one request/response operation under `budget`.
    async fn transact(&self, request: Request, budget: Duration) -> Result<Vec<u8>, DeviceError> {
        let shape = request
            .response_shape()
            .expect("transact is only called with operations that expect a reply");
        self.ensure_open()?;
        let receiver = self.arm(shape)?;

        if let Err(error) = self.send(&request).await {
            self.disarm();
            return Err(error);
        }

        match time::timeout(budget, receiver).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(_sender_dropped)) => Err(DeviceError::Closed {
                endpoint: self.endpoint.clone(),
            }),
            Err(_elapsed) => {
                // Disarm so a late reply cannot resolve into a later
                // operation; the reader discards unarmed bytes.
                self.disarm();
                warn!(
                    endpoint = %self.endpoint,
                    operation = request.name(),
                    budget_ms = budget.as_millis() as u64,
                    "operation timed out"
                );
                Err(DeviceError::OperationTimeout {
                    operation: request.name(),
                    budget,
                })
            }
        }
    }

    /// Sends a fire-and-forget request.
    async fn send_only(&self, request: Request) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.send(&request).await
    }

    /// Writes one framed request: header first, then the payload.
    async fn send(&self, request: &Request) -> Result<(), DeviceError> {
        let payload = request.encode_payload();
        let len = u16::try_from(payload.len()).map_err(|_| {
            DeviceError::Wire(WireError::PayloadTooLarge {
                size: payload.len(),
            })
        })?;
        let header = frame_header(request.opcode(), len);

        let mut writer = self.writer.lock().await;
        writer.write_all(&header).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        debug!(
            endpoint = %self.endpoint,
            operation = request.name(),
            payload_len = payload.len(),
            "request sent"
        );
        Ok(())
    }

    fn arm(&self, shape: ResponseShape) -> Result<oneshot::Receiver<Vec<u8>>, DeviceError> {
        let mut slot = self.shared.lock_pending();
        if slot.is_some() {
            return Err(DeviceError::Busy);
        }
        let (complete, receiver) = oneshot::channel();
        *slot = Some(PendingResponse {
            assembler: ResponseAssembler::new(shape),
            complete,
        });
        Ok(receiver)
    }

    fn disarm(&self) {
        self.shared.lock_pending().take();
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.shared.is_closed() {
            return Err(DeviceError::Closed {
                endpoint: self.endpoint.clone(),
            });
        }
        Ok(())
    }

    fn lock_info(&self) -> MutexGuard<'_, Option<DeviceInfo>> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // The reader task owns the read half; aborting it releases the
        // endpoint.
        self.reader.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
