//! lumen-client library entry point.
//!
//! The client side of the LumenLink protocol: it opens the serial endpoint a
//! lighting-control device hangs off, keeps one reader task per device, and
//! exposes every device capability as an async method on [`Device`].
//!
//! A typical session:
//!
//! 1. Enumerate candidate endpoints ([`transport::available_endpoints`]).
//! 2. [`Device::connect`] with a time budget; failed opens retry on a fixed
//!    100 ms cadence until the budget runs out.
//! 3. [`Device::identify`] to read the firmware's identity record and cache
//!    it on the device handle.
//! 4. Drive the operation catalog: stream universe data, manage mask
//!    universes, patch universes together, query values back.
//!
//! One request may be in flight per device at a time; starting a second one
//! before the first resolves fails fast with [`DeviceError::Busy`].
//! Operations on distinct devices are fully independent.

pub mod config;
mod connection;
pub mod device;
pub mod transport;

pub use config::{load_config, save_config, ClientConfig, ConfigError};
pub use device::{Device, DeviceError, DeviceOptions};
pub use transport::{available_endpoints, EndpointOpener, SerialOpener, BAUD_RATE};
