//! # lumen-core
//!
//! Shared library for LumenLink containing the device wire protocol, the
//! channel-mask codec, response-completion state machines, and the device
//! identity model.
//!
//! This crate is pure: it has zero dependencies on the OS, the serial stack,
//! or an async runtime, which keeps every wire rule testable in isolation.
//! The `lumen-client` crate layers connection management and the operation
//! catalog on top of it.
//!
//! - **`protocol`** – how bytes travel over the serial link. Outbound
//!   messages carry a 5-byte header (`[0x00, opcode, length]`, both fields
//!   little-endian) followed by the payload. Inbound data has *no* framing
//!   at all: the device answers with raw bytes, and the expected response
//!   layout of the operation in flight decides when a reply is complete
//!   (see [`protocol::response::ResponseAssembler`]).
//!
//! - **`domain`** – pure value logic: the 512-channel selection mask and its
//!   packed wire form, and the identity record a device reports about
//!   itself.

pub mod domain;
pub mod protocol;

pub use domain::device::{DeviceInfo, PortDescriptor, PortMode};
pub use domain::mask::{ChannelMask, MaskError, MASK_BYTES, UNIVERSE_CHANNELS};
pub use protocol::codec::{encode_request, frame, frame_header, WireError};
pub use protocol::identify::{parse_identify, IdentifyError};
pub use protocol::messages::{
    AddressPack, AddressValuePair, MaskUniverseData, MaskedAddressValue, Opcode, Patch, Port,
    Request, HEADER_SIZE, UNIVERSE_SIZE,
};
pub use protocol::response::{ResponseAssembler, ResponseShape};
