//! Request catalog and wire value types.
//!
//! Every device capability is one [`Request`] variant. A request knows its
//! [`Opcode`], how to encode its payload, and — for operations that expect a
//! reply — the [`ResponseShape`] that tells the accumulator when the reply
//! is complete. All multi-byte fields are little-endian; every count
//! precedes its elements.

use crate::domain::device::PortMode;
use crate::domain::mask::{ChannelMask, MASK_BYTES};
use crate::protocol::response::ResponseShape;

/// One-byte channel values per universe.
pub const UNIVERSE_SIZE: usize = 512;

/// Outbound header size: reserved byte + opcode (u16 LE) + length (u16 LE).
pub const HEADER_SIZE: usize = 5;

/// Wire opcodes, as carried in bytes 1..3 of the outbound header.
///
/// The inbound stream never echoes an opcode; replies are matched purely by
/// the response layout of the operation in flight. Query-style operations
/// therefore share [`Opcode::Query`] and are distinguished on the device by
/// a one-byte selector prefix in the payload (or its absence, for the
/// legacy patch-list form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Identify = 0x0001,
    SetUniverseData = 0x0002,
    SetAddressValues = 0x0003,
    GetUniverseData = 0x0004,
    SetFramerate = 0x0005,
    GetFramerate = 0x0006,
    CreateMaskUniverse = 0x0007,
    GetMaskUniverses = 0x0008,
    DeleteMaskUniverse = 0x0009,
    SetMaskUniverseData = 0x000A,
    SetMaskAddressValues = 0x000B,
    GetMaskUniverseData = 0x000C,
    ClearMaskUniverse = 0x000D,
    Patch = 0x000E,
    Unpatch = 0x000F,
    Query = 0x0010,
    CopyUniverse = 0x0011,
    SetAddressesToValue = 0x0012,
}

impl Opcode {
    /// The u16 carried on the wire.
    pub fn wire(self) -> u16 {
        self as u16
    }
}

/// Payload selector bytes for the query operations sharing [`Opcode::Query`].
pub mod query {
    /// List the device's universe ports.
    pub const PORTS: u8 = 0x01;
    /// Read values at explicit universe/address pairs.
    pub const VALUES: u8 = 0x02;
    /// Read mask bits and values at explicit addresses of one mask universe.
    pub const MASK_VALUES: u8 = 0x03;
}

/// Identifies one channel inside one universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPack {
    pub universe: u16,
    pub address: u16,
}

/// A sparse channel write: one address and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressValuePair {
    pub address: AddressPack,
    pub value: u8,
}

/// One element of a mask-universe sparse write or read: the channel address
/// within the universe, whether its mask bit is set, and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedAddressValue {
    pub address: u16,
    pub masked: bool,
    pub value: u8,
}

/// How one universe's output is derived from an input universe and a mask
/// universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub input_universe: u16,
    pub output_universe: u16,
    /// Mask universe applied to the patch. Carried verbatim on the wire; the
    /// client interprets no sentinel value.
    pub mask_universe: u16,
}

/// One universe port binding reported by the port listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub universe: u16,
    pub mode: PortMode,
}

/// Mask bits and channel values of one mask universe, as returned by
/// [`Request::GetMaskUniverseData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskUniverseData {
    pub mask: ChannelMask,
    pub data: [u8; UNIVERSE_SIZE],
}

/// One outbound device operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Identify,
    SetUniverseData {
        universe: u16,
        data: [u8; UNIVERSE_SIZE],
    },
    SetAddressValues {
        values: Vec<AddressValuePair>,
    },
    GetUniverseData {
        universe: u16,
    },
    SetFramerate {
        rate: u8,
    },
    GetFramerate,
    CreateMaskUniverse {
        universe: u16,
    },
    GetMaskUniverses,
    DeleteMaskUniverse {
        universe: u16,
    },
    SetMaskUniverseData {
        universe: u16,
        mask: ChannelMask,
        data: [u8; UNIVERSE_SIZE],
    },
    SetMaskAddressValues {
        universe: u16,
        values: Vec<MaskedAddressValue>,
    },
    GetMaskUniverseData {
        universe: u16,
    },
    ClearMaskUniverse {
        universe: u16,
    },
    Patch(Patch),
    Unpatch(Patch),
    ListPatches,
    ListPorts,
    GetValuesByAddress {
        addresses: Vec<AddressPack>,
    },
    GetMaskValuesByAddress {
        universe: u16,
        addresses: Vec<u16>,
    },
    CopyUniverse {
        source: u16,
        destination: u16,
    },
    SetAddressesToValue {
        universe: u16,
        value: u8,
        mask: ChannelMask,
    },
}

impl Request {
    /// The wire opcode of this request.
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Identify => Opcode::Identify,
            Request::SetUniverseData { .. } => Opcode::SetUniverseData,
            Request::SetAddressValues { .. } => Opcode::SetAddressValues,
            Request::GetUniverseData { .. } => Opcode::GetUniverseData,
            Request::SetFramerate { .. } => Opcode::SetFramerate,
            Request::GetFramerate => Opcode::GetFramerate,
            Request::CreateMaskUniverse { .. } => Opcode::CreateMaskUniverse,
            Request::GetMaskUniverses => Opcode::GetMaskUniverses,
            Request::DeleteMaskUniverse { .. } => Opcode::DeleteMaskUniverse,
            Request::SetMaskUniverseData { .. } => Opcode::SetMaskUniverseData,
            Request::SetMaskAddressValues { .. } => Opcode::SetMaskAddressValues,
            Request::GetMaskUniverseData { .. } => Opcode::GetMaskUniverseData,
            Request::ClearMaskUniverse { .. } => Opcode::ClearMaskUniverse,
            Request::Patch(_) => Opcode::Patch,
            Request::Unpatch(_) => Opcode::Unpatch,
            Request::ListPatches => Opcode::Query,
            Request::ListPorts => Opcode::Query,
            Request::GetValuesByAddress { .. } => Opcode::Query,
            Request::GetMaskValuesByAddress { .. } => Opcode::Query,
            Request::CopyUniverse { .. } => Opcode::CopyUniverse,
            Request::SetAddressesToValue { .. } => Opcode::SetAddressesToValue,
        }
    }

    /// Short operation name for logs and timeout errors.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Identify => "identify",
            Request::SetUniverseData { .. } => "set_universe_data",
            Request::SetAddressValues { .. } => "set_address_values",
            Request::GetUniverseData { .. } => "get_universe_data",
            Request::SetFramerate { .. } => "set_framerate",
            Request::GetFramerate => "get_framerate",
            Request::CreateMaskUniverse { .. } => "create_mask_universe",
            Request::GetMaskUniverses => "get_mask_universes",
            Request::DeleteMaskUniverse { .. } => "delete_mask_universe",
            Request::SetMaskUniverseData { .. } => "set_mask_universe_data",
            Request::SetMaskAddressValues { .. } => "set_mask_address_values",
            Request::GetMaskUniverseData { .. } => "get_mask_universe_data",
            Request::ClearMaskUniverse { .. } => "clear_mask_universe",
            Request::Patch(_) => "patch",
            Request::Unpatch(_) => "unpatch",
            Request::ListPatches => "list_patches",
            Request::ListPorts => "list_ports",
            Request::GetValuesByAddress { .. } => "get_values_by_address",
            Request::GetMaskValuesByAddress { .. } => "get_mask_values_by_address",
            Request::CopyUniverse { .. } => "copy_universe",
            Request::SetAddressesToValue { .. } => "set_addresses_to_value",
        }
    }

    /// Expected reply layout, or `None` for fire-and-forget writes.
    pub fn response_shape(&self) -> Option<ResponseShape> {
        match self {
            Request::Identify => Some(ResponseShape::Text),
            Request::GetUniverseData { .. } => Some(ResponseShape::Fixed(UNIVERSE_SIZE)),
            Request::GetFramerate => Some(ResponseShape::Fixed(1)),
            Request::GetMaskUniverses => Some(ResponseShape::CountPrefixed { element_size: 2 }),
            Request::GetMaskUniverseData { .. } => {
                Some(ResponseShape::Fixed(MASK_BYTES + UNIVERSE_SIZE))
            }
            Request::ListPatches => Some(ResponseShape::CountPrefixed { element_size: 6 }),
            Request::ListPorts => Some(ResponseShape::CountPrefixed { element_size: 3 }),
            Request::GetValuesByAddress { .. } => {
                Some(ResponseShape::CountPrefixed { element_size: 5 })
            }
            Request::GetMaskValuesByAddress { .. } => {
                Some(ResponseShape::CountPrefixed { element_size: 4 })
            }
            _ => None,
        }
    }

    /// Encodes the request payload (header excluded).
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Request::Identify | Request::GetFramerate | Request::GetMaskUniverses => {}
            Request::ListPatches => {} // legacy selector-less query form
            Request::SetUniverseData { universe, data } => {
                buf.extend_from_slice(&universe.to_le_bytes());
                buf.extend_from_slice(data);
            }
            Request::SetAddressValues { values } => {
                for pair in values {
                    buf.extend_from_slice(&pair.address.universe.to_le_bytes());
                    buf.extend_from_slice(&pair.address.address.to_le_bytes());
                    buf.push(pair.value);
                }
            }
            Request::GetUniverseData { universe }
            | Request::CreateMaskUniverse { universe }
            | Request::DeleteMaskUniverse { universe }
            | Request::GetMaskUniverseData { universe }
            | Request::ClearMaskUniverse { universe } => {
                buf.extend_from_slice(&universe.to_le_bytes());
            }
            Request::SetFramerate { rate } => buf.push(*rate),
            Request::SetMaskUniverseData {
                universe,
                mask,
                data,
            } => {
                buf.extend_from_slice(&universe.to_le_bytes());
                buf.extend_from_slice(&mask.packed());
                buf.extend_from_slice(data);
            }
            Request::SetMaskAddressValues { universe, values } => {
                buf.extend_from_slice(&universe.to_le_bytes());
                for value in values {
                    buf.extend_from_slice(&value.address.to_le_bytes());
                    buf.push(if value.masked { 0x01 } else { 0x00 });
                    buf.push(value.value);
                }
            }
            Request::Patch(patch) | Request::Unpatch(patch) => {
                buf.extend_from_slice(&patch.input_universe.to_le_bytes());
                buf.extend_from_slice(&patch.output_universe.to_le_bytes());
                buf.extend_from_slice(&patch.mask_universe.to_le_bytes());
            }
            Request::ListPorts => buf.push(query::PORTS),
            Request::GetValuesByAddress { addresses } => {
                buf.push(query::VALUES);
                buf.extend_from_slice(&(addresses.len() as u16).to_le_bytes());
                for pack in addresses {
                    buf.extend_from_slice(&pack.universe.to_le_bytes());
                    buf.extend_from_slice(&pack.address.to_le_bytes());
                }
            }
            Request::GetMaskValuesByAddress {
                universe,
                addresses,
            } => {
                buf.push(query::MASK_VALUES);
                buf.extend_from_slice(&universe.to_le_bytes());
                buf.extend_from_slice(&(addresses.len() as u16).to_le_bytes());
                for address in addresses {
                    buf.extend_from_slice(&address.to_le_bytes());
                }
            }
            Request::CopyUniverse {
                source,
                destination,
            } => {
                buf.extend_from_slice(&source.to_le_bytes());
                buf.extend_from_slice(&destination.to_le_bytes());
            }
            Request::SetAddressesToValue {
                universe,
                value,
                mask,
            } => {
                buf.extend_from_slice(&universe.to_le_bytes());
                buf.push(*value);
                buf.extend_from_slice(&mask.packed());
            }
        }
        buf
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
