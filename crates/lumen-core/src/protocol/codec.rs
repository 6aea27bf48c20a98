//! Outbound framing and typed response parsing.
//!
//! Outbound wire format:
//! ```text
//! ┌────────────┬──────────────┬──────────────┬──────────────────┐
//! │ 0x00 (1B)  │ Opcode       │ Length       │ Payload          │
//! │ reserved   │ (2B LE)      │ (2B LE)      │ (Length bytes)   │
//! └────────────┴──────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Inbound data carries no header. Once the accumulator has assembled a
//! complete reply (see [`crate::protocol::response`]), the parsers here turn
//! the raw bytes into typed values. Parsers validate lengths themselves and
//! do not rely on the assembler having done so.

use thiserror::Error;

use crate::domain::device::PortMode;
use crate::domain::mask::{ChannelMask, MASK_BYTES};
use crate::protocol::messages::{
    AddressPack, AddressValuePair, MaskUniverseData, MaskedAddressValue, Opcode, Patch, Port,
    Request, HEADER_SIZE, UNIVERSE_SIZE,
};

/// Errors from framing and response decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// A response is shorter than its layout requires.
    #[error("response truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// A port listing carried an unknown mode byte.
    #[error("unknown port mode: 0x{0:02X}")]
    UnknownPortMode(u8),

    /// The payload does not fit the u16 length field of the header.
    #[error("payload of {size} bytes exceeds the u16 length field")]
    PayloadTooLarge { size: usize },
}

/// Builds the 5-byte outbound header.
pub fn frame_header(opcode: Opcode, payload_len: u16) -> [u8; HEADER_SIZE] {
    let opcode = opcode.wire().to_le_bytes();
    let len = payload_len.to_le_bytes();
    [0x00, opcode[0], opcode[1], len[0], len[1]]
}

/// Frames a complete outbound message: header followed by payload.
///
/// # Errors
///
/// Returns [`WireError::PayloadTooLarge`] when the payload exceeds the u16
/// length field.
pub fn frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| WireError::PayloadTooLarge {
            size: payload.len(),
        })?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&frame_header(opcode, len));
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Frames a [`Request`] into its complete wire form.
///
/// # Errors
///
/// Returns [`WireError::PayloadTooLarge`] for oversized variable-length
/// payloads.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, WireError> {
    frame(request.opcode(), &request.encode_payload())
}

// ── Response parsers ──────────────────────────────────────────────────────────

/// Parses the mask-universe listing: count16 + count × universe16.
pub fn parse_universe_list(bytes: &[u8]) -> Result<Vec<u16>, WireError> {
    parse_counted(bytes, 2, |element| {
        Ok(u16::from_le_bytes([element[0], element[1]]))
    })
}

/// Parses the patch listing: count16 + count × (input16 + output16 + mask16).
pub fn parse_patch_list(bytes: &[u8]) -> Result<Vec<Patch>, WireError> {
    parse_counted(bytes, 6, |element| {
        Ok(Patch {
            input_universe: u16::from_le_bytes([element[0], element[1]]),
            output_universe: u16::from_le_bytes([element[2], element[3]]),
            mask_universe: u16::from_le_bytes([element[4], element[5]]),
        })
    })
}

/// Parses the port listing: count16 + count × (universe16 + mode8).
pub fn parse_port_list(bytes: &[u8]) -> Result<Vec<Port>, WireError> {
    parse_counted(bytes, 3, |element| {
        let mode = PortMode::from_wire(element[2]).ok_or(WireError::UnknownPortMode(element[2]))?;
        Ok(Port {
            universe: u16::from_le_bytes([element[0], element[1]]),
            mode,
        })
    })
}

/// Parses an address-value listing: count16 + count × (universe16 +
/// address16 + value8).
pub fn parse_address_value_list(bytes: &[u8]) -> Result<Vec<AddressValuePair>, WireError> {
    parse_counted(bytes, 5, |element| {
        Ok(AddressValuePair {
            address: AddressPack {
                universe: u16::from_le_bytes([element[0], element[1]]),
                address: u16::from_le_bytes([element[2], element[3]]),
            },
            value: element[4],
        })
    })
}

/// Parses a masked-value listing: count16 + count × (address16 + masking8 +
/// value8).
pub fn parse_masked_value_list(bytes: &[u8]) -> Result<Vec<MaskedAddressValue>, WireError> {
    parse_counted(bytes, 4, |element| {
        Ok(MaskedAddressValue {
            address: u16::from_le_bytes([element[0], element[1]]),
            masked: element[2] != 0,
            value: element[3],
        })
    })
}

/// Parses a mask-universe snapshot: 64 mask bytes followed by 512 values.
pub fn parse_mask_universe_data(bytes: &[u8]) -> Result<MaskUniverseData, WireError> {
    require_len(bytes, MASK_BYTES + UNIVERSE_SIZE)?;
    // The window is checked above, so unpack cannot fail.
    let mask = ChannelMask::unpack(bytes, 0, MASK_BYTES)
        .expect("mask window is in bounds after length check");
    let mut data = [0u8; UNIVERSE_SIZE];
    data.copy_from_slice(&bytes[MASK_BYTES..MASK_BYTES + UNIVERSE_SIZE]);
    Ok(MaskUniverseData { mask, data })
}

/// Parses a full 512-byte universe snapshot.
pub fn parse_universe_data(bytes: &[u8]) -> Result<[u8; UNIVERSE_SIZE], WireError> {
    require_len(bytes, UNIVERSE_SIZE)?;
    let mut data = [0u8; UNIVERSE_SIZE];
    data.copy_from_slice(&bytes[..UNIVERSE_SIZE]);
    Ok(data)
}

// ── Parse helpers ─────────────────────────────────────────────────────────────

fn require_len(bytes: &[u8], needed: usize) -> Result<(), WireError> {
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Walks a count-prefixed array, applying `parse` to each fixed-size element.
fn parse_counted<T>(
    bytes: &[u8],
    element_size: usize,
    parse: impl Fn(&[u8]) -> Result<T, WireError>,
) -> Result<Vec<T>, WireError> {
    require_len(bytes, 2)?;
    let count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    require_len(bytes, 2 + count * element_size)?;

    let mut items = Vec::with_capacity(count);
    for index in 0..count {
        let start = 2 + index * element_size;
        items.push(parse(&bytes[start..start + element_size])?);
    }
    Ok(items)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
