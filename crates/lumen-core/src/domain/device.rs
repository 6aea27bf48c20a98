//! Device identity: the metadata a device reports about itself.
//!
//! The identify handshake (see [`crate::protocol::identify`]) returns a text
//! record describing the firmware version, an optional human-readable name
//! and model string, the physical port bindings, and the feature names the
//! firmware supports. The client caches the last successful record per
//! device.

use std::collections::BTreeSet;
use std::fmt;

/// Direction of a physical or logical universe port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    /// The port drives channel data out of the device.
    Output,
    /// The port feeds channel data into the device.
    Input,
}

impl PortMode {
    /// Parses the mode string used in the identify record.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "output" => Some(Self::Output),
            "input" => Some(Self::Input),
            _ => None,
        }
    }

    /// The single-byte wire encoding used by port listings.
    pub fn wire(self) -> u8 {
        match self {
            Self::Output => 0x00,
            Self::Input => 0x01,
        }
    }

    /// Decodes the single-byte wire form.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Output),
            0x01 => Some(Self::Input),
            _ => None,
        }
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => f.write_str("output"),
            Self::Input => f.write_str("input"),
        }
    }
}

/// One index-addressed port entry from the identify record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Zero-based port index on the device.
    pub index: u16,
    /// Direction of the port.
    pub mode: PortMode,
}

/// Last-known identity and metadata of a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version. The only field the handshake requires.
    pub version: String,
    /// User-assigned device name, if the firmware reports one.
    pub name: Option<String>,
    /// Hardware model string, if the firmware reports one.
    pub model: Option<String>,
    /// Index-addressed port descriptors.
    pub ports: Vec<PortDescriptor>,
    /// Names of optional firmware features.
    pub features: BTreeSet<String>,
}

impl DeviceInfo {
    /// Whether the device advertises a named feature.
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains(name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
