//! Parser for the identify handshake record.
//!
//! Unlike every other reply, identify answers with *text*: a JSON record
//! terminated by a double line-break. The accumulator treats the terminator
//! as the completion rule ([`crate::protocol::response::ResponseShape::Text`]);
//! this module turns the
//! completed bytes into a [`DeviceInfo`]. A record without a `version` field
//! is invalid even when it parses as JSON.
//!
//! Minimal accepted record:
//!
//! ```text
//! {"version":"1.0"}
//!
//! ```
//!
//! Full record:
//!
//! ```text
//! {"version":"1.4.2","name":"rig-left","model":"LX-2",
//!  "ports":[{"port":0,"mode":"output"},{"port":1,"mode":"input"}],
//!  "features":["masks","patching"]}
//!
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::device::{DeviceInfo, PortDescriptor, PortMode};

/// Reasons an identify reply is rejected.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The record bytes are not valid UTF-8.
    #[error("identify response is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The record is not valid JSON.
    #[error("identify response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The record parsed but carries no version field.
    #[error("identify response is missing the version field")]
    MissingVersion,

    /// A port entry carries a mode string the client does not know.
    #[error("identify response names unknown port mode {0:?}")]
    UnknownPortMode(String),
}

/// Raw serde view of the record; converted to [`DeviceInfo`] after
/// validation.
#[derive(Debug, Deserialize)]
struct RawIdentify {
    version: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    ports: Vec<RawPort>,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPort {
    port: u16,
    mode: String,
}

/// Parses a complete identify reply into a [`DeviceInfo`].
///
/// # Errors
///
/// Returns [`IdentifyError`] when the bytes are not UTF-8, not JSON, carry
/// no version, or name an unknown port mode.
pub fn parse_identify(bytes: &[u8]) -> Result<DeviceInfo, IdentifyError> {
    let text = std::str::from_utf8(bytes)?;
    let raw: RawIdentify = serde_json::from_str(text.trim_end())?;

    let version = raw.version.ok_or(IdentifyError::MissingVersion)?;

    let mut ports = Vec::with_capacity(raw.ports.len());
    for port in raw.ports {
        let mode = PortMode::from_name(&port.mode)
            .ok_or_else(|| IdentifyError::UnknownPortMode(port.mode.clone()))?;
        ports.push(PortDescriptor {
            index: port.port,
            mode,
        });
    }

    Ok(DeviceInfo {
        version,
        name: raw.name,
        model: raw.model,
        ports,
        features: raw.features.into_iter().collect::<BTreeSet<_>>(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_parses_version() {
        let info = parse_identify(b"{\"version\":\"1.0\"}\n\n").unwrap();
        assert_eq!(info.version, "1.0");
        assert_eq!(info.name, None);
        assert_eq!(info.model, None);
        assert!(info.ports.is_empty());
        assert!(info.features.is_empty());
    }

    #[test]
    fn test_full_record_parses_all_fields() {
        let record = concat!(
            "{\"version\":\"1.4.2\",\"name\":\"rig-left\",\"model\":\"LX-2\",",
            "\"ports\":[{\"port\":0,\"mode\":\"output\"},{\"port\":1,\"mode\":\"input\"}],",
            "\"features\":[\"masks\",\"patching\"]}\n\n"
        );
        let info = parse_identify(record.as_bytes()).unwrap();

        assert_eq!(info.version, "1.4.2");
        assert_eq!(info.name.as_deref(), Some("rig-left"));
        assert_eq!(info.model.as_deref(), Some("LX-2"));
        assert_eq!(
            info.ports,
            vec![
                PortDescriptor {
                    index: 0,
                    mode: PortMode::Output
                },
                PortDescriptor {
                    index: 1,
                    mode: PortMode::Input
                },
            ]
        );
        assert!(info.has_feature("masks"));
        assert!(info.has_feature("patching"));
    }

    #[test]
    fn test_non_json_record_is_rejected() {
        let result = parse_identify(b"not json\n\n");
        assert!(matches!(result, Err(IdentifyError::Json(_))));
    }

    #[test]
    fn test_record_without_version_is_rejected() {
        let result = parse_identify(b"{\"name\":\"rig\"}\n\n");
        assert!(matches!(result, Err(IdentifyError::MissingVersion)));
    }

    #[test]
    fn test_unknown_port_mode_is_rejected() {
        let record = b"{\"version\":\"1\",\"ports\":[{\"port\":0,\"mode\":\"sideways\"}]}\n\n";
        match parse_identify(record) {
            Err(IdentifyError::UnknownPortMode(mode)) => assert_eq!(mode, "sideways"),
            other => panic!("expected UnknownPortMode, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let result = parse_identify(&[0xFF, 0xFE, b'\n', b'\n']);
        assert!(matches!(result, Err(IdentifyError::Utf8(_))));
    }

    #[test]
    fn test_crlf_terminated_record_parses() {
        let info = parse_identify(b"{\"version\":\"2.0\"}\r\n\r\n").unwrap();
        assert_eq!(info.version, "2.0");
    }

    #[test]
    fn test_duplicate_features_collapse_into_set() {
        let info =
            parse_identify(b"{\"version\":\"1\",\"features\":[\"masks\",\"masks\"]}\n\n").unwrap();
        assert_eq!(info.features.len(), 1);
    }
}
