//! Protocol module: outbound framing, the request catalog, and the
//! response-completion state machine for the unframed inbound stream.

pub mod codec;
pub mod identify;
pub mod messages;
pub mod response;

pub use codec::{frame, frame_header, WireError};
pub use identify::{parse_identify, IdentifyError};
pub use messages::*;
pub use response::{ResponseAssembler, ResponseShape};
