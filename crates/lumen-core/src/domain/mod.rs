//! Domain module: pure value logic with no wire or I/O dependencies.

pub mod device;
pub mod mask;

pub use device::{DeviceInfo, PortDescriptor};
pub use mask::{ChannelMask, MaskError};
