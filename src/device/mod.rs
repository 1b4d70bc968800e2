//! Endpoint devices
//!
//! Drivers describe a device with [`DeviceInfo`] and hand its hardware
//! operations over as a boxed [`DeviceOps`]. The [`DeviceRegistry`] owns both
//! for the lifetime of the control plane and tracks the mutable per-device
//! state: negotiated rate, open status, volume and the packed session set.

pub mod capability;
pub mod entry;
mod mock;
pub mod registry;

pub use capability::{Capability, DeviceOps};
pub use entry::{Device, DeviceDescriptor, DeviceId, DeviceInfo, DeviceStatus};
pub use mock::{MockDevice, MockDeviceHandle};
pub use registry::DeviceRegistry;
