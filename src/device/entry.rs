//! Device entry and descriptor types
//!
//! This module defines the per-device state stored in the registry.

use std::fmt;

use super::capability::{Capability, DeviceOps};
use crate::routing::SessionMask;

/// Index of a device in the registry, assigned at registration
pub type DeviceId = u32;

/// Static description supplied by a driver at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable name (e.g. "handset_rx")
    pub name: String,
    /// Capability flags
    pub capability: Capability,
    /// Vendor calibration id
    pub vendor_id: u32,
    /// Mixer port this device is attached to
    pub routing_id: u32,
    /// Native sample rate, reported when no rate has been negotiated
    pub default_sample_rate: u32,
    /// Volume table index reported to voice clients on rx devices
    pub volume_index: i32,
}

impl DeviceInfo {
    /// Create a descriptor with the given name and capabilities
    pub fn new(name: impl Into<String>, capability: Capability) -> Self {
        Self {
            name: name.into(),
            capability,
            vendor_id: 0,
            routing_id: 0,
            default_sample_rate: 48000,
            volume_index: 0,
        }
    }

    /// Set the vendor calibration id
    pub fn vendor_id(mut self, id: u32) -> Self {
        self.vendor_id = id;
        self
    }

    /// Set the mixer port
    pub fn routing_id(mut self, id: u32) -> Self {
        self.routing_id = id;
        self
    }

    /// Set the native sample rate
    pub fn default_sample_rate(mut self, rate: u32) -> Self {
        self.default_sample_rate = rate;
        self
    }

    /// Set the volume table index
    pub fn volume_index(mut self, index: i32) -> Self {
        self.volume_index = index;
        self
    }
}

/// A registered endpoint device
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) info: DeviceInfo,
    /// Sessions currently routed through this device
    pub(crate) sessions: SessionMask,
    /// Negotiated rate, 0 when unset
    pub(crate) sample_rate: u32,
    pub(crate) opened: bool,
    pub(crate) volume: i32,
    pub(crate) ops: Box<dyn DeviceOps>,
}

impl Device {
    pub(crate) fn new(id: DeviceId, info: DeviceInfo, ops: Box<dyn DeviceOps>) -> Self {
        Self {
            id,
            info,
            sessions: SessionMask::EMPTY,
            sample_rate: 0,
            opened: false,
            volume: 0,
            ops,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn capability(&self) -> Capability {
        self.info.capability
    }

    pub fn sessions(&self) -> SessionMask {
        self.sessions
    }

    /// Negotiated rate, 0 when unset
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated rate, or the native rate when none has been negotiated
    pub fn effective_sample_rate(&self) -> u32 {
        if self.sample_rate != 0 {
            self.sample_rate
        } else {
            self.info.default_sample_rate
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    /// Public descriptor for enumeration
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            id: self.id,
            capability: self.info.capability,
            name: self.info.name.clone(),
        }
    }

    /// Snapshot of the mutable state
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            id: self.id,
            capability: self.info.capability,
            sessions: self.sessions,
            sample_rate: self.sample_rate,
            opened: self.opened,
            volume: self.volume,
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.info.name)
            .field("capability", &self.info.capability)
            .field("sessions", &self.sessions)
            .field("sample_rate", &self.sample_rate)
            .field("opened", &self.opened)
            .finish()
    }
}

/// Enumeration entry: id, capabilities and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub capability: Capability,
    pub name: String,
}

/// Point-in-time view of a device's mutable state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub capability: Capability,
    pub sessions: SessionMask,
    /// Negotiated rate, 0 when unset
    pub sample_rate: u32,
    pub opened: bool,
    pub volume: i32,
}
