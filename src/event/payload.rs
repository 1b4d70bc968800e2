//! Event payloads
//!
//! The dispatcher builds one payload per delivery. Its shape depends on the
//! listener's client type and the event kind.

use crate::device::{Capability, DeviceId};
use crate::routing::{Direction, VoiceState};

/// Data delivered with an event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventPayload {
    /// Nothing beyond the event kind
    #[default]
    Empty,
    /// Decoder stream volume
    StreamVolume(i32),
    /// New device rate
    Frequency(FrequencyInfo),
    /// Current voice-call state
    VoiceState(VoiceState),
    /// Mixer port of the device
    RoutingId(u32),
    /// Voice volume or mute for one path
    VoiceVolumeMute(VoiceVolumeMute),
    /// Voice device description
    VoiceDevice(VoiceDeviceInfo),
    /// Calibration view of a device
    Calibration(CalibrationInfo),
}

/// Rate change details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyInfo {
    pub sample_rate: u32,
    pub capability: Capability,
    pub vendor_id: u32,
}

/// Volume level or mute flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOrMute {
    Volume(i32),
    Mute(bool),
}

/// Voice volume/mute change on one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceVolumeMute {
    pub direction: Direction,
    pub vendor_id: u32,
    pub value: VolumeOrMute,
}

/// Voice device description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceDeviceInfo {
    pub device_id: DeviceId,
    pub direction: Direction,
    pub vendor_id: u32,
    /// Negotiated rate, or the native rate when unset
    pub sample_rate: u32,
    /// Volume table index, rx devices only
    pub volume_index: Option<i32>,
}

/// Calibration view of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationInfo {
    /// Mixer port of the device
    pub routing_id: u32,
    pub vendor_id: u32,
    pub direction: Direction,
    /// Negotiated rate, or the native rate when unset
    pub sample_rate: u32,
    /// Encoder lane for tx devices, decoder lane for rx devices
    pub sessions: u8,
}
