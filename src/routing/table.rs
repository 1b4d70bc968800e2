//! Routing table
//!
//! Per-session mixer bitmasks and rate bookkeeping for decoder and encoder
//! sessions, plus the voice-call routing state. Bit `d` of a session's
//! route mask means the session is mixed to device `d`; the registry keeps
//! the mirror image in each device's session lane.

use super::lane::{ClientType, Direction};
use crate::device::DeviceId;
use crate::error::{DevCtlError, Result};

/// Voice volume value meaning "report the mute flag instead"
pub const VOLUME_USE_MUTE: i32 = -1;

/// Kind of routable session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Playback
    Decoder,
    /// Capture
    Encoder,
}

impl SessionKind {
    pub fn client_type(self) -> ClientType {
        match self {
            SessionKind::Decoder => ClientType::Decoder,
            SessionKind::Encoder => ClientType::Encoder,
        }
    }

    pub fn from_client_type(client_type: ClientType) -> Option<Self> {
        match client_type {
            ClientType::Decoder => Some(SessionKind::Decoder),
            ClientType::Encoder => Some(SessionKind::Encoder),
            _ => None,
        }
    }
}

/// State of the voice call as last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Invalid,
    InCall,
    OffCall,
}

/// Rate bookkeeping for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFrequency {
    /// Last rate requested by, or reported to, the session (0 = none)
    pub rate: u32,
    /// The session caused the last rate change and must not be told about it
    pub pending_notify: bool,
}

/// Voice-call routing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceRouting {
    pub rx_device: Option<DeviceId>,
    pub tx_device: Option<DeviceId>,
    pub rx_volume: i32,
    pub tx_volume: i32,
    pub rx_mute: bool,
    pub tx_mute: bool,
    /// Last tx rate reported to voice clients
    pub tx_rate: u32,
    pub rx_rate: u32,
    pub state: VoiceState,
}

impl Default for VoiceRouting {
    fn default() -> Self {
        Self {
            rx_device: None,
            tx_device: None,
            rx_volume: VOLUME_USE_MUTE,
            tx_volume: VOLUME_USE_MUTE,
            rx_mute: false,
            tx_mute: false,
            tx_rate: 0,
            rx_rate: 0,
            state: VoiceState::Invalid,
        }
    }
}

impl VoiceRouting {
    pub fn device(&self, direction: Direction) -> Option<DeviceId> {
        match direction {
            Direction::Rx => self.rx_device,
            Direction::Tx => self.tx_device,
        }
    }

    /// Both voice paths are routed
    pub fn is_routed(&self) -> bool {
        self.rx_device.is_some() && self.tx_device.is_some()
    }
}

#[derive(Debug, Clone)]
struct SessionSlot {
    route_mask: u32,
    frequency: SessionFrequency,
}

/// Process-wide routing state
#[derive(Debug, Clone)]
pub struct RoutingTable {
    decoders: Vec<SessionSlot>,
    encoders: Vec<SessionSlot>,
    pub voice: VoiceRouting,
    /// Last stream volume set for decoder sessions
    pub stream_volume: i32,
}

impl RoutingTable {
    pub fn new(decoder_sessions: u32, encoder_sessions: u32) -> Self {
        let slot = SessionSlot {
            route_mask: 0,
            frequency: SessionFrequency::default(),
        };
        Self {
            decoders: vec![slot.clone(); decoder_sessions as usize],
            encoders: vec![slot; encoder_sessions as usize],
            voice: VoiceRouting::default(),
            stream_volume: 0,
        }
    }

    /// Number of sessions of one kind
    pub fn capacity(&self, kind: SessionKind) -> u32 {
        self.slots(kind).len() as u32
    }

    /// Check a session id against its per-type capacity
    ///
    /// Voice has exactly one session, id 0. Calibration clients have none.
    pub fn check_session(&self, client_type: ClientType, session_id: u32) -> Result<()> {
        let valid = match client_type {
            ClientType::Voice => session_id == 0,
            ClientType::Decoder => session_id < self.capacity(SessionKind::Decoder),
            ClientType::Encoder => session_id < self.capacity(SessionKind::Encoder),
            ClientType::Calibration => false,
        };
        if valid {
            Ok(())
        } else {
            Err(DevCtlError::session_out_of_range(client_type, session_id))
        }
    }

    /// Route bitmask of one session
    pub fn route_mask(&self, kind: SessionKind, session_id: u32) -> Result<u32> {
        Ok(self.slot(kind, session_id)?.route_mask)
    }

    /// Set or clear device bit `device_id` in a session's route bitmask
    pub fn set_route_bit(
        &mut self,
        kind: SessionKind,
        session_id: u32,
        device_id: DeviceId,
        enable: bool,
    ) -> Result<()> {
        let bit = 1u32.checked_shl(device_id).ok_or(DevCtlError::OutOfRange {
            what: "device",
            id: device_id,
        })?;
        let slot = self.slot_mut(kind, session_id)?;
        if enable {
            slot.route_mask |= bit;
        } else {
            slot.route_mask &= !bit;
        }
        Ok(())
    }

    /// Clear every route of a session
    pub fn clear_routes(&mut self, kind: SessionKind, session_id: u32) -> Result<()> {
        self.slot_mut(kind, session_id)?.route_mask = 0;
        Ok(())
    }

    pub fn frequency(&self, kind: SessionKind, session_id: u32) -> Result<SessionFrequency> {
        Ok(self.slot(kind, session_id)?.frequency)
    }

    pub fn frequency_mut(
        &mut self,
        kind: SessionKind,
        session_id: u32,
    ) -> Result<&mut SessionFrequency> {
        Ok(&mut self.slot_mut(kind, session_id)?.frequency)
    }

    fn slots(&self, kind: SessionKind) -> &[SessionSlot] {
        match kind {
            SessionKind::Decoder => &self.decoders,
            SessionKind::Encoder => &self.encoders,
        }
    }

    fn slot(&self, kind: SessionKind, session_id: u32) -> Result<&SessionSlot> {
        self.slots(kind)
            .get(session_id as usize)
            .ok_or_else(|| DevCtlError::session_out_of_range(kind.client_type(), session_id))
    }

    fn slot_mut(&mut self, kind: SessionKind, session_id: u32) -> Result<&mut SessionSlot> {
        let slots = match kind {
            SessionKind::Decoder => &mut self.decoders,
            SessionKind::Encoder => &mut self.encoders,
        };
        slots
            .get_mut(session_id as usize)
            .ok_or_else(|| DevCtlError::session_out_of_range(kind.client_type(), session_id))
    }
}
