//! Session lanes
//!
//! A device's session set is one packed 32-bit word split into four 8-bit
//! lanes, one per client type:
//!
//! ```text
//!  31        24 23        16 15         8 7          0
//! ┌────────────┬────────────┬────────────┬────────────┐
//! │ reserved   │ encoder    │ decoder    │ voice      │
//! └────────────┴────────────┴────────────┴────────────┘
//! ```
//!
//! Bit `b` of lane `t` is set when client `b` of type `t` is routed through
//! the device. Arbitration relies on cross-lane checks against the packed
//! word, so the representation stays a single integer.

use std::fmt;

/// Bits per lane, which also bounds the session ids of one client type
pub const LANE_WIDTH: u32 = 8;

const LANE_BITS: u32 = 0xFF;

/// Category of audio consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    /// Voice call
    Voice,
    /// Playback session
    Decoder,
    /// Capture session
    Encoder,
    /// Calibration tooling (lane reserved, never routed)
    Calibration,
}

impl ClientType {
    /// Lane index inside the packed session word
    pub fn lane(self) -> u32 {
        match self {
            ClientType::Voice => 0,
            ClientType::Decoder => 1,
            ClientType::Encoder => 2,
            ClientType::Calibration => 3,
        }
    }

    fn shift(self) -> u32 {
        self.lane() * LANE_WIDTH
    }
}

/// Stream direction of a device or voice path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Playback / downlink
    Rx,
    /// Capture / uplink
    Tx,
}

/// Packed per-device session set
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionMask(u32);

impl SessionMask {
    /// No sessions
    pub const EMPTY: SessionMask = SessionMask(0);

    /// Wrap a raw packed word
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw packed word
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Single-session mask for `client_id` in the lane of `client_type`
    ///
    /// Returns `None` when the id does not fit in a lane.
    pub fn session(client_type: ClientType, client_id: u32) -> Option<Self> {
        if client_id >= LANE_WIDTH {
            return None;
        }
        Some(Self((1 << client_id) << client_type.shift()))
    }

    /// Every bit of one lane
    pub fn lane_mask(client_type: ClientType) -> Self {
        Self(LANE_BITS << client_type.shift())
    }

    /// The 8 bits of one lane, shifted down
    pub fn lane(self, client_type: ClientType) -> u8 {
        ((self.0 >> client_type.shift()) & LANE_BITS) as u8
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any bit is shared
    pub fn intersects(self, other: SessionMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set
    pub fn contains(self, other: SessionMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bits in common
    pub fn intersection(self, other: SessionMask) -> SessionMask {
        Self(self.0 & other.0)
    }

    /// Bits of `self` not in `other`
    pub fn without(self, other: SessionMask) -> SessionMask {
        Self(self.0 & !other.0)
    }

    pub fn insert(&mut self, other: SessionMask) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: SessionMask) {
        self.0 &= !other.0;
    }

    /// Drop every session of one client type
    pub fn clear_lane(&mut self, client_type: ClientType) {
        self.remove(Self::lane_mask(client_type));
    }
}

impl fmt::Debug for SessionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionMask({:#010x})", self.0)
    }
}

impl fmt::Display for SessionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
