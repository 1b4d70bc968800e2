//! Event kinds, interest masks and session filters

use std::fmt;
use std::ops::BitOr;

use crate::routing::SessionMask;

/// Kind of control-plane event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Voice path moved to another device
    DeviceChangeVoice,
    /// Device is up and running at its negotiated rate
    DeviceReady,
    /// Device is going away
    DeviceRelease,
    /// A release is about to follow
    ReleasePending,
    /// Voice volume or mute changed on a device
    DeviceVolumeMuteChange,
    /// Voice call started
    StartVoice,
    /// Voice call ended
    EndVoice,
    /// Stream volume of a decoder session changed
    StreamVolumeChange,
    /// Device sample rate is about to change
    FrequencyChange,
    /// Voice call state changed
    VoiceStateChange,
}

impl EventKind {
    /// Every event kind
    pub const ALL: [EventKind; 10] = [
        EventKind::DeviceChangeVoice,
        EventKind::DeviceReady,
        EventKind::DeviceRelease,
        EventKind::ReleasePending,
        EventKind::DeviceVolumeMuteChange,
        EventKind::StartVoice,
        EventKind::EndVoice,
        EventKind::StreamVolumeChange,
        EventKind::FrequencyChange,
        EventKind::VoiceStateChange,
    ];

    /// Bit of this kind inside an [`EventMask`]
    pub const fn bit(self) -> u32 {
        match self {
            EventKind::DeviceChangeVoice => 0x001,
            EventKind::DeviceReady => 0x002,
            EventKind::DeviceRelease => 0x004,
            EventKind::ReleasePending => 0x008,
            EventKind::DeviceVolumeMuteChange => 0x010,
            EventKind::StartVoice => 0x020,
            EventKind::EndVoice => 0x040,
            EventKind::StreamVolumeChange => 0x080,
            EventKind::FrequencyChange => 0x100,
            EventKind::VoiceStateChange => 0x200,
        }
    }

    /// Events that carry no device
    pub fn is_device_independent(self) -> bool {
        matches!(
            self,
            EventKind::StartVoice
                | EventKind::EndVoice
                | EventKind::StreamVolumeChange
                | EventKind::VoiceStateChange
        )
    }
}

/// Set of event kinds a listener wants
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Every event kind
    pub fn all() -> Self {
        EventKind::ALL.iter().copied().map(EventMask::from).fold(Self::NONE, |a, b| a | b)
    }

    pub fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        Self(kind.bit())
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOr<EventKind> for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventKind) -> EventMask {
        EventMask(self.0 | rhs.bit())
    }
}

impl BitOr for EventKind {
    type Output = EventMask;

    fn bitor(self, rhs: EventKind) -> EventMask {
        EventMask(self.bit() | rhs.bit())
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(EventKind::ALL.iter().filter(|k| self.contains(**k)))
            .finish()
    }
}

/// Which listeners a device-scoped broadcast reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFilter {
    /// Every interested listener, routed or not
    #[default]
    Ignore,
    /// Listeners whose session bits on the device equal this mask exactly
    Mask(SessionMask),
}
