//! Session routing and sample-rate arbitration
//!
//! The routing table maps decoder and encoder sessions onto devices and
//! holds the voice-call route. Every change is mirrored into the session
//! lanes of the affected devices, so the two views never diverge:
//!
//! ```text
//!   RoutingTable                          DeviceRegistry
//!   decoder[s].route_mask bit d   <==>   device[d].sessions decoder lane bit s
//!   encoder[s].route_mask bit d   <==>   device[d].sessions encoder lane bit s
//!   voice rx/tx device d          <==>   device[d].sessions voice lane bit 0
//! ```
//!
//! Sample rates are arbitrated per device: the highest rate requested by
//! the sessions sharing a device wins, except that a device serving more
//! than one client type only moves to 8, 16 or 48 kHz.

pub mod frequency;
pub mod lane;
mod mixer;
pub mod table;
mod voice;

pub use frequency::{is_supported_rate, SAFE_SHARED_RATES, SUPPORTED_RATES};
pub use lane::{ClientType, Direction, SessionMask, LANE_WIDTH};
pub use table::{
    RoutingTable, SessionFrequency, SessionKind, VoiceRouting, VoiceState, VOLUME_USE_MUTE,
};
