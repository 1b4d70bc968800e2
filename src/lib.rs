//! Audio endpoint device control plane
//!
//! Multiplexes logical audio clients (a voice call, decoder sessions,
//! encoder sessions and calibration tooling) onto a fixed set of endpoint
//! devices. The control plane tracks which device serves which session,
//! settles one sample rate per device and tells interested clients about
//! routing, volume, rate and lifecycle changes.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<AudioDevCtl>
//!              ┌──────────────────────────────────────┐
//!              │ Mutex<State>                         │
//!              │   DeviceRegistry   (devices, lanes)  │
//!              │   RoutingTable     (routes, rates)   │
//!              │   ListenerRegistry (subscriptions)   │
//!              └──────────────────┬───────────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        │                        │                        │
//!   [drivers]               [session clients]       [control tools]
//!   register()              subscribe()             handle_control_message()
//!   DeviceOps               set_session_route()
//!                           request_frequency()
//! ```
//!
//! # Example
//!
//! ```
//! use audio_devctl::{AudioDevCtl, Capability, DeviceInfo, Direction, MockDevice};
//!
//! let ctl = AudioDevCtl::new();
//! let rx = ctl
//!     .register(
//!         DeviceInfo::new("handset_rx", Capability::RX | Capability::VOICE),
//!         Box::new(MockDevice::new()),
//!     )
//!     .unwrap();
//! let tx = ctl
//!     .register(
//!         DeviceInfo::new("handset_tx", Capability::TX | Capability::VOICE),
//!         Box::new(MockDevice::new()),
//!     )
//!     .unwrap();
//!
//! ctl.set_voice_route(Direction::Rx, rx).unwrap();
//! ctl.set_voice_route(Direction::Tx, tx).unwrap();
//! ctl.set_voice_mute(Direction::Tx, true).unwrap();
//! ```

pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod event;
pub mod routing;
mod store;

pub use config::DevCtlConfig;
pub use control::{ControlRequest, ControlResponse, RoutingSnapshot, StreamType};
pub use device::{
    Capability, DeviceDescriptor, DeviceId, DeviceInfo, DeviceOps, DeviceStatus, MockDevice,
    MockDeviceHandle,
};
pub use error::{ControlError, DevCtlError, DeviceError, Result};
pub use event::{
    CalibrationInfo, EventKind, EventListener, EventMask, EventPayload, FrequencyInfo,
    SessionFilter, VoiceDeviceInfo, VoiceVolumeMute, VolumeOrMute,
};
pub use routing::{ClientType, Direction, SessionKind, SessionMask, VoiceState};
pub use store::AudioDevCtl;
