//! Event subscription and fan-out
//!
//! Clients subscribe with an interest mask and their `(client type, id)`.
//! Operations that change device, routing or voice state broadcast an
//! event; the dispatcher picks the listeners that should hear it and
//! builds a payload shaped for each one.
//!
//! # Delivery
//!
//! ```text
//!   operation (lock held)                   caller thread (lock released)
//!   ┌────────────────────────────┐          ┌─────────────────────────┐
//!   │ broadcast(kind, dev, filt) │          │ for delivery in outbox: │
//!   │   for entry in listeners:  │  outbox  │   listener.on_event(..) │
//!   │     filter, build payload ─┼────────► │                         │
//!   └────────────────────────────┘          └─────────────────────────┘
//! ```
//!
//! Deliveries keep registration order. A listener may call back into the
//! control plane; its calls see every state change made by the operation
//! that raised the event.

mod dispatch;
pub mod kind;
pub mod listener;
pub mod payload;

pub use kind::{EventKind, EventMask, SessionFilter};
pub use listener::{EventListener, ListenerEntry, ListenerRegistry};
pub use payload::{
    CalibrationInfo, EventPayload, FrequencyInfo, VoiceDeviceInfo, VoiceVolumeMute, VolumeOrMute,
};
