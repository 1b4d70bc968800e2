//! Control surface
//!
//! Configuration tools drive the control plane through a small
//! command/response protocol: enumerate devices, open and close them,
//! route streams and read back the routing state. [`codec`] holds the wire
//! format; the handler runs each request under a single lock acquisition.

pub mod codec;
mod handler;

pub use codec::{
    ControlRequest, ControlResponse, RoutingSnapshot, StreamType, NAME_LEN, ROUTE_ENABLE,
};
