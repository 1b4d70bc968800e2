//! Control-request wire format
//!
//! Little-endian, fixed-width fields. A request is a `u32` command code
//! followed by its arguments; a response is an `i32` status followed, when
//! the status is 0, by a command-specific body.
//!
//! ```text
//! Request
//!   1  GetDeviceCount
//!   2  GetDevices          u32 max_entries
//!   3  EnableDevice        u32 device_id
//!   4  DisableDevice       u32 device_id
//!   5  RouteStream         u32 stream_type, u32 device_id, u32 stream_id
//!   6  GetRoutingSnapshot
//!
//! Response body
//!   GetDeviceCount         u32 count
//!   GetDevices             u32 n, n x (u32 id, u32 capability, [u8; 64] name)
//!   GetRoutingSnapshot     u32 opened_mask, i32 voice_rx, i32 voice_tx
//!   others                 (empty)
//! ```
//!
//! Bit 31 of a `RouteStream` stream id means "enable"; the low bits are the
//! session id. Device names are NUL padded and truncated to 63 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::device::{Capability, DeviceDescriptor, DeviceId};
use crate::error::{ControlError, DevCtlError};

const CMD_GET_DEVICE_COUNT: u32 = 1;
const CMD_GET_DEVICES: u32 = 2;
const CMD_ENABLE_DEVICE: u32 = 3;
const CMD_DISABLE_DEVICE: u32 = 4;
const CMD_ROUTE_STREAM: u32 = 5;
const CMD_GET_ROUTING_SNAPSHOT: u32 = 6;

/// Stream-id flag requesting the route be enabled
pub const ROUTE_ENABLE: u32 = 0x8000_0000;

/// Size of the name field in a device record
pub const NAME_LEN: usize = 64;

/// Voice device id on the wire when unset
const NO_DEVICE: i32 = -1;

/// Stream a `RouteStream` request applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    VoiceRx,
    VoiceTx,
    /// Decoder session
    Playback,
    /// Encoder session
    Record,
}

impl StreamType {
    pub fn from_u32(value: u32) -> Result<Self, ControlError> {
        match value {
            0 => Ok(StreamType::VoiceRx),
            1 => Ok(StreamType::VoiceTx),
            2 => Ok(StreamType::Playback),
            3 => Ok(StreamType::Record),
            other => Err(ControlError::UnknownStreamType(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            StreamType::VoiceRx => 0,
            StreamType::VoiceTx => 1,
            StreamType::Playback => 2,
            StreamType::Record => 3,
        }
    }
}

/// A decoded control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    GetDeviceCount,
    GetDevices {
        max_entries: u32,
    },
    EnableDevice(DeviceId),
    DisableDevice(DeviceId),
    RouteStream {
        stream_type: StreamType,
        device_id: DeviceId,
        session_id: u32,
        enable: bool,
    },
    GetRoutingSnapshot,
}

impl ControlRequest {
    /// Decode one request; the buffer must hold exactly one message
    pub fn decode(buf: &mut Bytes) -> Result<Self, ControlError> {
        let request = match read_u32(buf)? {
            CMD_GET_DEVICE_COUNT => ControlRequest::GetDeviceCount,
            CMD_GET_DEVICES => ControlRequest::GetDevices {
                max_entries: read_u32(buf)?,
            },
            CMD_ENABLE_DEVICE => ControlRequest::EnableDevice(read_u32(buf)?),
            CMD_DISABLE_DEVICE => ControlRequest::DisableDevice(read_u32(buf)?),
            CMD_ROUTE_STREAM => {
                let stream_type = StreamType::from_u32(read_u32(buf)?)?;
                let device_id = read_u32(buf)?;
                let stream_id = read_u32(buf)?;
                ControlRequest::RouteStream {
                    stream_type,
                    device_id,
                    session_id: stream_id & !ROUTE_ENABLE,
                    enable: stream_id & ROUTE_ENABLE != 0,
                }
            }
            CMD_GET_ROUTING_SNAPSHOT => ControlRequest::GetRoutingSnapshot,
            other => return Err(ControlError::UnknownCommand(other)),
        };

        if buf.has_remaining() {
            return Err(ControlError::TrailingBytes(buf.remaining()));
        }
        Ok(request)
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        match *self {
            ControlRequest::GetDeviceCount => buf.put_u32_le(CMD_GET_DEVICE_COUNT),
            ControlRequest::GetDevices { max_entries } => {
                buf.put_u32_le(CMD_GET_DEVICES);
                buf.put_u32_le(max_entries);
            }
            ControlRequest::EnableDevice(id) => {
                buf.put_u32_le(CMD_ENABLE_DEVICE);
                buf.put_u32_le(id);
            }
            ControlRequest::DisableDevice(id) => {
                buf.put_u32_le(CMD_DISABLE_DEVICE);
                buf.put_u32_le(id);
            }
            ControlRequest::RouteStream {
                stream_type,
                device_id,
                session_id,
                enable,
            } => {
                buf.put_u32_le(CMD_ROUTE_STREAM);
                buf.put_u32_le(stream_type.as_u32());
                buf.put_u32_le(device_id);
                let flag = if enable { ROUTE_ENABLE } else { 0 };
                buf.put_u32_le((session_id & !ROUTE_ENABLE) | flag);
            }
            ControlRequest::GetRoutingSnapshot => buf.put_u32_le(CMD_GET_ROUTING_SNAPSHOT),
        }
        buf.freeze()
    }
}

/// Opened devices and voice route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoutingSnapshot {
    /// Bit `d` set when device `d` is open
    pub opened: u32,
    pub voice_rx: Option<DeviceId>,
    pub voice_tx: Option<DeviceId>,
}

/// Result of a control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Succeeded with no body
    Done,
    DeviceCount(u32),
    Devices(Vec<DeviceDescriptor>),
    Snapshot(RoutingSnapshot),
    /// Failed; only the status code goes on the wire
    Error(DevCtlError),
}

impl ControlResponse {
    /// Wire status of this response
    pub fn status(&self) -> i32 {
        match self {
            ControlResponse::Error(e) => e.status_code(),
            _ => 0,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_i32_le(self.status());

        match self {
            ControlResponse::Done | ControlResponse::Error(_) => {}
            ControlResponse::DeviceCount(count) => buf.put_u32_le(*count),
            ControlResponse::Devices(devices) => {
                buf.reserve(devices.len() * (8 + NAME_LEN));
                buf.put_u32_le(devices.len() as u32);
                for device in devices {
                    buf.put_u32_le(device.id);
                    buf.put_u32_le(device.capability.bits());
                    put_name(&mut buf, &device.name);
                }
            }
            ControlResponse::Snapshot(snapshot) => {
                buf.put_u32_le(snapshot.opened);
                buf.put_i32_le(device_or_unset(snapshot.voice_rx));
                buf.put_i32_le(device_or_unset(snapshot.voice_tx));
            }
        }
        buf.freeze()
    }

    /// Decode the response to `request`
    ///
    /// A non-zero status comes back as [`ControlError::Rejected`].
    pub fn decode(buf: &mut Bytes, request: &ControlRequest) -> Result<Self, ControlError> {
        let status = read_i32(buf)?;
        if status != 0 {
            return Err(ControlError::Rejected(status));
        }

        let response = match request {
            ControlRequest::GetDeviceCount => ControlResponse::DeviceCount(read_u32(buf)?),
            ControlRequest::GetDevices { .. } => {
                let count = read_u32(buf)? as usize;
                if buf.remaining() < count * (8 + NAME_LEN) {
                    return Err(ControlError::UnexpectedEof);
                }
                let mut devices = Vec::with_capacity(count);
                for _ in 0..count {
                    let id = buf.get_u32_le();
                    let capability = Capability::from_bits(buf.get_u32_le());
                    let name = take_name(buf);
                    devices.push(DeviceDescriptor {
                        id,
                        capability,
                        name,
                    });
                }
                ControlResponse::Devices(devices)
            }
            ControlRequest::GetRoutingSnapshot => ControlResponse::Snapshot(RoutingSnapshot {
                opened: read_u32(buf)?,
                voice_rx: unset_or_device(read_i32(buf)?),
                voice_tx: unset_or_device(read_i32(buf)?),
            }),
            ControlRequest::EnableDevice(_)
            | ControlRequest::DisableDevice(_)
            | ControlRequest::RouteStream { .. } => ControlResponse::Done,
        };

        if buf.has_remaining() {
            return Err(ControlError::TrailingBytes(buf.remaining()));
        }
        Ok(response)
    }
}

fn read_u32(buf: &mut Bytes) -> Result<u32, ControlError> {
    if buf.remaining() < 4 {
        return Err(ControlError::UnexpectedEof);
    }
    Ok(buf.get_u32_le())
}

fn read_i32(buf: &mut Bytes) -> Result<i32, ControlError> {
    if buf.remaining() < 4 {
        return Err(ControlError::UnexpectedEof);
    }
    Ok(buf.get_i32_le())
}

fn put_name(buf: &mut BytesMut, name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN - 1);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, NAME_LEN - len);
}

fn take_name(buf: &mut Bytes) -> String {
    let field = buf.split_to(NAME_LEN);
    let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn device_or_unset(device: Option<DeviceId>) -> i32 {
    device.map_or(NO_DEVICE, |id| id as i32)
}

fn unset_or_device(value: i32) -> Option<DeviceId> {
    u32::try_from(value).ok()
}
