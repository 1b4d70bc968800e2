//! Device capabilities
//!
//! [`Capability`] is the static flag set a driver declares at registration.
//! [`DeviceOps`] is the set of hardware calls the control plane makes on a
//! device; implementations live in the endpoint drivers.

use std::fmt;
use std::ops::BitOr;

use crate::error::DeviceError;
use crate::routing::Direction;

/// Capability flag set of an endpoint device
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capability(u32);

impl Capability {
    /// Plays audio out
    pub const RX: Capability = Capability(0x1);
    /// Captures audio in
    pub const TX: Capability = Capability(0x2);
    /// Usable for a voice call
    pub const VOICE: Capability = Capability(0x4);

    /// Wrap raw capability bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw capability bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every flag of `other` is present
    pub fn contains(self, other: Capability) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag of `other` is present
    pub fn intersects(self, other: Capability) -> bool {
        self.0 & other.0 != 0
    }

    /// Direction the device serves; TX wins on devices flagged both ways
    pub fn direction(self) -> Direction {
        if self.contains(Capability::TX) {
            Direction::Tx
        } else {
            Direction::Rx
        }
    }

    /// Capability flag matching a direction
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Rx => Capability::RX,
            Direction::Tx => Capability::TX,
        }
    }
}

impl BitOr for Capability {
    type Output = Capability;

    fn bitor(self, rhs: Capability) -> Capability {
        Capability(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::with_capacity(3);
        if self.contains(Capability::RX) {
            flags.push("RX");
        }
        if self.contains(Capability::TX) {
            flags.push("TX");
        }
        if self.contains(Capability::VOICE) {
            flags.push("VOICE");
        }
        write!(f, "Capability({})", flags.join("|"))
    }
}

/// Hardware operations on one endpoint device
///
/// Calls are made with the control-plane lock held and must not call back
/// into [`AudioDevCtl`](crate::AudioDevCtl).
pub trait DeviceOps: Send {
    /// Power up the device path
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Power down the device path
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Reprogram the sample rate, returning the rate the hardware settled on
    fn set_frequency(&mut self, rate: u32) -> Result<u32, DeviceError>;

    /// Toggle sidetone; devices without sidetone keep the default
    fn enable_sidetone(&mut self, _enable: bool) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }
}
