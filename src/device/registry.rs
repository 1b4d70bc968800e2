//! Device registry
//!
//! Fixed-capacity table of endpoint devices. Ids are table indices handed
//! out in registration order and never reused.

use super::capability::DeviceOps;
use super::entry::{Device, DeviceId, DeviceInfo};
use crate::error::{DevCtlError, DeviceError, Result};

/// Table of registered devices
pub struct DeviceRegistry {
    devices: Vec<Device>,
    capacity: usize,
    open_attempts: u32,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new(capacity: usize, open_attempts: u32) -> Self {
        Self {
            devices: Vec::with_capacity(capacity),
            capacity,
            open_attempts: open_attempts.max(1),
        }
    }

    /// Register a device, returning its id
    pub fn register(&mut self, info: DeviceInfo, ops: Box<dyn DeviceOps>) -> Result<DeviceId> {
        if self.devices.len() >= self.capacity {
            tracing::error!(
                name = %info.name,
                capacity = self.capacity,
                "Device registry full"
            );
            return Err(DevCtlError::CapacityExceeded(self.capacity));
        }

        let id = self.devices.len() as DeviceId;
        tracing::info!(
            device_id = id,
            name = %info.name,
            capability = ?info.capability,
            "Device registered"
        );
        self.devices.push(Device::new(id, info, ops));

        Ok(id)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn find(&self, id: DeviceId) -> Result<&Device> {
        self.devices
            .get(id as usize)
            .ok_or(DevCtlError::NotFound("device"))
    }

    pub fn find_mut(&mut self, id: DeviceId) -> Result<&mut Device> {
        self.devices
            .get_mut(id as usize)
            .ok_or(DevCtlError::NotFound("device"))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Open a device
    ///
    /// Already-open devices are left alone. The hardware call is attempted
    /// up to `open_attempts` times; the last failure is returned.
    pub fn open(&mut self, id: DeviceId) -> Result<()> {
        let attempts = self.open_attempts;
        let device = self.find_mut(id)?;

        if device.opened {
            tracing::debug!(device_id = id, "Device already open");
            return Ok(());
        }

        let mut last_err = None;
        for attempt in 1..=attempts {
            match device.ops.open() {
                Ok(()) => {
                    device.opened = true;
                    tracing::info!(
                        device_id = id,
                        name = %device.info.name,
                        attempt = attempt,
                        "Device opened"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        device_id = id,
                        attempt = attempt,
                        error = %e,
                        "Device open failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(DevCtlError::Device {
            device_id: id,
            source: last_err.unwrap_or_else(|| DeviceError::failed("open not attempted")),
        })
    }

    /// Close a device
    ///
    /// The device is marked closed even when the hardware call fails.
    pub fn close(&mut self, id: DeviceId) -> Result<()> {
        let device = self.find_mut(id)?;

        if !device.opened {
            tracing::debug!(device_id = id, "Device already closed");
            return Ok(());
        }

        if let Err(e) = device.ops.close() {
            tracing::warn!(device_id = id, error = %e, "Device close failed");
        }
        device.opened = false;
        tracing::info!(device_id = id, name = %device.info.name, "Device closed");

        Ok(())
    }

    /// Toggle sidetone on a device
    pub fn enable_sidetone(&mut self, id: DeviceId, enable: bool) -> Result<()> {
        let device = self.find_mut(id)?;

        match device.ops.enable_sidetone(enable) {
            Ok(()) => {
                tracing::debug!(device_id = id, enable = enable, "Sidetone set");
                Ok(())
            }
            Err(DeviceError::Unsupported) => {
                tracing::debug!(device_id = id, "No sidetone support");
                Err(DevCtlError::Unsupported { device_id: id })
            }
            Err(source) => Err(DevCtlError::Device {
                device_id: id,
                source,
            }),
        }
    }
}
