//! Mock device for testing without hardware.

use std::sync::Arc;

use parking_lot::Mutex;

use super::capability::DeviceOps;
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct CallLog {
    open_calls: u32,
    close_calls: u32,
    frequencies: Vec<u32>,
    sidetone: Option<bool>,
}

/// A [`DeviceOps`] implementation that records every call.
///
/// Keep the [`MockDeviceHandle`] returned by [`MockDevice::handle`] to
/// inspect the calls after the device has been handed to the registry.
///
/// # Example
///
/// ```
/// use audio_devctl::{AudioDevCtl, Capability, DeviceInfo, MockDevice};
///
/// let ctl = AudioDevCtl::new();
/// let mock = MockDevice::new();
/// let calls = mock.handle();
///
/// let id = ctl
///     .register(DeviceInfo::new("speaker", Capability::RX), Box::new(mock))
///     .unwrap();
/// ctl.open(id).unwrap();
///
/// assert_eq!(calls.open_calls(), 1);
/// ```
pub struct MockDevice {
    log: Arc<Mutex<CallLog>>,
    open_failures: u32,
    fail_close: bool,
    sidetone: bool,
}

impl MockDevice {
    /// Creates a device whose calls all succeed
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(CallLog::default())),
            open_failures: 0,
            fail_close: false,
            sidetone: false,
        }
    }

    /// Fail the next `count` calls to `open()`
    pub fn failing_opens(mut self, count: u32) -> Self {
        self.open_failures = count;
        self
    }

    /// Fail every call to `close()`
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Implement sidetone
    pub fn with_sidetone(mut self) -> Self {
        self.sidetone = true;
        self
    }

    /// Handle for inspecting recorded calls
    pub fn handle(&self) -> MockDeviceHandle {
        MockDeviceHandle {
            log: Arc::clone(&self.log),
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceOps for MockDevice {
    fn open(&mut self) -> Result<(), DeviceError> {
        self.log.lock().open_calls += 1;
        if self.open_failures > 0 {
            self.open_failures -= 1;
            return Err(DeviceError::failed("mock open failure"));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.log.lock().close_calls += 1;
        if self.fail_close {
            return Err(DeviceError::failed("mock close failure"));
        }
        Ok(())
    }

    fn set_frequency(&mut self, rate: u32) -> Result<u32, DeviceError> {
        self.log.lock().frequencies.push(rate);
        Ok(rate)
    }

    fn enable_sidetone(&mut self, enable: bool) -> Result<(), DeviceError> {
        if !self.sidetone {
            return Err(DeviceError::Unsupported);
        }
        self.log.lock().sidetone = Some(enable);
        Ok(())
    }
}

/// Read access to the calls recorded by a [`MockDevice`]
#[derive(Clone)]
pub struct MockDeviceHandle {
    log: Arc<Mutex<CallLog>>,
}

impl MockDeviceHandle {
    /// Number of `open()` calls, failed attempts included
    pub fn open_calls(&self) -> u32 {
        self.log.lock().open_calls
    }

    /// Number of `close()` calls
    pub fn close_calls(&self) -> u32 {
        self.log.lock().close_calls
    }

    /// Rates passed to `set_frequency()`, in call order
    pub fn frequencies(&self) -> Vec<u32> {
        self.log.lock().frequencies.clone()
    }

    /// Last sidetone state set, if any
    pub fn sidetone(&self) -> Option<bool> {
        self.log.lock().sidetone
    }
}
