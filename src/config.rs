//! Control-plane configuration

use crate::routing::LANE_WIDTH;

/// Hard ceiling on registered devices (session routing bitmasks are 32 bits wide)
pub const MAX_DEVICES: usize = 32;

/// Default number of decoder (playback) sessions
pub const DEFAULT_DECODER_SESSIONS: u32 = 6;

/// Default number of encoder (capture) sessions
pub const DEFAULT_ENCODER_SESSIONS: u32 = 2;

/// Default number of `open()` attempts before giving up
pub const DEFAULT_OPEN_ATTEMPTS: u32 = 3;

/// Rate restored on the voice rx path when its request is withdrawn
pub const DEFAULT_VOICE_RX_RATE: u32 = 48000;

/// Control-plane configuration options
#[derive(Debug, Clone)]
pub struct DevCtlConfig {
    /// Capacity of the device table
    pub max_devices: usize,

    /// Number of decoder sessions (at most one lane wide)
    pub max_decoder_sessions: u32,

    /// Number of encoder sessions (at most one lane wide)
    pub max_encoder_sessions: u32,

    /// Attempts made by `open()` before the last failure is surfaced
    pub open_attempts: u32,

    /// Voice rx rate restored on withdraw
    pub voice_rx_default_rate: u32,
}

impl Default for DevCtlConfig {
    fn default() -> Self {
        Self {
            max_devices: MAX_DEVICES,
            max_decoder_sessions: DEFAULT_DECODER_SESSIONS,
            max_encoder_sessions: DEFAULT_ENCODER_SESSIONS,
            open_attempts: DEFAULT_OPEN_ATTEMPTS,
            voice_rx_default_rate: DEFAULT_VOICE_RX_RATE,
        }
    }
}

impl DevCtlConfig {
    /// Set the device table capacity
    pub fn max_devices(mut self, max: usize) -> Self {
        self.max_devices = max.clamp(1, MAX_DEVICES);
        self
    }

    /// Set the number of decoder sessions
    pub fn max_decoder_sessions(mut self, max: u32) -> Self {
        self.max_decoder_sessions = max.clamp(1, LANE_WIDTH);
        self
    }

    /// Set the number of encoder sessions
    pub fn max_encoder_sessions(mut self, max: u32) -> Self {
        self.max_encoder_sessions = max.clamp(1, LANE_WIDTH);
        self
    }

    /// Set the number of `open()` attempts
    pub fn open_attempts(mut self, attempts: u32) -> Self {
        self.open_attempts = attempts.max(1);
        self
    }

    /// Set the voice rx rate restored on withdraw
    pub fn voice_rx_default_rate(mut self, rate: u32) -> Self {
        self.voice_rx_default_rate = rate;
        self
    }
}
