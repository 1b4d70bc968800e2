//! Voice-call routing, volume and mute

use super::lane::{ClientType, Direction, SessionMask};
use super::table::{SessionKind, VoiceState};
use crate::device::{Capability, DeviceId};
use crate::error::{DevCtlError, Result};
use crate::event::{EventKind, SessionFilter};
use crate::store::State;

impl State {
    /// Route the voice rx or tx path to `device_id`
    pub(crate) fn set_voice_route(
        &mut self,
        direction: Direction,
        device_id: DeviceId,
    ) -> Result<()> {
        let device = self.devices.find(device_id)?;
        let required = Capability::VOICE | Capability::for_direction(direction);
        if !device.capability().contains(required) {
            tracing::warn!(
                device_id = device_id,
                direction = ?direction,
                capability = ?device.capability(),
                "Device cannot carry voice"
            );
            return Err(DevCtlError::InvalidDevice { device_id });
        }

        if let Some(previous) = self.routing.voice.device(direction) {
            if let Ok(prev) = self.devices.find_mut(previous) {
                prev.sessions.clear_lane(ClientType::Voice);
            }
        }

        let voice_session = SessionMask::session(ClientType::Voice, 0).unwrap_or_default();
        self.devices.find_mut(device_id)?.sessions.insert(voice_session);
        match direction {
            Direction::Rx => self.routing.voice.rx_device = Some(device_id),
            Direction::Tx => self.routing.voice.tx_device = Some(device_id),
        }

        tracing::info!(device_id = device_id, direction = ?direction, "Voice route set");
        Ok(())
    }

    fn voice_device(&self, direction: Direction) -> Result<DeviceId> {
        if !self.routing.voice.is_routed() {
            return Err(DevCtlError::NoVoiceRoute);
        }
        self.routing
            .voice
            .device(direction)
            .ok_or(DevCtlError::NoVoiceRoute)
    }

    pub(crate) fn set_voice_mute(&mut self, direction: Direction, mute: bool) -> Result<()> {
        let device_id = self.voice_device(direction)?;
        match direction {
            Direction::Rx => self.routing.voice.rx_mute = mute,
            Direction::Tx => self.routing.voice.tx_mute = mute,
        }

        tracing::info!(direction = ?direction, mute = mute, "Voice mute set");
        self.broadcast(
            EventKind::DeviceVolumeMuteChange,
            Some(device_id),
            SessionFilter::Ignore,
        );
        Ok(())
    }

    pub(crate) fn set_voice_volume(&mut self, direction: Direction, level: i32) -> Result<()> {
        let device_id = self.voice_device(direction)?;
        match direction {
            Direction::Rx => self.routing.voice.rx_volume = level,
            Direction::Tx => self.routing.voice.tx_volume = level,
        }

        tracing::debug!(direction = ?direction, level = level, "Voice volume set");
        self.broadcast(
            EventKind::DeviceVolumeMuteChange,
            Some(device_id),
            SessionFilter::Ignore,
        );
        Ok(())
    }

    pub(crate) fn set_voice_device_volume(
        &mut self,
        direction: Direction,
        level: i32,
    ) -> Result<()> {
        let device_id = self.voice_device(direction)?;
        self.devices.find_mut(device_id)?.volume = level;
        Ok(())
    }

    pub(crate) fn voice_route_vendor_ids(&self) -> Result<(u32, u32)> {
        let rx = self.devices.find(self.voice_device(Direction::Rx)?)?;
        let tx = self.devices.find(self.voice_device(Direction::Tx)?)?;
        Ok((rx.info().vendor_id, tx.info().vendor_id))
    }

    pub(crate) fn is_voice_device(&self, device_id: DeviceId) -> bool {
        self.routing.voice.rx_device == Some(device_id)
            || self.routing.voice.tx_device == Some(device_id)
    }

    pub(crate) fn set_stream_volume(&mut self, session_id: u32, volume: i32) -> Result<()> {
        self.routing.check_session(ClientType::Decoder, session_id)?;
        let mask = SessionMask::session(ClientType::Decoder, session_id).ok_or_else(|| {
            DevCtlError::session_out_of_range(SessionKind::Decoder.client_type(), session_id)
        })?;
        self.routing.stream_volume = volume;

        self.broadcast(EventKind::StreamVolumeChange, None, SessionFilter::Mask(mask));
        Ok(())
    }

    pub(crate) fn set_voice_state(&mut self, state: VoiceState) {
        tracing::info!(state = ?state, "Voice state changed");
        self.routing.voice.state = state;
        self.broadcast(EventKind::VoiceStateChange, None, SessionFilter::Ignore);
    }
}
