//! Maps control requests onto control-plane operations

use super::codec::{ControlRequest, ControlResponse, RoutingSnapshot, StreamType};
use crate::device::{Capability, DeviceId};
use crate::error::{DevCtlError, Result};
use crate::event::{EventKind, SessionFilter};
use crate::routing::{ClientType, Direction, SessionKind};
use crate::store::State;

impl State {
    pub(crate) fn handle_control(&mut self, request: &ControlRequest) -> ControlResponse {
        tracing::debug!(request = ?request, "Control request");
        match self.execute(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request = ?request, error = %e, "Control request failed");
                ControlResponse::Error(e)
            }
        }
    }

    fn execute(&mut self, request: &ControlRequest) -> Result<ControlResponse> {
        match *request {
            ControlRequest::GetDeviceCount => {
                Ok(ControlResponse::DeviceCount(self.devices.len() as u32))
            }
            ControlRequest::GetDevices { max_entries } => {
                let max = max_entries as usize;
                if max > self.devices.len() {
                    return Err(DevCtlError::InvalidArgument(
                        "more devices requested than registered",
                    ));
                }
                Ok(ControlResponse::Devices(
                    self.devices.iter().take(max).map(|d| d.descriptor()).collect(),
                ))
            }
            ControlRequest::EnableDevice(id) => {
                self.devices.open(id)?;
                Ok(ControlResponse::Done)
            }
            ControlRequest::DisableDevice(id) => {
                self.devices.close(id)?;
                Ok(ControlResponse::Done)
            }
            ControlRequest::RouteStream {
                stream_type,
                device_id,
                session_id,
                enable,
            } => {
                self.route_stream(stream_type, device_id, session_id, enable)?;
                Ok(ControlResponse::Done)
            }
            ControlRequest::GetRoutingSnapshot => {
                Ok(ControlResponse::Snapshot(self.routing_snapshot()))
            }
        }
    }

    fn route_stream(
        &mut self,
        stream_type: StreamType,
        device_id: DeviceId,
        session_id: u32,
        enable: bool,
    ) -> Result<()> {
        let kind = match stream_type {
            StreamType::VoiceRx => return self.set_voice_route(Direction::Rx, device_id),
            StreamType::VoiceTx => return self.set_voice_route(Direction::Tx, device_id),
            StreamType::Playback => SessionKind::Decoder,
            StreamType::Record => SessionKind::Encoder,
        };

        self.devices.find(device_id)?;
        let filter = SessionFilter::Mask(self.session_mask(kind.client_type(), session_id)?);

        if !enable {
            // The session must still hold its bit to match its own release
            if self.devices.find(device_id)?.is_open() {
                self.broadcast(EventKind::DeviceRelease, Some(device_id), filter);
            }
            return self.set_session_route(session_id, device_id, false, kind);
        }

        self.set_session_route(session_id, device_id, true, kind)?;
        if kind == SessionKind::Encoder {
            self.restore_encoder_rate(session_id, device_id)?;
        }
        if self.devices.find(device_id)?.is_open() {
            self.broadcast(EventKind::DeviceReady, Some(device_id), filter);
        }
        Ok(())
    }

    /// Re-apply the rate an encoder session asked for before it was rerouted
    fn restore_encoder_rate(&mut self, session_id: u32, device_id: DeviceId) -> Result<()> {
        let requested = self
            .routing
            .frequency(SessionKind::Encoder, session_id)?
            .rate;
        if requested == 0 {
            return Ok(());
        }

        let granted =
            self.request_frequency(session_id, ClientType::Encoder, Capability::TX, requested);
        if granted != Ok(Some(requested)) {
            tracing::info!(
                session_id = session_id,
                device_id = device_id,
                requested = requested,
                granted = ?granted,
                "Encoder rate not restored"
            );
            self.withdraw_frequency(session_id, Capability::TX, ClientType::Encoder)?;
            self.broadcast(EventKind::FrequencyChange, Some(device_id), SessionFilter::Ignore);
        }
        Ok(())
    }

    fn routing_snapshot(&self) -> RoutingSnapshot {
        let opened = self
            .devices
            .iter()
            .filter(|d| d.is_open())
            .fold(0u32, |mask, d| mask | 1u32.checked_shl(d.id()).unwrap_or(0));
        RoutingSnapshot {
            opened,
            voice_rx: self.routing.voice.rx_device,
            voice_tx: self.routing.voice.tx_device,
        }
    }
}
