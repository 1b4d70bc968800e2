//! Per-device sample-rate arbitration
//!
//! Sessions ask for a rate on every device they are routed to. A device
//! only ever moves up: the highest rate requested by its sessions wins,
//! and the session that caused the bump is marked so it is not told about
//! its own change. Devices carrying more than one client type are limited
//! to [`SAFE_SHARED_RATES`].

use super::lane::{ClientType, Direction, SessionMask};
use super::table::{SessionFrequency, SessionKind};
use crate::device::Capability;
use crate::error::{DevCtlError, Result};
use crate::event::{EventKind, SessionFilter};
use crate::store::State;

/// Every rate a session may request
pub const SUPPORTED_RATES: [u32; 9] = [
    8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000,
];

/// Rates a device shared across client types may move to
pub const SAFE_SHARED_RATES: [u32; 3] = [8000, 16000, 48000];

pub fn is_supported_rate(rate: u32) -> bool {
    SUPPORTED_RATES.contains(&rate)
}

impl State {
    pub(crate) fn session_mask(
        &self,
        client_type: ClientType,
        session_id: u32,
    ) -> Result<SessionMask> {
        self.routing.check_session(client_type, session_id)?;
        SessionMask::session(client_type, session_id)
            .ok_or_else(|| DevCtlError::session_out_of_range(client_type, session_id))
    }

    pub(crate) fn request_frequency(
        &mut self,
        session_id: u32,
        client_type: ClientType,
        capability: Capability,
        rate: u32,
    ) -> Result<Option<u32>> {
        if !is_supported_rate(rate) {
            return Err(DevCtlError::InvalidRate(rate));
        }
        let session = self.session_mask(client_type, session_id)?;
        let own_lane = SessionMask::lane_mask(client_type);

        let mut desired = rate;
        let mut effective = None;
        let device_count = self.devices.len() as u32;

        for device_id in 0..device_count {
            let device = self.devices.find(device_id)?;
            if !device.sessions.intersects(session) || !device.capability().intersects(capability) {
                continue;
            }

            let shared = !device.sessions.without(own_lane).is_empty();
            if shared && !SAFE_SHARED_RATES.contains(&desired) {
                tracing::warn!(
                    device_id = device_id,
                    sessions = %device.sessions,
                    rate = desired,
                    "Rate conflict on shared device"
                );
                if let Some(kind) = SessionKind::from_client_type(client_type) {
                    self.routing.frequency_mut(kind, session_id)?.rate = 0;
                }
                return Err(DevCtlError::RateConflict {
                    device_id,
                    rate: desired,
                });
            }

            let current = device.sample_rate;
            if desired == current {
                effective = Some(current);
                continue;
            }

            let candidate = desired.max(current);
            if candidate == current {
                desired = current;
                effective = Some(current);
                continue;
            }

            match SessionKind::from_client_type(client_type) {
                Some(kind) => {
                    *self.routing.frequency_mut(kind, session_id)? = SessionFrequency {
                        rate: candidate,
                        pending_notify: true,
                    };
                }
                None if capability.contains(Capability::TX) => {
                    self.routing.voice.tx_rate = candidate;
                }
                None => {}
            }

            let device = self.devices.find_mut(device_id)?;
            device.sample_rate = candidate;
            desired = candidate;
            effective = Some(candidate);
            tracing::info!(
                device_id = device_id,
                from = current,
                to = candidate,
                client_type = ?client_type,
                session_id = session_id,
                "Device rate raised"
            );

            if device.opened {
                self.broadcast(
                    EventKind::FrequencyChange,
                    Some(device_id),
                    SessionFilter::Ignore,
                );
                let device = self.devices.find_mut(device_id)?;
                match device.ops.set_frequency(candidate) {
                    Ok(negotiated) => tracing::debug!(
                        device_id = device_id,
                        negotiated = negotiated,
                        "Hardware rate set"
                    ),
                    Err(e) => tracing::error!(
                        device_id = device_id,
                        rate = candidate,
                        error = %e,
                        "Hardware rate change failed"
                    ),
                }
                self.broadcast(EventKind::DeviceReady, Some(device_id), SessionFilter::Ignore);
            }
        }

        Ok(effective)
    }

    pub(crate) fn withdraw_frequency(
        &mut self,
        session_id: u32,
        capability: Capability,
        client_type: ClientType,
    ) -> Result<()> {
        let session = self.session_mask(client_type, session_id)?;

        for device in self.devices.iter_mut() {
            if device.sessions.intersects(session)
                && device.capability().intersects(capability)
                && device.sessions.without(session).is_empty()
            {
                tracing::debug!(device_id = device.id, "Device rate released");
                device.sample_rate = 0;
            }
        }

        match SessionKind::from_client_type(client_type) {
            Some(kind) => self.routing.frequency_mut(kind, session_id)?.rate = 0,
            None if capability.direction() == Direction::Tx => self.routing.voice.tx_rate = 0,
            None => self.routing.voice.rx_rate = self.config.voice_rx_default_rate,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceInfo, MockDevice, MockDeviceHandle};
    use crate::routing::SessionKind;
    use crate::AudioDevCtl;

    fn ctl_with_speaker() -> (AudioDevCtl, MockDeviceHandle) {
        let ctl = AudioDevCtl::new();
        let mock = MockDevice::new();
        let handle = mock.handle();
        ctl.register(DeviceInfo::new("speaker", Capability::RX), Box::new(mock))
            .unwrap();
        ctl.open(0).unwrap();
        (ctl, handle)
    }

    #[test]
    fn test_supported_rates() {
        assert!(is_supported_rate(11025));
        assert!(is_supported_rate(48000));
        assert!(!is_supported_rate(96000));
        assert!(!is_supported_rate(0));
    }

    #[test]
    fn test_invalid_rate_rejected_first() {
        let (ctl, _) = ctl_with_speaker();
        assert_eq!(
            ctl.request_frequency(99, ClientType::Decoder, Capability::RX, 7000),
            Err(DevCtlError::InvalidRate(7000))
        );
        assert!(matches!(
            ctl.request_frequency(99, ClientType::Decoder, Capability::RX, 8000),
            Err(DevCtlError::OutOfRange { .. })
        ));
        assert!(ctl
            .request_frequency(1, ClientType::Voice, Capability::RX, 8000)
            .is_err());
    }

    #[test]
    fn test_unrouted_session_has_no_rate() {
        let (ctl, handle) = ctl_with_speaker();
        assert_eq!(
            ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 44100),
            Ok(None)
        );
        assert!(handle.frequencies().is_empty());
    }

    #[test]
    fn test_idempotent_request() {
        let (ctl, handle) = ctl_with_speaker();
        ctl.set_session_route(0, 0, true, SessionKind::Decoder).unwrap();

        let first = ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 22050);
        let second = ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 22050);

        assert_eq!(first, Ok(Some(22050)));
        assert_eq!(second, first);
        assert_eq!(handle.frequencies(), vec![22050]);
    }

    #[test]
    fn test_rate_only_moves_up() {
        let (ctl, handle) = ctl_with_speaker();
        ctl.set_session_route(0, 0, true, SessionKind::Decoder).unwrap();
        ctl.set_session_route(1, 0, true, SessionKind::Decoder).unwrap();

        ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 44100)
            .unwrap();
        let rate = ctl
            .request_frequency(1, ClientType::Decoder, Capability::RX, 8000)
            .unwrap();

        assert_eq!(rate, Some(44100));
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 44100);
        assert_eq!(handle.frequencies(), vec![44100]);
    }

    #[test]
    fn test_closed_device_not_reprogrammed() {
        let (ctl, handle) = ctl_with_speaker();
        ctl.close(0).unwrap();
        ctl.set_session_route(0, 0, true, SessionKind::Decoder).unwrap();

        ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 32000)
            .unwrap();

        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 32000);
        assert!(handle.frequencies().is_empty());
    }

    #[test]
    fn test_conflict_clears_record() {
        let (ctl, _) = ctl_with_speaker();
        ctl.set_session_route(0, 0, true, SessionKind::Decoder).unwrap();
        ctl.set_session_route(0, 0, true, SessionKind::Encoder).unwrap();
        ctl.request_frequency(0, ClientType::Encoder, Capability::RX, 16000)
            .unwrap();
        assert_eq!(ctl.encoder_frequency(0), Ok(16000));

        let err = ctl.request_frequency(0, ClientType::Encoder, Capability::RX, 44100);

        assert_eq!(
            err,
            Err(DevCtlError::RateConflict {
                device_id: 0,
                rate: 44100
            })
        );
        assert_eq!(ctl.encoder_frequency(0), Ok(0));
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 16000);
    }

    #[test]
    fn test_voice_conflict_keeps_voice_rate() {
        let ctl = AudioDevCtl::new();
        ctl.register(
            DeviceInfo::new("handset_tx", Capability::TX | Capability::VOICE),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.set_voice_route(Direction::Tx, 0).unwrap();
        ctl.set_session_route(0, 0, true, SessionKind::Encoder).unwrap();
        ctl.request_frequency(0, ClientType::Voice, Capability::TX, 16000)
            .unwrap();

        assert_eq!(
            ctl.request_frequency(0, ClientType::Voice, Capability::TX, 44100),
            Err(DevCtlError::RateConflict {
                device_id: 0,
                rate: 44100
            })
        );
        assert_eq!(ctl.voice_frequencies().0, 16000);
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 16000);
    }

    #[test]
    fn test_withdraw_resets_unshared_device() {
        let (ctl, _) = ctl_with_speaker();
        ctl.set_session_route(0, 0, true, SessionKind::Decoder).unwrap();
        ctl.set_session_route(1, 0, true, SessionKind::Decoder).unwrap();
        ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 48000)
            .unwrap();

        ctl.withdraw_frequency(0, Capability::RX, ClientType::Decoder)
            .unwrap();
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 48000);

        ctl.set_session_route(1, 0, false, SessionKind::Decoder).unwrap();
        ctl.withdraw_frequency(0, Capability::RX, ClientType::Decoder)
            .unwrap();
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 0);
    }

    #[test]
    fn test_withdraw_voice_rates() {
        let ctl = AudioDevCtl::new();
        ctl.register(
            DeviceInfo::new("handset_tx", Capability::TX | Capability::VOICE),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.set_voice_route(Direction::Tx, 0).unwrap();
        ctl.request_frequency(0, ClientType::Voice, Capability::TX, 16000)
            .unwrap();
        assert_eq!(ctl.voice_frequencies(), (16000, 0));

        ctl.withdraw_frequency(0, Capability::TX, ClientType::Voice)
            .unwrap();
        ctl.withdraw_frequency(0, Capability::RX, ClientType::Voice)
            .unwrap();

        assert_eq!(ctl.voice_frequencies(), (0, 48000));
        assert_eq!(ctl.device_status(0).unwrap().sample_rate, 0);
    }
}
