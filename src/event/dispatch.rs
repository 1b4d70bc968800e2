//! Event fan-out
//!
//! Walks the listeners in registration order and builds one payload per
//! interested listener. The payload shape, and whether the listener hears
//! the event at all, depends on its client type:
//!
//! - Voice: device descriptions, volume/mute, call start/end. A
//!   `ReleasePending` arms a latch that swallows the next `DeviceRelease`.
//! - Decoder: mixer port, stream volume, rate changes it did not cause.
//! - Encoder: mixer port, rate changes it did not cause.
//! - Calibration: a direction-specific view of every busy device.
//!
//! Payloads are queued on the state and delivered after the lock drops.

use crate::device::{Capability, Device, DeviceId};
use crate::event::{
    CalibrationInfo, EventKind, EventPayload, FrequencyInfo, ListenerEntry, SessionFilter,
    VoiceDeviceInfo, VoiceVolumeMute, VolumeOrMute,
};
use crate::routing::{ClientType, Direction, SessionKind, SessionMask};
use crate::store::State;

/// Device fields the payload builders read
#[derive(Debug, Clone, Copy)]
struct Target {
    id: DeviceId,
    capability: Capability,
    sessions: SessionMask,
    sample_rate: u32,
    effective_rate: u32,
    vendor_id: u32,
    routing_id: u32,
    volume_index: i32,
}

impl Target {
    fn of(device: &Device) -> Self {
        Self {
            id: device.id(),
            capability: device.capability(),
            sessions: device.sessions(),
            sample_rate: device.sample_rate(),
            effective_rate: device.effective_sample_rate(),
            vendor_id: device.info().vendor_id,
            routing_id: device.info().routing_id,
            volume_index: device.info().volume_index,
        }
    }

    fn frequency(&self) -> EventPayload {
        EventPayload::Frequency(FrequencyInfo {
            sample_rate: self.sample_rate,
            capability: self.capability,
            vendor_id: self.vendor_id,
        })
    }

    fn voice_device(&self) -> EventPayload {
        EventPayload::VoiceDevice(VoiceDeviceInfo {
            device_id: self.id,
            direction: self.capability.direction(),
            vendor_id: self.vendor_id,
            sample_rate: self.effective_rate,
            volume_index: self
                .capability
                .contains(Capability::RX)
                .then_some(self.volume_index),
        })
    }
}

impl State {
    pub(crate) fn broadcast(
        &mut self,
        kind: EventKind,
        device_id: Option<DeviceId>,
        filter: SessionFilter,
    ) {
        let device_id = if kind.is_device_independent() {
            None
        } else {
            match device_id {
                Some(id) if self.devices.find(id).is_ok() => Some(id),
                _ => {
                    tracing::warn!(
                        event = ?kind,
                        device_id = ?device_id,
                        "Broadcast for unknown device dropped"
                    );
                    return;
                }
            }
        };

        let entries: Vec<ListenerEntry> = self
            .listeners
            .iter()
            .filter(|entry| entry.events.contains(kind))
            .cloned()
            .collect();
        if entries.is_empty() {
            tracing::trace!(event = ?kind, "No listeners");
            return;
        }

        tracing::debug!(
            event = ?kind,
            device_id = ?device_id,
            filter = ?filter,
            candidates = entries.len(),
            "Broadcasting"
        );

        for entry in &entries {
            // Re-read per listener; a voice release edits the device lanes
            let target = device_id
                .and_then(|id| self.devices.find(id).ok())
                .map(Target::of);

            let payload = match (entry.client_type, kind) {
                (ClientType::Calibration, _) => self.calibration_payload(kind, target, filter),
                (ClientType::Voice, EventKind::StartVoice | EventKind::EndVoice) => {
                    Some(EventPayload::Empty)
                }
                (_, EventKind::StartVoice | EventKind::EndVoice) => None,
                _ if !passes_filter(entry, kind, target, filter) => None,
                (ClientType::Voice, _) => self.voice_payload(kind, target),
                (_, EventKind::DeviceChangeVoice) => None,
                (ClientType::Decoder, _) => {
                    self.decoder_payload(entry.client_id, kind, target, filter)
                }
                (ClientType::Encoder, _) => self.encoder_payload(entry.client_id, kind, target),
            };

            if let Some(payload) = payload {
                self.deliver(entry, kind, payload);
            }
        }
    }

    fn decoder_payload(
        &mut self,
        client_id: u32,
        kind: EventKind,
        target: Option<Target>,
        filter: SessionFilter,
    ) -> Option<EventPayload> {
        self.routing.check_session(ClientType::Decoder, client_id).ok()?;

        match kind {
            EventKind::StreamVolumeChange => {
                let own = SessionMask::session(ClientType::Decoder, client_id)?;
                (filter == SessionFilter::Mask(own))
                    .then_some(EventPayload::StreamVolume(self.routing.stream_volume))
            }
            EventKind::VoiceStateChange => Some(EventPayload::VoiceState(self.routing.voice.state)),
            _ => {
                let target = target?;
                let record = self
                    .routing
                    .frequency_mut(SessionKind::Decoder, client_id)
                    .ok()?;

                let payload = if kind == EventKind::FrequencyChange {
                    if record.pending_notify {
                        record.pending_notify = false;
                        None
                    } else if record.rate == target.sample_rate {
                        None
                    } else {
                        Some(target.frequency())
                    }
                } else {
                    Some(EventPayload::RoutingId(target.routing_id))
                };

                record.rate = target.sample_rate;
                payload
            }
        }
    }

    fn encoder_payload(
        &mut self,
        client_id: u32,
        kind: EventKind,
        target: Option<Target>,
    ) -> Option<EventPayload> {
        self.routing.check_session(ClientType::Encoder, client_id).ok()?;

        match kind {
            EventKind::VoiceStateChange => Some(EventPayload::VoiceState(self.routing.voice.state)),
            EventKind::StreamVolumeChange => Some(EventPayload::Empty),
            EventKind::FrequencyChange => {
                let target = target?;
                let record = self
                    .routing
                    .frequency_mut(SessionKind::Encoder, client_id)
                    .ok()?;
                if record.pending_notify {
                    record.pending_notify = false;
                    None
                } else {
                    Some(target.frequency())
                }
            }
            _ => target.map(|t| EventPayload::RoutingId(t.routing_id)),
        }
    }

    fn voice_payload(&mut self, kind: EventKind, target: Option<Target>) -> Option<EventPayload> {
        match kind {
            EventKind::VoiceStateChange => {
                return Some(EventPayload::VoiceState(self.routing.voice.state))
            }
            EventKind::StreamVolumeChange => return Some(EventPayload::Empty),
            _ => {}
        }

        let target = target?;
        match kind {
            EventKind::DeviceRelease => {
                if self.release_pending {
                    self.release_pending = false;
                    tracing::debug!(device_id = target.id, "Release already announced");
                    return None;
                }
                if let Ok(device) = self.devices.find_mut(target.id) {
                    device.sessions.clear_lane(ClientType::Voice);
                }
                Some(target.voice_device())
            }
            EventKind::ReleasePending => {
                self.release_pending = true;
                Some(target.voice_device())
            }
            EventKind::DeviceVolumeMuteChange => {
                let voice = &self.routing.voice;
                let direction = target.capability.direction();
                let value = match direction {
                    Direction::Tx => VolumeOrMute::Mute(voice.tx_mute),
                    Direction::Rx if voice.rx_volume < 0 => VolumeOrMute::Mute(voice.rx_mute),
                    Direction::Rx => VolumeOrMute::Volume(voice.rx_volume),
                };
                Some(EventPayload::VoiceVolumeMute(VoiceVolumeMute {
                    direction,
                    vendor_id: target.vendor_id,
                    value,
                }))
            }
            EventKind::FrequencyChange => {
                if self.routing.voice.tx_rate == target.sample_rate {
                    return None;
                }
                self.routing.voice.tx_rate = target.sample_rate;
                Some(target.frequency())
            }
            _ => Some(target.voice_device()),
        }
    }

    fn calibration_payload(
        &self,
        kind: EventKind,
        target: Option<Target>,
        filter: SessionFilter,
    ) -> Option<EventPayload> {
        if kind == EventKind::VoiceStateChange {
            return Some(EventPayload::VoiceState(self.routing.voice.state));
        }

        let target = target?;
        if target.sessions.is_empty() {
            return None;
        }

        let direction = target.capability.direction();
        let sessions = match filter {
            SessionFilter::Ignore => target.sessions,
            SessionFilter::Mask(mask) => mask,
        };
        let lane = match direction {
            Direction::Tx => ClientType::Encoder,
            Direction::Rx => ClientType::Decoder,
        };

        Some(EventPayload::Calibration(CalibrationInfo {
            routing_id: target.routing_id,
            vendor_id: target.vendor_id,
            direction,
            sample_rate: target.effective_rate,
            sessions: sessions.lane(lane),
        }))
    }
}

/// Whether a voice, decoder or encoder listener is addressed by the filter
///
/// `Ignore` addresses everyone; a mask addresses the listener whose own bits
/// on the device equal it exactly.
fn passes_filter(
    entry: &ListenerEntry,
    kind: EventKind,
    target: Option<Target>,
    filter: SessionFilter,
) -> bool {
    if matches!(
        kind,
        EventKind::StreamVolumeChange | EventKind::VoiceStateChange
    ) {
        return true;
    }

    let mask = match filter {
        SessionFilter::Ignore => return true,
        SessionFilter::Mask(mask) => mask,
    };
    match (
        target,
        SessionMask::session(entry.client_type, entry.client_id),
    ) {
        (Some(target), Some(own)) => target.sessions.intersection(own) == mask,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::device::{DeviceInfo, MockDevice};
    use crate::event::{EventMask, EventPayload};
    use crate::routing::VoiceState;
    use crate::AudioDevCtl;

    use super::*;

    type Log = Arc<Mutex<Vec<(EventKind, EventPayload)>>>;

    fn listen(
        ctl: &AudioDevCtl,
        events: EventMask,
        client_type: ClientType,
        client_id: u32,
    ) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        ctl.subscribe(
            events,
            client_type,
            client_id,
            Arc::new(move |kind: EventKind, payload: &EventPayload| {
                sink.lock().push((kind, payload.clone()));
            }),
        )
        .unwrap();
        log
    }

    fn kinds(log: &Log) -> Vec<EventKind> {
        log.lock().iter().map(|(kind, _)| *kind).collect()
    }

    /// rx voice device 0, tx voice device 1, plain speaker 2
    fn ctl() -> AudioDevCtl {
        let ctl = AudioDevCtl::new();
        ctl.register(
            DeviceInfo::new("handset_rx", Capability::RX | Capability::VOICE)
                .vendor_id(7)
                .routing_id(1)
                .volume_index(4),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.register(
            DeviceInfo::new("handset_tx", Capability::TX | Capability::VOICE)
                .vendor_id(8)
                .routing_id(2)
                .default_sample_rate(8000),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.register(
            DeviceInfo::new("speaker", Capability::RX)
                .vendor_id(9)
                .routing_id(3),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl
    }

    #[test]
    fn test_interest_mask() {
        let ctl = ctl();
        ctl.set_session_route(0, 2, true, SessionKind::Decoder).unwrap();
        let log = listen(&ctl, EventKind::DeviceRelease.into(), ClientType::Decoder, 0);

        ctl.post_event(EventKind::DeviceReady, 2);
        assert!(log.lock().is_empty());

        ctl.post_event(EventKind::DeviceRelease, 2);
        assert_eq!(
            *log.lock(),
            vec![(EventKind::DeviceRelease, EventPayload::RoutingId(3))]
        );
    }

    #[test]
    fn test_unknown_device_dropped() {
        let ctl = ctl();
        let log = listen(&ctl, EventMask::all(), ClientType::Calibration, 0);

        ctl.post_event(EventKind::DeviceReady, 17);
        ctl.broadcast(EventKind::FrequencyChange, None, SessionFilter::Ignore);

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_ignore_filter_reaches_everyone() {
        let ctl = ctl();
        ctl.set_session_route(1, 2, true, SessionKind::Decoder).unwrap();
        let routed = listen(&ctl, EventMask::all(), ClientType::Decoder, 1);
        let unrouted = listen(&ctl, EventKind::DeviceReady.into(), ClientType::Decoder, 0);
        let encoder = listen(&ctl, EventKind::DeviceReady.into(), ClientType::Encoder, 0);

        ctl.broadcast(EventKind::DeviceReady, Some(2), SessionFilter::Ignore);

        assert_eq!(kinds(&routed), vec![EventKind::DeviceReady]);
        assert_eq!(
            *unrouted.lock(),
            vec![(EventKind::DeviceReady, EventPayload::RoutingId(3))]
        );
        assert_eq!(kinds(&encoder), vec![EventKind::DeviceReady]);

        // A mask still narrows delivery to the session that holds it
        let filter = SessionFilter::Mask(SessionMask::session(ClientType::Decoder, 1).unwrap());
        ctl.broadcast(EventKind::DeviceReady, Some(2), filter);
        assert_eq!(routed.lock().len(), 2);
        assert_eq!(unrouted.lock().len(), 1);
    }

    #[test]
    fn test_mask_filter_is_exact() {
        let ctl = ctl();
        ctl.set_session_route(0, 2, true, SessionKind::Encoder).unwrap();
        ctl.set_session_route(1, 2, true, SessionKind::Encoder).unwrap();
        let first = listen(&ctl, EventMask::all(), ClientType::Encoder, 0);
        let second = listen(&ctl, EventMask::all(), ClientType::Encoder, 1);

        let filter = SessionFilter::Mask(SessionMask::session(ClientType::Encoder, 1).unwrap());
        ctl.broadcast(EventKind::DeviceReady, Some(2), filter);

        assert!(first.lock().is_empty());
        assert_eq!(kinds(&second), vec![EventKind::DeviceReady]);
    }

    #[test]
    fn test_rate_change_skips_requester() {
        let ctl = ctl();
        ctl.open(2).unwrap();
        ctl.set_session_route(0, 2, true, SessionKind::Decoder).unwrap();
        ctl.set_session_route(1, 2, true, SessionKind::Decoder).unwrap();
        let events = EventKind::FrequencyChange | EventKind::DeviceReady;
        let requester = listen(&ctl, events, ClientType::Decoder, 0);
        let other = listen(&ctl, events, ClientType::Decoder, 1);

        ctl.request_frequency(0, ClientType::Decoder, Capability::RX, 44100)
            .unwrap();

        assert_eq!(kinds(&requester), vec![EventKind::DeviceReady]);
        assert_eq!(
            *other.lock(),
            vec![
                (
                    EventKind::FrequencyChange,
                    EventPayload::Frequency(FrequencyInfo {
                        sample_rate: 44100,
                        capability: Capability::RX,
                        vendor_id: 9,
                    })
                ),
                (EventKind::DeviceReady, EventPayload::RoutingId(3)),
            ]
        );

        // Both sessions now know the rate
        ctl.post_event(EventKind::FrequencyChange, 2);
        assert_eq!(requester.lock().len(), 1);
        assert_eq!(other.lock().len(), 2);
    }

    #[test]
    fn test_voice_rate_change_needs_new_rate() {
        let ctl = ctl();
        ctl.open(1).unwrap();
        ctl.set_voice_route(Direction::Tx, 1).unwrap();
        let log = listen(&ctl, EventKind::FrequencyChange.into(), ClientType::Voice, 0);

        // The call raised the rate itself
        ctl.request_frequency(0, ClientType::Voice, Capability::TX, 16000)
            .unwrap();
        assert!(log.lock().is_empty());

        ctl.set_session_route(0, 1, true, SessionKind::Encoder).unwrap();
        ctl.request_frequency(0, ClientType::Encoder, Capability::TX, 48000)
            .unwrap();
        ctl.post_event(EventKind::FrequencyChange, 1);

        assert_eq!(
            *log.lock(),
            vec![(
                EventKind::FrequencyChange,
                EventPayload::Frequency(FrequencyInfo {
                    sample_rate: 48000,
                    capability: Capability::TX | Capability::VOICE,
                    vendor_id: 8,
                })
            )]
        );
        assert_eq!(ctl.voice_frequencies().0, 48000);
    }

    #[test]
    fn test_encoder_rate_change_skips_only_pending() {
        let ctl = ctl();
        ctl.open(1).unwrap();
        ctl.set_session_route(0, 1, true, SessionKind::Encoder).unwrap();
        ctl.set_session_route(1, 1, true, SessionKind::Encoder).unwrap();
        let requester = listen(&ctl, EventKind::FrequencyChange.into(), ClientType::Encoder, 0);
        let other = listen(&ctl, EventKind::FrequencyChange.into(), ClientType::Encoder, 1);

        ctl.request_frequency(0, ClientType::Encoder, Capability::TX, 16000)
            .unwrap();
        assert!(requester.lock().is_empty());
        assert_eq!(kinds(&other), vec![EventKind::FrequencyChange]);

        // Encoders have no same-rate suppression once the flag is spent
        ctl.post_event(EventKind::FrequencyChange, 1);
        assert_eq!(kinds(&requester), vec![EventKind::FrequencyChange]);
        assert_eq!(other.lock().len(), 2);
    }

    #[test]
    fn test_duplicate_subscription_delivers_twice() {
        let ctl = ctl();
        ctl.set_session_route(0, 2, true, SessionKind::Decoder).unwrap();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let sink = Arc::clone(&log);
            ctl.subscribe(
                EventKind::DeviceReady.into(),
                ClientType::Decoder,
                0,
                Arc::new(move |kind: EventKind, payload: &EventPayload| {
                    sink.lock().push((kind, payload.clone()));
                }),
            )
            .unwrap();
        }

        ctl.post_event(EventKind::DeviceReady, 2);
        assert_eq!(log.lock().len(), 2);

        ctl.unsubscribe(ClientType::Decoder, 0).unwrap();
        ctl.set_session_route(0, 2, true, SessionKind::Decoder).unwrap();
        ctl.post_event(EventKind::DeviceReady, 2);
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_stream_volume_targets_one_decoder() {
        let ctl = ctl();
        let zero = listen(&ctl, EventKind::StreamVolumeChange.into(), ClientType::Decoder, 0);
        let three = listen(&ctl, EventKind::StreamVolumeChange.into(), ClientType::Decoder, 3);

        ctl.set_stream_volume(3, -250).unwrap();

        assert!(zero.lock().is_empty());
        assert_eq!(
            *three.lock(),
            vec![(EventKind::StreamVolumeChange, EventPayload::StreamVolume(-250))]
        );
    }

    #[test]
    fn test_voice_release_one_shot() {
        let ctl = ctl();
        ctl.set_voice_route(Direction::Rx, 0).unwrap();
        let log = listen(
            &ctl,
            EventKind::ReleasePending | EventKind::DeviceRelease,
            ClientType::Voice,
            0,
        );

        ctl.post_event(EventKind::ReleasePending, 0);
        ctl.post_event(EventKind::DeviceRelease, 0);
        assert_eq!(kinds(&log), vec![EventKind::ReleasePending]);

        ctl.post_event(EventKind::DeviceRelease, 0);
        assert_eq!(
            kinds(&log),
            vec![EventKind::ReleasePending, EventKind::DeviceRelease]
        );
        assert_eq!(ctl.device_status(0).unwrap().sessions.lane(ClientType::Voice), 0);
    }

    #[test]
    fn test_voice_volume_mute_payloads() {
        let ctl = ctl();
        ctl.set_voice_route(Direction::Rx, 0).unwrap();
        ctl.set_voice_route(Direction::Tx, 1).unwrap();
        let log = listen(&ctl, EventKind::DeviceVolumeMuteChange.into(), ClientType::Voice, 0);

        ctl.set_voice_mute(Direction::Rx, true).unwrap();
        ctl.set_voice_volume(Direction::Rx, 60).unwrap();
        ctl.set_voice_mute(Direction::Tx, true).unwrap();

        let values: Vec<_> = log
            .lock()
            .iter()
            .map(|(_, payload)| match payload {
                EventPayload::VoiceVolumeMute(info) => (info.direction, info.vendor_id, info.value),
                other => panic!("unexpected payload {:?}", other),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                (Direction::Rx, 7, VolumeOrMute::Mute(true)),
                (Direction::Rx, 7, VolumeOrMute::Volume(60)),
                (Direction::Tx, 8, VolumeOrMute::Mute(true)),
            ]
        );
    }

    #[test]
    fn test_voice_device_info() {
        let ctl = ctl();
        ctl.set_voice_route(Direction::Rx, 0).unwrap();
        ctl.set_voice_route(Direction::Tx, 1).unwrap();
        let log = listen(&ctl, EventKind::DeviceChangeVoice.into(), ClientType::Voice, 0);
        let decoder = listen(&ctl, EventKind::DeviceChangeVoice.into(), ClientType::Decoder, 0);

        ctl.post_event(EventKind::DeviceChangeVoice, 0);
        ctl.post_event(EventKind::DeviceChangeVoice, 1);

        assert!(decoder.lock().is_empty());
        assert_eq!(
            log.lock().iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
            vec![
                EventPayload::VoiceDevice(VoiceDeviceInfo {
                    device_id: 0,
                    direction: Direction::Rx,
                    vendor_id: 7,
                    sample_rate: 48000,
                    volume_index: Some(4),
                }),
                EventPayload::VoiceDevice(VoiceDeviceInfo {
                    device_id: 1,
                    direction: Direction::Tx,
                    vendor_id: 8,
                    sample_rate: 8000,
                    volume_index: None,
                }),
            ]
        );
    }

    #[test]
    fn test_start_voice_reaches_voice_only() {
        let ctl = ctl();
        let voice = listen(&ctl, EventMask::all(), ClientType::Voice, 0);
        let decoder = listen(&ctl, EventMask::all(), ClientType::Decoder, 0);
        let cal = listen(&ctl, EventMask::all(), ClientType::Calibration, 0);

        ctl.broadcast(EventKind::StartVoice, None, SessionFilter::Ignore);
        ctl.broadcast(EventKind::EndVoice, None, SessionFilter::Ignore);

        assert_eq!(
            *voice.lock(),
            vec![
                (EventKind::StartVoice, EventPayload::Empty),
                (EventKind::EndVoice, EventPayload::Empty),
            ]
        );
        assert!(decoder.lock().is_empty());
        assert!(cal.lock().is_empty());
    }

    #[test]
    fn test_calibration_view() {
        let ctl = ctl();
        let cal = listen(&ctl, EventMask::all(), ClientType::Calibration, 0);

        // Idle devices are not reported
        ctl.post_event(EventKind::DeviceReady, 2);
        assert!(cal.lock().is_empty());

        ctl.set_session_route(2, 2, true, SessionKind::Decoder).unwrap();
        ctl.set_session_route(5, 2, true, SessionKind::Decoder).unwrap();
        ctl.post_event(EventKind::DeviceReady, 2);

        assert_eq!(
            *cal.lock(),
            vec![(
                EventKind::DeviceReady,
                EventPayload::Calibration(CalibrationInfo {
                    routing_id: 3,
                    vendor_id: 9,
                    direction: Direction::Rx,
                    sample_rate: 48000,
                    sessions: 0b0010_0100,
                })
            )]
        );
    }

    #[test]
    fn test_voice_state_fan_out() {
        let ctl = ctl();
        let voice = listen(&ctl, EventKind::VoiceStateChange.into(), ClientType::Voice, 0);
        let encoder = listen(&ctl, EventKind::VoiceStateChange.into(), ClientType::Encoder, 1);
        let cal = listen(&ctl, EventKind::VoiceStateChange.into(), ClientType::Calibration, 0);

        ctl.set_voice_state(VoiceState::OffCall);

        let expected = vec![(
            EventKind::VoiceStateChange,
            EventPayload::VoiceState(VoiceState::OffCall),
        )];
        assert_eq!(*voice.lock(), expected);
        assert_eq!(*encoder.lock(), expected);
        assert_eq!(*cal.lock(), expected);
    }

    #[test]
    fn test_voice_state_kept_without_listeners() {
        let ctl = ctl();
        ctl.set_voice_state(VoiceState::InCall);
        assert_eq!(ctl.voice_state(), VoiceState::InCall);
    }
}
