//! Control-plane context
//!
//! [`AudioDevCtl`] owns the device registry, the routing table and the
//! listener registry behind one lock. Every public operation takes the lock
//! for its whole duration; operations that trigger events build the
//! payloads while holding it and invoke the listeners, in order, once it
//! has been released.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::DevCtlConfig;
use crate::control::{ControlRequest, ControlResponse};
use crate::device::{
    Capability, DeviceDescriptor, DeviceId, DeviceInfo, DeviceOps, DeviceRegistry, DeviceStatus,
};
use crate::error::{DevCtlError, Result};
use crate::event::{
    EventKind, EventListener, EventMask, EventPayload, ListenerEntry, ListenerRegistry,
    SessionFilter,
};
use crate::routing::{ClientType, Direction, RoutingTable, SessionKind, SessionMask, VoiceState};

/// A payload waiting to be handed to its listener
pub(crate) struct Delivery {
    pub(crate) listener: Arc<dyn EventListener>,
    pub(crate) kind: EventKind,
    pub(crate) payload: EventPayload,
}

/// Everything guarded by the control-plane lock
///
/// Holding `&mut State` is holding the lock: internal operations call each
/// other, including `broadcast`, through it without re-locking.
pub(crate) struct State {
    pub(crate) config: DevCtlConfig,
    pub(crate) devices: DeviceRegistry,
    pub(crate) routing: RoutingTable,
    pub(crate) listeners: ListenerRegistry,
    /// Set by a ReleasePending to voice listeners, consumed by the next DeviceRelease
    pub(crate) release_pending: bool,
    outbox: Vec<Delivery>,
}

impl State {
    fn new(config: DevCtlConfig) -> Self {
        Self {
            devices: DeviceRegistry::new(config.max_devices, config.open_attempts),
            routing: RoutingTable::new(config.max_decoder_sessions, config.max_encoder_sessions),
            listeners: ListenerRegistry::new(),
            release_pending: false,
            outbox: Vec::new(),
            config,
        }
    }

    pub(crate) fn deliver(
        &mut self,
        entry: &ListenerEntry,
        kind: EventKind,
        payload: EventPayload,
    ) {
        self.outbox.push(Delivery {
            listener: Arc::clone(&entry.listener),
            kind,
            payload,
        });
    }

    fn take_outbox(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn subscribe(&mut self, entry: ListenerEntry) -> Result<()> {
        tracing::info!(
            client_type = ?entry.client_type,
            client_id = entry.client_id,
            events = ?entry.events,
            "Listener added"
        );
        self.listeners.add(entry)
    }

    /// Remove a listener and every session bit it still holds
    pub(crate) fn unsubscribe(&mut self, client_type: ClientType, client_id: u32) -> Result<()> {
        self.listeners.remove(client_type, client_id)?;

        if let Some(mask) = SessionMask::session(client_type, client_id) {
            for device in self.devices.iter_mut() {
                device.sessions.remove(mask);
            }
            if let Some(kind) = SessionKind::from_client_type(client_type) {
                if let Err(e) = self.routing.clear_routes(kind, client_id) {
                    tracing::warn!(
                        client_type = ?client_type,
                        client_id = client_id,
                        error = %e,
                        "Listener held no routes to clear"
                    );
                }
            }
        }

        tracing::info!(
            client_type = ?client_type,
            client_id = client_id,
            listeners = self.listeners.len(),
            "Listener removed"
        );
        Ok(())
    }
}

/// Audio device control plane
///
/// Thread-safe; share it behind an `Arc`. Listeners run on the calling
/// thread after the lock is released and may call back into the context.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use audio_devctl::{
///     AudioDevCtl, Capability, ClientType, DeviceInfo, EventKind, EventPayload, MockDevice,
///     SessionKind,
/// };
///
/// let ctl = AudioDevCtl::new();
/// let speaker = ctl
///     .register(DeviceInfo::new("speaker", Capability::RX), Box::new(MockDevice::new()))
///     .unwrap();
///
/// ctl.subscribe(
///     EventKind::DeviceReady.into(),
///     ClientType::Decoder,
///     0,
///     Arc::new(|kind: EventKind, payload: &EventPayload| {
///         println!("{:?}: {:?}", kind, payload);
///     }),
/// )
/// .unwrap();
///
/// ctl.set_session_route(0, speaker, true, SessionKind::Decoder).unwrap();
/// ctl.open(speaker).unwrap();
/// let rate = ctl
///     .request_frequency(0, ClientType::Decoder, Capability::RX, 44100)
///     .unwrap();
/// assert_eq!(rate, Some(44100));
/// ```
pub struct AudioDevCtl {
    state: Mutex<State>,
}

impl AudioDevCtl {
    /// Create a control plane with default configuration
    pub fn new() -> Self {
        Self::with_config(DevCtlConfig::default())
    }

    /// Create a control plane with custom configuration
    pub fn with_config(config: DevCtlConfig) -> Self {
        Self {
            state: Mutex::new(State::new(config)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> DevCtlConfig {
        self.state.lock().config.clone()
    }

    /// Run `f` under the lock, then deliver the events it produced
    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let (result, deliveries) = {
            let mut state = self.state.lock();
            let result = f(&mut state);
            (result, state.take_outbox())
        };

        for delivery in deliveries {
            delivery
                .listener
                .on_event(delivery.kind, &delivery.payload);
        }

        result
    }

    // --- device registry -------------------------------------------------

    /// Register a device; called by drivers at initialisation
    pub fn register(&self, info: DeviceInfo, ops: Box<dyn DeviceOps>) -> Result<DeviceId> {
        self.with_state(|s| s.devices.register(info, ops))
    }

    /// Number of registered devices
    pub fn device_count(&self) -> usize {
        self.with_state(|s| s.devices.len())
    }

    /// Descriptors of every registered device, by id
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.with_state(|s| s.devices.iter().map(|d| d.descriptor()).collect())
    }

    /// Snapshot of one device's state
    pub fn device_status(&self, id: DeviceId) -> Result<DeviceStatus> {
        self.with_state(|s| s.devices.find(id).map(|d| d.status()))
    }

    pub fn open(&self, id: DeviceId) -> Result<()> {
        self.with_state(|s| s.devices.open(id))
    }

    pub fn close(&self, id: DeviceId) -> Result<()> {
        self.with_state(|s| s.devices.close(id))
    }

    pub fn enable_sidetone(&self, id: DeviceId, enable: bool) -> Result<()> {
        self.with_state(|s| s.devices.enable_sidetone(id, enable))
    }

    // --- routing ---------------------------------------------------------

    /// Route the voice rx or tx path to a device
    pub fn set_voice_route(&self, direction: Direction, device_id: DeviceId) -> Result<()> {
        self.with_state(|s| s.set_voice_route(direction, device_id))
    }

    /// Mix a decoder or encoder session to a device, or stop mixing it
    pub fn set_session_route(
        &self,
        session_id: u32,
        device_id: DeviceId,
        enable: bool,
        kind: SessionKind,
    ) -> Result<()> {
        self.with_state(|s| s.set_session_route(session_id, device_id, enable, kind))
    }

    /// Whether a session is mixed to a device
    pub fn query_route(
        &self,
        session_id: u32,
        device_id: DeviceId,
        kind: SessionKind,
    ) -> Result<bool> {
        self.with_state(|s| s.query_route(session_id, device_id, kind))
    }

    /// Every device a session is mixed to, as a device bitmask
    pub fn route_mask(&self, session_id: u32, kind: SessionKind) -> Result<u32> {
        self.with_state(|s| s.routing.route_mask(kind, session_id))
    }

    pub fn set_voice_mute(&self, direction: Direction, mute: bool) -> Result<()> {
        self.with_state(|s| s.set_voice_mute(direction, mute))
    }

    /// Set the voice volume of one path; a negative level reports the mute flag instead
    pub fn set_voice_volume(&self, direction: Direction, level: i32) -> Result<()> {
        self.with_state(|s| s.set_voice_volume(direction, level))
    }

    /// Set the device-level volume of the current voice device
    pub fn set_voice_device_volume(&self, direction: Direction, level: i32) -> Result<()> {
        self.with_state(|s| s.set_voice_device_volume(direction, level))
    }

    /// Vendor ids of the voice rx and tx devices
    pub fn voice_route_vendor_ids(&self) -> Result<(u32, u32)> {
        self.with_state(|s| s.voice_route_vendor_ids())
    }

    /// Whether a device is the current voice rx or tx device
    pub fn is_voice_device(&self, device_id: DeviceId) -> bool {
        self.with_state(|s| s.is_voice_device(device_id))
    }

    /// Voice (tx, rx) rates
    pub fn voice_frequencies(&self) -> (u32, u32) {
        self.with_state(|s| (s.routing.voice.tx_rate, s.routing.voice.rx_rate))
    }

    pub fn voice_state(&self) -> VoiceState {
        self.with_state(|s| s.routing.voice.state)
    }

    /// Record a new voice-call state and announce it
    pub fn set_voice_state(&self, state: VoiceState) {
        self.with_state(|s| s.set_voice_state(state))
    }

    /// Set the stream volume of a decoder session and announce it to that session
    pub fn set_stream_volume(&self, session_id: u32, volume: i32) -> Result<()> {
        self.with_state(|s| s.set_stream_volume(session_id, volume))
    }

    // --- frequency arbitration --------------------------------------------

    /// Ask for a sample rate on every device the session is routed to
    ///
    /// Returns the rate the session ends up with, or `None` when the session
    /// is not routed to any device matching `capability`.
    pub fn request_frequency(
        &self,
        session_id: u32,
        client_type: ClientType,
        capability: Capability,
        rate: u32,
    ) -> Result<Option<u32>> {
        self.with_state(|s| s.request_frequency(session_id, client_type, capability, rate))
    }

    /// Drop a session's rate request
    pub fn withdraw_frequency(
        &self,
        session_id: u32,
        capability: Capability,
        client_type: ClientType,
    ) -> Result<()> {
        self.with_state(|s| s.withdraw_frequency(session_id, capability, client_type))
    }

    /// Rate currently recorded for an encoder session
    pub fn encoder_frequency(&self, session_id: u32) -> Result<u32> {
        self.with_state(|s| {
            s.routing
                .frequency(SessionKind::Encoder, session_id)
                .map(|f| f.rate)
        })
    }

    // --- listeners and events ---------------------------------------------

    /// Subscribe to events
    pub fn subscribe(
        &self,
        events: EventMask,
        client_type: ClientType,
        client_id: u32,
        listener: Arc<dyn EventListener>,
    ) -> Result<()> {
        self.with_state(|s| {
            s.subscribe(ListenerEntry {
                client_type,
                client_id,
                events,
                listener,
            })
        })
    }

    /// Remove the first subscription of `(client_type, client_id)`
    pub fn unsubscribe(&self, client_type: ClientType, client_id: u32) -> Result<()> {
        self.with_state(|s| s.unsubscribe(client_type, client_id))
    }

    pub fn listener_count(&self) -> usize {
        self.with_state(|s| s.listeners.len())
    }

    /// Notify listeners of an event
    ///
    /// Device-scoped events naming an unknown device are dropped.
    pub fn broadcast(&self, kind: EventKind, device_id: Option<DeviceId>, filter: SessionFilter) {
        self.with_state(|s| s.broadcast(kind, device_id, filter))
    }

    /// Notify every interested listener of an event on a device
    pub fn post_event(&self, kind: EventKind, device_id: DeviceId) {
        self.broadcast(kind, Some(device_id), SessionFilter::Ignore)
    }

    // --- control surface --------------------------------------------------

    /// Execute one control request
    pub fn handle_control(&self, request: &ControlRequest) -> ControlResponse {
        self.with_state(|s| s.handle_control(request))
    }

    /// Decode, execute and encode one wire-format control request
    pub fn handle_control_message(&self, mut message: Bytes) -> Bytes {
        let response = match ControlRequest::decode(&mut message) {
            Ok(request) => self.handle_control(&request),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed control request");
                ControlResponse::Error(DevCtlError::InvalidArgument("malformed request"))
            }
        };
        response.encode()
    }
}

impl Default for AudioDevCtl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDevice;

    fn ctl_with_devices() -> AudioDevCtl {
        let ctl = AudioDevCtl::new();
        ctl.register(
            DeviceInfo::new("handset_rx", Capability::RX | Capability::VOICE),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.register(
            DeviceInfo::new("handset_tx", Capability::TX | Capability::VOICE),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl
    }

    #[test]
    fn test_enumerate_devices() {
        let ctl = ctl_with_devices();

        assert_eq!(ctl.device_count(), 2);
        let devices = ctl.devices();
        assert_eq!(devices[0].id, 0);
        assert_eq!(devices[0].name, "handset_rx");
        assert_eq!(devices[1].capability, Capability::TX | Capability::VOICE);
    }

    #[test]
    fn test_unsubscribe_clears_routes() {
        let ctl = ctl_with_devices();
        ctl.subscribe(
            EventMask::all(),
            ClientType::Decoder,
            2,
            Arc::new(|_: EventKind, _: &EventPayload| {}),
        )
        .unwrap();
        ctl.set_session_route(2, 0, true, SessionKind::Decoder).unwrap();
        assert!(ctl.query_route(2, 0, SessionKind::Decoder).unwrap());

        ctl.unsubscribe(ClientType::Decoder, 2).unwrap();

        assert!(!ctl.query_route(2, 0, SessionKind::Decoder).unwrap());
        assert_eq!(ctl.device_status(0).unwrap().sessions, SessionMask::EMPTY);
        assert_eq!(ctl.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_beyond_routing_table() {
        let ctl = ctl_with_devices();
        let last = ctl.config().max_decoder_sessions;
        ctl.subscribe(
            EventMask::all(),
            ClientType::Decoder,
            last,
            Arc::new(|_: EventKind, _: &EventPayload| {}),
        )
        .unwrap();

        assert_eq!(ctl.unsubscribe(ClientType::Decoder, last), Ok(()));
        assert_eq!(ctl.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_listener() {
        let ctl = ctl_with_devices();
        assert!(ctl.unsubscribe(ClientType::Encoder, 1).is_err());
    }

    #[test]
    fn test_listener_may_reenter() {
        let ctl = Arc::new(ctl_with_devices());
        let inner = Arc::clone(&ctl);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        ctl.subscribe(
            EventKind::VoiceStateChange.into(),
            ClientType::Voice,
            0,
            Arc::new(move |_: EventKind, _: &EventPayload| {
                sink.lock().push(inner.voice_state());
            }),
        )
        .unwrap();

        ctl.set_voice_state(VoiceState::InCall);
        assert_eq!(*seen.lock(), vec![VoiceState::InCall]);
    }
}
