//! Decoder and encoder session routes

use super::lane::SessionMask;
use super::table::SessionKind;
use crate::device::DeviceId;
use crate::error::{DevCtlError, Result};
use crate::store::State;

impl State {
    pub(crate) fn set_session_route(
        &mut self,
        session_id: u32,
        device_id: DeviceId,
        enable: bool,
        kind: SessionKind,
    ) -> Result<()> {
        let client_type = kind.client_type();
        self.routing.check_session(client_type, session_id)?;
        let mask = SessionMask::session(client_type, session_id)
            .ok_or_else(|| DevCtlError::session_out_of_range(client_type, session_id))?;
        let device = self
            .devices
            .find_mut(device_id)
            .map_err(|_| DevCtlError::OutOfRange {
                what: "device",
                id: device_id,
            })?;

        self.routing
            .set_route_bit(kind, session_id, device_id, enable)?;
        if enable {
            device.sessions.insert(mask);
        } else {
            device.sessions.remove(mask);
        }

        tracing::debug!(
            session_id = session_id,
            device_id = device_id,
            kind = ?kind,
            enable = enable,
            sessions = %device.sessions,
            "Session route updated"
        );
        Ok(())
    }

    pub(crate) fn query_route(
        &self,
        session_id: u32,
        device_id: DeviceId,
        kind: SessionKind,
    ) -> Result<bool> {
        let route_mask = self.routing.route_mask(kind, session_id)?;
        let device = self
            .devices
            .find(device_id)
            .map_err(|_| DevCtlError::OutOfRange {
                what: "device",
                id: device_id,
            })?;

        let routed = route_mask & (1 << device_id) != 0;
        debug_assert_eq!(
            routed,
            SessionMask::session(kind.client_type(), session_id)
                .is_some_and(|mask| device.sessions.contains(mask)),
            "route table and device lanes diverged"
        );
        Ok(routed)
    }
}
