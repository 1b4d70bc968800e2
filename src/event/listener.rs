//! Listener registry
//!
//! Subscriptions are kept in registration order, which is the order the
//! dispatcher visits them. Each `(client_type, client_id)` key maps to the
//! slots it occupies, so unsubscribe finds its entry without a scan. Removal
//! leaves a hole that is compacted away once holes outnumber live entries.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::kind::{EventKind, EventMask};
use super::payload::EventPayload;
use crate::error::{DevCtlError, Result};
use crate::routing::ClientType;

/// Receiver of control-plane events
///
/// Called on the thread that triggered the event, after the control-plane
/// lock has been released.
pub trait EventListener: Send + Sync {
    fn on_event(&self, kind: EventKind, payload: &EventPayload);
}

impl<F> EventListener for F
where
    F: Fn(EventKind, &EventPayload) + Send + Sync,
{
    fn on_event(&self, kind: EventKind, payload: &EventPayload) {
        self(kind, payload)
    }
}

/// One subscription
#[derive(Clone)]
pub struct ListenerEntry {
    pub client_type: ClientType,
    pub client_id: u32,
    pub events: EventMask,
    pub(crate) listener: Arc<dyn EventListener>,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("client_type", &self.client_type)
            .field("client_id", &self.client_id)
            .field("events", &self.events)
            .finish()
    }
}

type ListenerKey = (ClientType, u32);

/// Registration-ordered set of subscriptions
#[derive(Default)]
pub struct ListenerRegistry {
    slots: Vec<Option<ListenerEntry>>,
    /// Occupied slots per key, oldest first
    index: HashMap<ListenerKey, VecDeque<usize>>,
    live: usize,
}

/// Holes tolerated before compaction is considered
const COMPACT_THRESHOLD: usize = 16;

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription
    ///
    /// Duplicate `(client_type, client_id)` pairs are accepted; the first
    /// one registered is the one `remove` takes out.
    pub fn add(&mut self, entry: ListenerEntry) -> Result<()> {
        self.slots
            .try_reserve(1)
            .map_err(|_| DevCtlError::OutOfMemory)?;
        self.index
            .entry((entry.client_type, entry.client_id))
            .or_default()
            .push_back(self.slots.len());
        self.slots.push(Some(entry));
        self.live += 1;
        Ok(())
    }

    /// Remove the first subscription matching `(client_type, client_id)`
    pub fn remove(&mut self, client_type: ClientType, client_id: u32) -> Result<ListenerEntry> {
        let key = (client_type, client_id);
        let queue = self
            .index
            .get_mut(&key)
            .ok_or(DevCtlError::NotFound("listener"))?;
        let position = queue.pop_front().ok_or(DevCtlError::NotFound("listener"))?;
        if queue.is_empty() {
            self.index.remove(&key);
        }

        let entry = self
            .slots
            .get_mut(position)
            .and_then(Option::take)
            .ok_or(DevCtlError::NotFound("listener"))?;
        self.live -= 1;
        self.compact();
        Ok(entry)
    }

    /// Subscriptions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ListenerEntry> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn compact(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let holes = self.slots.len() - self.live;
        if holes > COMPACT_THRESHOLD && holes > self.live {
            self.slots.retain(Option::is_some);
            self.reindex();
        }
    }

    /// Slot positions shift after compaction
    fn reindex(&mut self) {
        self.index.clear();
        for (position, entry) in self.slots.iter().enumerate() {
            if let Some(entry) = entry {
                self.index
                    .entry((entry.client_type, entry.client_id))
                    .or_default()
                    .push_back(position);
            }
        }
    }
}
