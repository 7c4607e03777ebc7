use dashmap::DashMap;
use mediasoup::prelude::*;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::protocol::ServerEvent;

/// Peer session state machine.
///
/// `new -> joined -> producing -> active -> closing -> closed`. There is no
/// rejoin: once a `Peer` reaches `Closing`/`Closed` it is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Joined,
    Producing,
    Active,
    Closing,
    Closed,
}

/// The channel on which server-originated events are delivered to this
/// peer's connection. Delivery is fire-and-forget: a closed channel (the
/// connection's writer task has already exited) is treated the same as a
/// best-effort send failure — it never propagates.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// The session object for one connected client.
///
/// Field order is significant: Rust drops struct fields top to bottom, so
/// dropping a `Peer` closes `consumers`, then `producers`, then
/// `send_transport`, then `recv_transport` — reproducing the required
/// teardown order even if the explicit teardown path in
/// [`crate::dispatcher::Dispatcher`] is ever bypassed.
pub struct Peer {
    pub id: String,
    pub room_id: String,
    events: EventSender,
    state: Mutex<PeerState>,
    pub consumers: DashMap<ConsumerId, Consumer>,
    pub producers: DashMap<ProducerId, Producer>,
    pub send_transport: WebRtcTransport,
    pub recv_transport: WebRtcTransport,
}

impl Peer {
    pub fn new(
        id: String,
        room_id: String,
        events: EventSender,
        send_transport: WebRtcTransport,
        recv_transport: WebRtcTransport,
    ) -> Self {
        Self {
            id,
            room_id,
            events,
            state: Mutex::new(PeerState::New),
            consumers: DashMap::new(),
            producers: DashMap::new(),
            send_transport,
            recv_transport,
        }
    }

    /// Best-effort delivery of a single event to this peer.
    pub fn notify(&self, event: ServerEvent) {
        // An `Err` here only means the connection's writer task is gone;
        // nothing upstream needs to know.
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock()
    }

    pub fn mark_joined(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(*state, PeerState::New);
        *state = PeerState::Joined;
    }

    pub fn mark_producing(&self) {
        let mut state = self.state.lock();
        if *state == PeerState::Joined {
            *state = PeerState::Producing;
        }
    }

    pub fn mark_active(&self) {
        let mut state = self.state.lock();
        if *state == PeerState::Producing {
            *state = PeerState::Active;
        }
    }

    pub fn mark_closing(&self) {
        *self.state.lock() = PeerState::Closing;
    }

    pub fn mark_closed(&self) {
        *self.state.lock() = PeerState::Closed;
    }

    /// Drops consumers and producers ahead of the transports that carry
    /// them, in case callers hold a cloned `Arc<Peer>` that outlives its
    /// removal from the room. The transports themselves are plain fields
    /// and close when this `Peer` value is finally dropped — see the
    /// struct-level doc comment.
    pub fn close_media(&self) {
        self.consumers.clear();
        self.producers.clear();
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        tracing::debug!(peer_id = %self.id, room_id = %self.room_id, "peer torn down");
    }
}
