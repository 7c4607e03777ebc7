use dashmap::DashMap;
use mediasoup::prelude::*;
use mediasoup::router::Router;
use std::sync::Arc;

use crate::peer::Peer;
use crate::protocol::{media_kind_str, ProducerDescriptor, ServerEvent};

/// A multi-peer session sharing one Router.
///
/// The Room owns the Router and the `peerId -> Peer` mapping. Dropping a
/// Room drops its Router, closing every RTP resource it multiplexed.
pub struct Room {
    pub id: String,
    pub router: Router,
    peers: DashMap<String, Arc<Peer>>,
}

impl Room {
    pub fn new(id: String, router: Router) -> Self {
        Self {
            id,
            router,
            peers: DashMap::new(),
        }
    }

    pub fn has_peer(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<Arc<Peer>> {
        self.peers.get(peer_id).map(|p| p.clone())
    }

    pub fn insert_peer(&self, peer: Arc<Peer>) {
        self.peers.insert(peer.id.clone(), peer);
    }

    /// Removes and returns a peer, if present. The caller is responsible
    /// for dropping the returned `Arc` once done with it so the `Peer`'s
    /// resources actually close.
    pub fn remove_peer(&self, peer_id: &str) -> Option<Arc<Peer>> {
        self.peers.remove(peer_id).map(|(_, peer)| peer)
    }

    /// Finds the id of the peer that owns the given producer, if any peer
    /// in the room currently does. Used by `consume` to refuse self-consume
    /// before ever touching the router or transport.
    pub fn peers_with_producer(&self, producer_id: ProducerId) -> Option<String> {
        self.peers
            .iter()
            .find(|entry| entry.value().producers.contains_key(&producer_id))
            .map(|entry| entry.key().clone())
    }

    /// Lists every producer owned by every *other* peer currently in the
    /// room, excluding `excluding_peer_id`'s own.
    pub fn list_producers(&self, excluding_peer_id: &str) -> Vec<ProducerDescriptor> {
        let mut result = Vec::new();
        for entry in self.peers.iter() {
            let peer = entry.value();
            if peer.id == excluding_peer_id {
                continue;
            }
            for producer in peer.producers.iter() {
                result.push(ProducerDescriptor {
                    peer_id: peer.id.clone(),
                    producer_id: producer.key().to_string(),
                    kind: media_kind_str(producer.value().kind()),
                });
            }
        }
        result
    }

    /// Best-effort delivery to every member peer's signaling channel except
    /// the excluded one. A delivery failure to one recipient never blocks
    /// or fails delivery to the rest, and never mutates Room state.
    pub fn broadcast(&self, event: ServerEvent, excluding_peer_id: &str) {
        for entry in self.peers.iter() {
            let peer = entry.value();
            if peer.id == excluding_peer_id {
                continue;
            }
            peer.notify(event.clone());
        }
    }
}
