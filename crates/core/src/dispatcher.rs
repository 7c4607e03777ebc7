//! Translates wire-level [`ClientRequest`]s into engine operations against a
//! [`Room`], and engine-level events back into bookkeeping on a [`Peer`].
//!
//! Every method here is pure with respect to the wire: it takes a parsed
//! request and returns a [`Reply`] or an error, and never itself decides
//! what to send back over a socket or when to broadcast. The ack-then-notify
//! ordering required for `produce` is the caller's job — see `sfu-api`'s
//! connection handler, which sends the `Reply::Produce` ack before calling
//! [`Dispatcher::announce_producer`].

use std::str::FromStr;
use std::sync::Arc;

use mediasoup::prelude::*;
use mediasoup::webrtc_transport::{
    WebRtcTransportListenInfos, WebRtcTransportOptions, WebRtcTransportRemoteParameters,
};
use tracing::{debug, warn};

use sfu_config::SfuSettings;

use crate::error::{CoreError, CoreResult};
use crate::peer::{EventSender, Peer};
use crate::protocol::{ProducerDescriptor, Reply, ServerEvent, TransportDescription};
use crate::registry::RoomRegistry;
use crate::room::Room;

/// Stateless coordinator wired to the room registry and transport settings.
///
/// Holds no per-peer state of its own — all of that lives on [`Room`] and
/// [`Peer`], reached through the registry.
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
    listen_ip: std::net::IpAddr,
    announced_ip: Option<String>,
    initial_available_outgoing_bitrate: u32,
    max_incoming_bitrate: u32,
}

impl Dispatcher {
    pub fn new(registry: Arc<RoomRegistry>, settings: &SfuSettings) -> Self {
        let listen_ip: std::net::IpAddr = settings
            .listen_ip
            .parse()
            .unwrap_or_else(|_| "0.0.0.0".parse().unwrap());

        let announced_ip = if settings.announced_ip.is_empty() {
            None
        } else {
            Some(settings.announced_ip.clone())
        };

        Self {
            registry,
            listen_ip,
            announced_ip,
            initial_available_outgoing_bitrate: settings.initial_available_outgoing_bitrate,
            max_incoming_bitrate: settings.max_incoming_bitrate,
        }
    }

    /// Handles a `join-room` request.
    ///
    /// Gets or creates the Room, rejects a duplicate `peerId`, creates the
    /// send/recv transport pair, and inserts the new Peer. If recv transport
    /// creation fails after the send transport succeeded, the send transport
    /// is simply dropped — closing it at the engine — and the error
    /// propagates; no Peer is ever inserted on a partial failure.
    pub async fn join_room(
        &self,
        room_id: &str,
        peer_id: &str,
        events: EventSender,
    ) -> CoreResult<(Arc<Room>, Reply)> {
        if peer_id.trim().is_empty() || room_id.trim().is_empty() {
            return Err(CoreError::ArgumentInvalid(
                "roomId and peerId must be non-empty".into(),
            ));
        }

        let room = self.registry.get_or_create(room_id).await?;

        if room.has_peer(peer_id) {
            return Err(CoreError::Conflict(format!(
                "peer {peer_id} already joined room {room_id}"
            )));
        }

        let send_transport = self.create_webrtc_transport(&room.router).await?;
        let recv_transport = self.create_webrtc_transport(&room.router).await?;

        let send_desc = transport_description(&send_transport);
        let recv_desc = transport_description(&recv_transport);
        let router_rtp_capabilities = serde_json::to_value(room.router.rtp_capabilities())
            .map_err(|e| CoreError::EngineFailed(format!("failed to encode rtp capabilities: {e}")))?;

        let peer = Arc::new(Peer::new(
            peer_id.to_string(),
            room_id.to_string(),
            events,
            send_transport,
            recv_transport,
        ));
        self.attach_transport_watchers(&peer);

        room.insert_peer(peer.clone());
        peer.mark_joined();

        debug!(room_id, peer_id, "peer joined");

        Ok((
            room,
            Reply::JoinRoom {
                send_transport: send_desc,
                recv_transport: recv_desc,
                router_rtp_capabilities,
            },
        ))
    }

    /// Looks up a room a connection has already joined, by id. `sfu-api`
    /// holds the returned `Arc<Room>` on the connection for the rest of its
    /// methods instead of re-resolving it on every request.
    pub fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.registry.get(room_id)
    }

    /// Number of mediasoup workers available to service rooms. Zero means
    /// the process came up without a usable engine.
    pub fn worker_count(&self) -> usize {
        self.registry.worker_count()
    }

    /// Handles `connect-transport`: supplies the client's DTLS role and
    /// fingerprint for a transport this peer owns.
    pub async fn connect_transport(
        &self,
        peer: &Peer,
        transport_id: &str,
        dtls_parameters: DtlsParameters,
    ) -> CoreResult<Reply> {
        let tid = TransportId::from_str(transport_id)
            .map_err(|e| CoreError::ArgumentInvalid(format!("invalid transportId: {e}")))?;
        let remote_params = WebRtcTransportRemoteParameters { dtls_parameters };

        let transport = self.owned_transport(peer, tid)?;
        transport
            .connect(remote_params)
            .await
            .map_err(|e| CoreError::EngineRejected(format!("transport connect failed: {e}")))?;

        debug!(peer_id = %peer.id, transport_id, "transport connected");
        Ok(Reply::Success { success: true })
    }

    /// Handles `produce`: creates a Producer on the peer's send transport.
    /// Callers must broadcast `new-producer` only after the ack built from
    /// this reply has been sent.
    pub async fn produce(
        &self,
        peer: &Arc<Peer>,
        transport_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> CoreResult<(Reply, ProducerDescriptor)> {
        let tid = TransportId::from_str(transport_id)
            .map_err(|e| CoreError::ArgumentInvalid(format!("invalid transportId: {e}")))?;

        if peer.send_transport.id() != tid {
            return Err(CoreError::ArgumentInvalid(
                "produce must target the peer's send transport".into(),
            ));
        }

        let producer_options = ProducerOptions::new(kind, rtp_parameters);
        let producer = peer
            .send_transport
            .produce(producer_options)
            .await
            .map_err(|e| CoreError::EngineRejected(format!("produce failed: {e}")))?;

        let producer_id = producer.id();
        let kind_str = crate::protocol::media_kind_str(producer.kind());

        let weak_peer = Arc::downgrade(peer);
        producer
            .on_transport_close(move || {
                if let Some(peer) = weak_peer.upgrade() {
                    peer.producers.remove(&producer_id);
                }
            })
            .detach();

        peer.producers.insert(producer_id, producer);
        peer.mark_producing();

        debug!(peer_id = %peer.id, %producer_id, ?kind, "producer created");

        Ok((
            Reply::Produce {
                id: producer_id.to_string(),
            },
            ProducerDescriptor {
                peer_id: peer.id.clone(),
                producer_id: producer_id.to_string(),
                kind: kind_str,
            },
        ))
    }

    /// Broadcasts `peer-joined` to every other peer already in the room.
    /// Called by `sfu-api` strictly after the joining peer's own ack has
    /// gone out.
    pub fn announce_peer_joined(&self, room: &Room, peer_id: &str) {
        room.broadcast(
            ServerEvent::PeerJoined {
                peer_id: peer_id.to_string(),
            },
            peer_id,
        );
    }

    /// Broadcasts `new-producer` to every other peer in the room. Called by
    /// `sfu-api` strictly after the producing peer's own ack has gone out.
    pub fn announce_producer(&self, room: &Room, descriptor: ProducerDescriptor) {
        room.broadcast(
            ServerEvent::NewProducer {
                peer_id: descriptor.peer_id.clone(),
                producer_id: descriptor.producer_id,
                kind: descriptor.kind,
            },
            &descriptor.peer_id,
        );
    }

    /// Handles `consume`: refuses to consume a producer owned by the
    /// requesting peer itself, and refuses capability-incompatible pairs via
    /// the router before ever touching the transport.
    pub async fn consume(
        &self,
        room: &Room,
        peer: &Arc<Peer>,
        transport_id: &str,
        producer_id: &str,
        rtp_capabilities: RtpCapabilities,
    ) -> CoreResult<Reply> {
        let tid = TransportId::from_str(transport_id)
            .map_err(|e| CoreError::ArgumentInvalid(format!("invalid transportId: {e}")))?;
        if peer.recv_transport.id() != tid {
            return Err(CoreError::ArgumentInvalid(
                "consume must target the peer's recv transport".into(),
            ));
        }

        let pid = ProducerId::from_str(producer_id)
            .map_err(|e| CoreError::ArgumentInvalid(format!("invalid producerId: {e}")))?;

        let owner = room
            .peers_with_producer(pid)
            .ok_or_else(|| CoreError::NotFound(format!("producer {producer_id} not found")))?;
        if owner == peer.id {
            return Err(CoreError::ArgumentInvalid(
                "a peer cannot consume its own producer".into(),
            ));
        }

        if !room.router.can_consume(&pid, &rtp_capabilities) {
            return Err(CoreError::EngineRejected(
                "incompatible rtpCapabilities for this producer".into(),
            ));
        }

        let consumer_options = ConsumerOptions::new(pid, rtp_capabilities);

        let consumer = peer
            .recv_transport
            .consume(consumer_options)
            .await
            .map_err(|e| CoreError::EngineRejected(format!("consume failed: {e}")))?;

        let consumer_id = consumer.id();
        let rtp_parameters = serde_json::to_value(consumer.rtp_parameters())
            .map_err(|e| CoreError::EngineFailed(format!("failed to encode rtp parameters: {e}")))?;
        let kind_str = crate::protocol::media_kind_str(consumer.kind());

        let weak_peer = Arc::downgrade(peer);
        consumer
            .on_producer_close({
                let weak_peer = weak_peer.clone();
                move || {
                    debug!(%consumer_id, "consumer's producer closed");
                    if let Some(peer) = weak_peer.upgrade() {
                        peer.consumers.remove(&consumer_id);
                    }
                }
            })
            .detach();
        consumer
            .on_transport_close(move || {
                if let Some(peer) = weak_peer.upgrade() {
                    peer.consumers.remove(&consumer_id);
                }
            })
            .detach();

        peer.consumers.insert(consumer_id, consumer);
        peer.mark_active();

        debug!(peer_id = %peer.id, %consumer_id, producer_id, "consumer created");

        Ok(Reply::Consume {
            id: consumer_id.to_string(),
            producer_id: producer_id.to_string(),
            kind: kind_str,
            rtp_parameters,
        })
    }

    /// Handles `resume-consumer`. Consumers are created unpaused, but the
    /// engine binding may still gate actual media flow on this explicit call
    /// depending on its own internal semantics, so the call is issued for
    /// real rather than short-circuited as a no-op ack.
    pub async fn resume_consumer(&self, peer: &Peer, consumer_id: &str) -> CoreResult<Reply> {
        let cid = ConsumerId::from_str(consumer_id)
            .map_err(|e| CoreError::ArgumentInvalid(format!("invalid consumerId: {e}")))?;

        let consumer = peer
            .consumers
            .get(&cid)
            .ok_or_else(|| CoreError::NotFound(format!("consumer {consumer_id} not found on this peer")))?
            .clone();

        consumer
            .resume()
            .await
            .map_err(|e| CoreError::EngineRejected(format!("resume failed: {e}")))?;

        debug!(peer_id = %peer.id, %consumer_id, "consumer resumed");
        Ok(Reply::Success { success: true })
    }

    /// Handles `get-producers`: the late-joiner bootstrap listing.
    pub fn get_producers(&self, room: &Room, peer: &Peer) -> Reply {
        Reply::GetProducers {
            producers: room.list_producers(&peer.id),
        }
    }

    /// Removes a peer from its room in teardown order (consumers, then
    /// producers, then both transports, then removal from the room),
    /// broadcasts `peer-left` to whoever remains only once that full order
    /// has completed, and deletes the room if it is now empty. A no-op if
    /// the peer was already removed (e.g. by a racing teardown).
    ///
    /// Requires the caller to have already released every other `Arc<Peer>`
    /// handle for this peer (e.g. a connection's own `Connection.peer`) —
    /// otherwise the explicit `drop` below only releases the registry's
    /// reference and the transports stay open under a reference held
    /// elsewhere, past the `peer-left` broadcast.
    pub fn teardown_peer(&self, room: &Arc<Room>, peer_id: &str) {
        let Some(peer) = room.remove_peer(peer_id) else {
            return;
        };
        peer.mark_closing();
        peer.close_media();
        peer.mark_closed();
        drop(peer);

        room.broadcast(
            ServerEvent::PeerLeft {
                peer_id: peer_id.to_string(),
            },
            peer_id,
        );
        self.registry.remove_if_empty(room);
    }

    async fn create_webrtc_transport(&self, router: &Router) -> CoreResult<WebRtcTransport> {
        let udp_info = ListenInfo {
            protocol: Protocol::Udp,
            ip: self.listen_ip,
            announced_address: self.announced_ip.clone(),
            port: None,
            port_range: None,
            flags: None,
            send_buffer_size: None,
            recv_buffer_size: None,
            expose_internal_ip: false,
        };
        let tcp_info = ListenInfo {
            protocol: Protocol::Tcp,
            ip: self.listen_ip,
            announced_address: self.announced_ip.clone(),
            port: None,
            port_range: None,
            flags: None,
            send_buffer_size: None,
            recv_buffer_size: None,
            expose_internal_ip: false,
        };

        let listen_infos = WebRtcTransportListenInfos::new(udp_info).insert(tcp_info);
        let mut transport_options = WebRtcTransportOptions::new(listen_infos);
        transport_options.enable_udp = true;
        transport_options.enable_tcp = true;
        transport_options.prefer_udp = true;
        transport_options.initial_available_outgoing_bitrate = self.initial_available_outgoing_bitrate;

        let transport = router
            .create_webrtc_transport(transport_options)
            .await
            .map_err(|e| CoreError::EngineFailed(format!("failed to create WebRtcTransport: {e}")))?;

        if let Err(e) = transport
            .set_max_incoming_bitrate(self.max_incoming_bitrate)
            .await
        {
            warn!(error = %e, "failed to set incoming bitrate ceiling, continuing without it");
        }

        Ok(transport)
    }

    /// Registers the DTLS teardown watcher shared by both of a peer's
    /// transports. The engine itself drives the transport's actual closure
    /// once DTLS reports `Closed`; this handler only logs, since the
    /// bookkeeping side (removing the peer from its room) is driven by the
    /// connection's own disconnect path, not by this callback re-entering
    /// dispatcher state from inside the engine's event loop.
    fn attach_transport_watchers(&self, peer: &Peer) {
        for (label, transport) in [
            ("send", &peer.send_transport),
            ("recv", &peer.recv_transport),
        ] {
            let peer_id = peer.id.clone();
            transport.connect_dtls_state_change(move |state| {
                if state == DtlsState::Closed {
                    debug!(peer_id = %peer_id, transport = label, "transport dtls closed");
                }
            });
        }
    }

    fn owned_transport<'a>(&self, peer: &'a Peer, transport_id: TransportId) -> CoreResult<&'a WebRtcTransport> {
        if peer.send_transport.id() == transport_id {
            Ok(&peer.send_transport)
        } else if peer.recv_transport.id() == transport_id {
            Ok(&peer.recv_transport)
        } else {
            Err(CoreError::NotFound(format!(
                "transport {transport_id} does not belong to this peer"
            )))
        }
    }
}

fn transport_description(transport: &WebRtcTransport) -> TransportDescription {
    TransportDescription {
        id: transport.id().to_string(),
        ice_parameters: serde_json::to_value(transport.ice_parameters()).unwrap_or_default(),
        ice_candidates: serde_json::to_value(transport.ice_candidates()).unwrap_or_default(),
        dtls_parameters: serde_json::to_value(transport.dtls_parameters()).unwrap_or_default(),
        sctp_parameters: serde_json::to_value(transport.sctp_parameters()).unwrap_or_default(),
    }
}
