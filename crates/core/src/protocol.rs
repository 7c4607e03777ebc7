//! The signaling wire contract: client-originated requests, the matching
//! success replies, and server-originated events. Transport parameter
//! objects are re-serialized verbatim (field names as produced by the
//! engine are preserved: `id`, `iceParameters`, `iceCandidates`,
//! `dtlsParameters`, `sctpParameters`, `rtpCapabilities`, `rtpParameters`,
//! `kind`) — this module is agnostic to the wire framing, which is a
//! concern of `sfu-api`.

use mediasoup::prelude::*;
use serde::{Deserialize, Serialize};

/// Client -> server signaling messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientRequest {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        peer_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        transport_id: String,
        dtls_parameters: DtlsParameters,
    },
    #[serde(rename_all = "camelCase")]
    Produce {
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },
    #[serde(rename_all = "camelCase")]
    Consume {
        transport_id: String,
        producer_id: String,
        rtp_capabilities: RtpCapabilities,
    },
    #[serde(rename_all = "camelCase")]
    ResumeConsumer {
        consumer_id: String,
    },
    GetProducers,
}

/// Transport connection details sent to the client, field names preserved
/// verbatim from the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportDescription {
    pub id: String,
    pub ice_parameters: serde_json::Value,
    pub ice_candidates: serde_json::Value,
    pub dtls_parameters: serde_json::Value,
    pub sctp_parameters: serde_json::Value,
}

/// `{peerId, producerId, kind}` — the shape used both for `get-producers`
/// listings and `new-producer` emissions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerDescriptor {
    pub peer_id: String,
    pub producer_id: String,
    pub kind: String,
}

/// Success payloads, one shape per request method.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    JoinRoom {
        #[serde(rename = "sendTransport")]
        send_transport: TransportDescription,
        #[serde(rename = "recvTransport")]
        recv_transport: TransportDescription,
        #[serde(rename = "routerRtpCapabilities")]
        router_rtp_capabilities: serde_json::Value,
    },
    Success {
        success: bool,
    },
    Produce {
        id: String,
    },
    Consume {
        id: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        kind: String,
        #[serde(rename = "rtpParameters")]
        rtp_parameters: serde_json::Value,
    },
    GetProducers {
        producers: Vec<ProducerDescriptor>,
    },
}

/// Server -> client events. Best-effort, fire-and-forget.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    PeerJoined {
        #[serde(rename = "peerId")]
        peer_id: String,
    },
    NewProducer {
        #[serde(rename = "peerId")]
        peer_id: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        kind: String,
    },
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: String,
    },
}

pub fn media_kind_str(kind: MediaKind) -> String {
    match kind {
        MediaKind::Audio => "audio".to_string(),
        MediaKind::Video => "video".to_string(),
    }
}
