use mediasoup::rtp_parameters::{
    MimeTypeAudio, RtcpParameters, RtpCodecParameters, RtpCodecParametersParameters,
    RtpEncodingParameters, RtpParameters,
};
use std::num::NonZero;

/// A PCMU producer's RTP parameters, matching the codec this process's
/// routers are always created with (see `sfu_core::codecs::media_codecs`).
/// Built as a typed value and serialized onto the wire the way a real
/// `mediasoup-client` `Device` hands the server a negotiated parameter set,
/// rather than as a hand-written JSON literal.
pub fn pcmu_rtp_parameters(ssrc: u32) -> RtpParameters {
    RtpParameters {
        mid: Some("0".to_string()),
        codecs: vec![RtpCodecParameters::Audio {
            mime_type: MimeTypeAudio::Pcmu,
            payload_type: 0,
            clock_rate: NonZero::new(8000).unwrap(),
            channels: NonZero::new(1).unwrap(),
            parameters: RtpCodecParametersParameters::default(),
            rtcp_feedback: vec![],
        }],
        header_extensions: vec![],
        encodings: vec![RtpEncodingParameters {
            ssrc: Some(ssrc),
            rid: None,
            codec_payload_type: None,
            rtx: None,
            dtx: None,
            scalability_mode: Default::default(),
            max_bitrate: None,
        }],
        rtcp: RtcpParameters {
            cname: Some(format!("test-{ssrc:x}")),
            reduced_size: true,
        },
    }
}
