//! SDP transform adapter
//!
//! Converts between the compact SDP text carried in signaling messages and a
//! structured [`SessionDescription`]. The relay only depends on the
//! [`SdpTransform`] trait; [`SdpCodec`] is the built-in implementation.

mod parser;
mod types;
mod writer;

pub use types::{
    Attribute, Bandwidth, Candidate, CandidateExtension, Connection, Direction, Dtls, Ice,
    MediaDescription, Originator, Payload, Rtcp, Sctp, SessionDescription, SsrcAttribute, Timing,
};

use crate::error::SdpError;

/// Bidirectional conversion between SDP text and its structured form.
///
/// Both directions are pure and synchronous.
pub trait SdpTransform: Send + Sync {
    /// Parse compact SDP text
    fn parse(&self, sdp: &str) -> Result<SessionDescription, SdpError>;

    /// Generate compact SDP text
    fn generate(&self, description: &SessionDescription) -> Result<String, SdpError>;
}

/// Default SDP codec
#[derive(Clone, Copy, Debug, Default)]
pub struct SdpCodec;

impl SdpTransform for SdpCodec {
    fn parse(&self, sdp: &str) -> Result<SessionDescription, SdpError> {
        parser::parse(sdp)
    }

    fn generate(&self, description: &SessionDescription) -> Result<String, SdpError> {
        writer::generate(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_OFFER: &str = "v=0\r\n\
        o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0 1\r\n\
        a=msid-semantic: WMS stream\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=rtcp:9 IN IP4 0.0.0.0\r\n\
        a=ice-ufrag:EsAw\r\n\
        a=ice-pwd:bP+XJMM09aR8AiX1jdukzR6Y\r\n\
        a=ice-options:trickle\r\n\
        a=fingerprint:sha-256 D7:87:5F:A7:42:1C:44:4C:2B:51:6C:A5\r\n\
        a=setup:actpass\r\n\
        a=mid:0\r\n\
        a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
        a=sendrecv\r\n\
        a=msid:stream track-a\r\n\
        a=rtcp-mux\r\n\
        a=rtpmap:111 opus/48000/2\r\n\
        a=rtcp-fb:111 transport-cc\r\n\
        a=fmtp:111 minptime=10;useinbandfec=1\r\n\
        a=rtpmap:0 PCMU/8000\r\n\
        a=ssrc:1001 cname:abc123\r\n\
        a=ssrc:1001 msid:stream track-a\r\n\
        a=candidate:842163049 1 udp 1677729535 203.0.113.7 49203 typ srflx raddr 192.168.1.4 rport 49203 generation 0\r\n\
        m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
        c=IN IP4 0.0.0.0\r\n\
        b=AS:30\r\n\
        a=ice-ufrag:EsAw\r\n\
        a=ice-pwd:bP+XJMM09aR8AiX1jdukzR6Y\r\n\
        a=mid:1\r\n\
        a=sctp-port:5000\r\n\
        a=max-message-size:262144\r\n";

    #[test]
    fn test_parse_offer() {
        let desc = SdpCodec.parse(CHROME_OFFER).unwrap();

        let originator = desc.originator.as_ref().unwrap();
        assert_eq!(originator.session_id, "4611731400430051336");
        assert_eq!(originator.session_version, 2);
        assert_eq!(desc.session_name.as_deref(), Some("-"));
        assert_eq!(desc.timing, Some(Timing::default()));
        assert_eq!(desc.attributes.len(), 2);
        assert_eq!(desc.media_descriptions.len(), 2);

        let audio = &desc.media_descriptions[0];
        assert_eq!(audio.media, "audio");
        assert_eq!(audio.mid.as_deref(), Some("0"));
        assert_eq!(audio.mode, Some(Direction::SendRecv));
        assert!(audio.rtcp_mux);
        assert_eq!(audio.payloads.len(), 2);
        let opus = &audio.payloads[0];
        assert_eq!(opus.encoding_name.as_deref(), Some("opus"));
        assert_eq!(opus.clock_rate, Some(48000));
        assert_eq!(opus.channels, Some(2));
        assert_eq!(opus.parameters.get("useinbandfec").map(String::as_str), Some("1"));
        assert_eq!(opus.feedback, vec!["transport-cc".to_string()]);
        assert_eq!(audio.media_stream_track_id.as_deref(), Some("track-a"));
        assert_eq!(audio.ssrcs.len(), 2);
        let ice = audio.ice.as_ref().unwrap();
        assert_eq!(ice.ufrag.as_deref(), Some("EsAw"));
        assert_eq!(ice.candidates[0].related_port, Some(49203));
        let dtls = audio.dtls.as_ref().unwrap();
        assert_eq!(dtls.setup.as_deref(), Some("actpass"));

        let data = &desc.media_descriptions[1];
        assert_eq!(data.formats, vec!["webrtc-datachannel".to_string()]);
        assert!(data.payloads.is_empty());
        assert_eq!(data.bandwidths[0].value, 30);
        let sctp = data.sctp.as_ref().unwrap();
        assert_eq!(sctp.port, Some(5000));
        assert_eq!(sctp.max_message_size, Some(262144));
    }

    #[test]
    fn test_structured_roundtrip() {
        let desc = SdpCodec.parse(CHROME_OFFER).unwrap();
        let text = SdpCodec.generate(&desc).unwrap();
        let reparsed = SdpCodec.parse(&text).unwrap();
        assert_eq!(reparsed, desc);
    }

    #[test]
    fn test_json_roundtrip_preserves_description() {
        let desc = SdpCodec.parse(CHROME_OFFER).unwrap();
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["mediaDescriptions"][0]["type"], "audio");
        assert_eq!(json["mediaDescriptions"][0]["payloads"][0]["encodingName"], "opus");

        let back: SessionDescription = serde_json::from_value(json).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_legacy_sctpmap_roundtrip() {
        let sdp = "v=0\r\nm=application 9 DTLS/SCTP 5000\r\na=sctpmap:5000 webrtc-datachannel 1024\r\n";
        let desc = SdpCodec.parse(sdp).unwrap();
        let sctp = desc.media_descriptions[0].sctp.as_ref().unwrap();
        assert_eq!(sctp.app.as_deref(), Some("webrtc-datachannel"));
        assert_eq!(sctp.streams, Some(1024));
        assert_eq!(SdpCodec.generate(&desc).unwrap(), sdp);
    }

    #[test]
    fn test_candidate_through_wrapper() {
        let line = "candidate:1 1 UDP 2130706431 10.0.1.1 8998 typ host";
        let desc = SdpCodec
            .parse(&format!("m=application 0 NONE\r\na={}\r\n", line))
            .unwrap();
        let candidate = &desc.media_descriptions[0].ice.as_ref().unwrap().candidates[0];
        assert_eq!(candidate.to_string(), line);
    }
}
