//! Structured session description types
//!
//! Field names serialize in camelCase so the JSON form matches what browser
//! clients of the relay expect (`sessionDescription.mediaDescriptions[0].ice`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SdpError;

/// A complete session description
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDescription {
    /// Protocol version (`v=`)
    pub version: u32,
    /// Session originator (`o=`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originator: Option<Originator>,
    /// Session name (`s=`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Session-level connection data (`c=`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    /// Session-level bandwidth lines (`b=`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bandwidths: Vec<Bandwidth>,
    /// Active time (`t=`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    /// Session-level ICE parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice: Option<Ice>,
    /// Session-level DTLS parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtls: Option<Dtls>,
    /// Attributes without a structured field
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Other session-level lines (`i=`, `u=`, `e=`, `p=`, `r=`, `z=`, `k=`), verbatim
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_lines: Vec<String>,
    /// Media sections in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_descriptions: Vec<MediaDescription>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Originator {
    pub username: String,
    pub session_id: String,
    pub session_version: u64,
    pub net_type: String,
    pub address_type: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub net_type: String,
    pub address_type: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bandwidth {
    pub modifier: String,
    pub value: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub start_time: u64,
    pub stop_time: u64,
}

/// A generic `a=name[:value]` attribute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Media direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "sendrecv" => Some(Direction::SendRecv),
            "sendonly" => Some(Direction::SendOnly),
            "recvonly" => Some(Direction::RecvOnly),
            "inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }
}

/// One `m=` section and its attributes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaDescription {
    /// Media type (`audio`, `video`, `application`, ...)
    #[serde(rename = "type")]
    pub media: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_count: Option<u16>,
    pub protocol: String,
    /// RTP payloads, for RTP-based protocols
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payloads: Vec<Payload>,
    /// Format list, for non-RTP protocols
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bandwidths: Vec<Bandwidth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Direction>,
    /// Media identification (`a=mid`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtcp: Option<Rtcp>,
    #[serde(skip_serializing_if = "is_false")]
    pub rtcp_mux: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_stream_track_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssrcs: Vec<SsrcAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice: Option<Ice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtls: Option<Dtls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sctp: Option<Sctp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Other media-level lines (`i=`, `k=`), verbatim
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_lines: Vec<String>,
}

impl MediaDescription {
    /// Whether the format list carries RTP payload types
    pub fn is_rtp(&self) -> bool {
        self.protocol.contains("RTP")
    }

    pub(crate) fn payload_mut(&mut self, payload_type: u8) -> Option<&mut Payload> {
        self.payloads
            .iter_mut()
            .find(|p| p.payload_type == payload_type)
    }
}

/// An RTP payload format
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Payload {
    #[serde(rename = "type")]
    pub payload_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    /// Format parameters (`a=fmtp`); keys without a value map to ""
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    /// RTCP feedback types (`a=rtcp-fb`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rtcp {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

/// `a=ssrc:<id> <attribute>[:<value>]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrcAttribute {
    pub id: u32,
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ufrag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_options: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "is_false")]
    pub end_of_candidates: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dtls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_hash_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sctp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Application protocol from the legacy `a=sctpmap` form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<u64>,
}

/// An ICE connectivity candidate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub foundation: String,
    pub component_id: u16,
    pub transport: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<String>,
    /// Trailing name/value pairs such as `generation 0`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<CandidateExtension>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateExtension {
    pub name: String,
    pub value: String,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component_id,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.candidate_type
        )?;
        if let Some(addr) = &self.related_address {
            write!(f, " raddr {}", addr)?;
        }
        if let Some(port) = self.related_port {
            write!(f, " rport {}", port)?;
        }
        if let Some(tcp_type) = &self.tcp_type {
            write!(f, " tcptype {}", tcp_type)?;
        }
        for ext in &self.extensions {
            write!(f, " {} {}", ext.name, ext.value)?;
        }
        Ok(())
    }
}

impl FromStr for Candidate {
    type Err = SdpError;

    /// Parse the value of a candidate attribute, with or without the
    /// leading `a=` and `candidate:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("a=").unwrap_or(s);
        let s = s.strip_prefix("candidate:").unwrap_or(s);

        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() < 8 || tokens[6] != "typ" {
            return Err(SdpError::InvalidCandidate(s.to_string()));
        }

        let number = |field: &'static str, value: &str| {
            SdpError::InvalidCandidate(format!("{} {:?} in {:?}", field, value, s))
        };

        let mut candidate = Candidate {
            foundation: tokens[0].to_string(),
            component_id: tokens[1]
                .parse()
                .map_err(|_| number("component id", tokens[1]))?,
            transport: tokens[2].to_string(),
            priority: tokens[3]
                .parse()
                .map_err(|_| number("priority", tokens[3]))?,
            address: tokens[4].to_string(),
            port: tokens[5].parse().map_err(|_| number("port", tokens[5]))?,
            candidate_type: tokens[7].to_string(),
            related_address: None,
            related_port: None,
            tcp_type: None,
            extensions: Vec::new(),
        };

        let rest = &tokens[8..];
        if rest.len() % 2 != 0 {
            return Err(SdpError::InvalidCandidate(format!(
                "dangling token {:?} in {:?}",
                rest[rest.len() - 1],
                s
            )));
        }
        for pair in rest.chunks(2) {
            let (name, value) = (pair[0], pair[1]);
            match name {
                "raddr" => candidate.related_address = Some(value.to_string()),
                "rport" => {
                    candidate.related_port =
                        Some(value.parse().map_err(|_| number("related port", value))?)
                }
                "tcptype" => candidate.tcp_type = Some(value.to_string()),
                _ => candidate.extensions.push(CandidateExtension {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }

        Ok(candidate)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_roundtrip_host() {
        let line = "candidate:1 1 UDP 2130706431 10.0.1.1 8998 typ host";
        let candidate: Candidate = line.parse().unwrap();
        assert_eq!(candidate.foundation, "1");
        assert_eq!(candidate.component_id, 1);
        assert_eq!(candidate.priority, 2130706431);
        assert_eq!(candidate.candidate_type, "host");
        assert_eq!(candidate.to_string(), line);
    }

    #[test]
    fn test_candidate_roundtrip_related() {
        let line = "candidate:842163049 1 udp 1677729535 203.0.113.7 49203 typ srflx raddr 192.168.1.4 rport 49203";
        let candidate: Candidate = line.parse().unwrap();
        assert_eq!(candidate.related_address.as_deref(), Some("192.168.1.4"));
        assert_eq!(candidate.related_port, Some(49203));
        assert_eq!(candidate.to_string(), line);
    }

    #[test]
    fn test_candidate_roundtrip_tcp_with_extensions() {
        let line = "candidate:3 1 tcp 1518280447 192.168.1.4 9 typ host tcptype active generation 0 network-id 1";
        let candidate: Candidate = line.parse().unwrap();
        assert_eq!(candidate.tcp_type.as_deref(), Some("active"));
        assert_eq!(candidate.extensions.len(), 2);
        assert_eq!(candidate.to_string(), line);
    }

    #[test]
    fn test_candidate_accepts_attribute_prefix() {
        let candidate: Candidate = "a=candidate:1 1 UDP 1 10.0.0.1 1 typ host".parse().unwrap();
        assert_eq!(candidate.address, "10.0.0.1");
    }

    #[test]
    fn test_candidate_rejects_garbage() {
        assert!("candidate:1 1 UDP".parse::<Candidate>().is_err());
        assert!("candidate:1 x UDP 1 10.0.0.1 1 typ host"
            .parse::<Candidate>()
            .is_err());
        assert!("candidate:1 1 UDP 1 10.0.0.1 1 type host"
            .parse::<Candidate>()
            .is_err());
        assert!("candidate:1 1 UDP 1 10.0.0.1 1 typ host raddr"
            .parse::<Candidate>()
            .is_err());
    }

    #[test]
    fn test_candidate_json_field_names() {
        let candidate: Candidate = "candidate:1 1 UDP 1 10.0.0.1 1 typ host".parse().unwrap();
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["componentId"], 1);
        assert_eq!(json["type"], "host");
        assert!(json.get("relatedAddress").is_none());
    }
}
