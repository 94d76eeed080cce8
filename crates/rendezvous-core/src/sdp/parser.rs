//! SDP text → [`SessionDescription`]
//!
//! The parser is lenient in the ways browsers are: `\n` and `\r\n` line
//! endings are both accepted, blank lines are skipped, and the session-level
//! `v=`/`o=`/`s=`/`t=` lines are optional so a lone media section can be
//! parsed on its own.

use std::str::FromStr;

use crate::error::SdpError;

use super::types::{
    Attribute, Bandwidth, Candidate, Connection, Direction, Dtls, Ice, MediaDescription,
    Originator, Payload, Rtcp, Sctp, SessionDescription, SsrcAttribute, Timing,
};

pub(crate) fn parse(text: &str) -> Result<SessionDescription, SdpError> {
    let mut desc = SessionDescription::default();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let (kind, value) = split_line(raw).ok_or_else(|| SdpError::MalformedLine {
            line,
            text: raw.to_string(),
        })?;

        match kind {
            'm' => {
                let media = parse_media_line(line, value)?;
                desc.media_descriptions.push(media);
            }
            _ => match desc.media_descriptions.last_mut() {
                Some(media) => parse_media_field(media, line, kind, value)?,
                None => parse_session_field(&mut desc, line, kind, value)?,
            },
        }
    }

    Ok(desc)
}

fn split_line(raw: &str) -> Option<(char, &str)> {
    let mut chars = raw.chars();
    let kind = chars.next()?;
    if !kind.is_ascii_lowercase() || chars.next()? != '=' {
        return None;
    }
    Some((kind, &raw[2..]))
}

fn invalid(line: usize, field: &'static str, value: &str) -> SdpError {
    SdpError::InvalidField {
        line,
        field,
        value: value.to_string(),
    }
}

fn number<T: FromStr>(line: usize, field: &'static str, value: &str) -> Result<T, SdpError> {
    value.parse().map_err(|_| invalid(line, field, value))
}

fn parse_session_field(
    desc: &mut SessionDescription,
    line: usize,
    kind: char,
    value: &str,
) -> Result<(), SdpError> {
    match kind {
        'v' => desc.version = number(line, "version", value)?,
        'o' => desc.originator = Some(parse_originator(line, value)?),
        's' => desc.session_name = Some(value.to_string()),
        'c' => desc.connection = Some(parse_connection(line, value)?),
        'b' => desc.bandwidths.push(parse_bandwidth(line, value)?),
        't' => desc.timing = Some(parse_timing(line, value)?),
        'a' => {
            let (name, attr_value) = split_attribute(value);
            if !parse_transport_attribute(&mut desc.ice, &mut desc.dtls, line, name, attr_value)? {
                desc.attributes
                    .push(Attribute::new(name, attr_value.map(str::to_owned)));
            }
        }
        _ => desc.extra_lines.push(format!("{}={}", kind, value)),
    }
    Ok(())
}

fn parse_media_field(
    media: &mut MediaDescription,
    line: usize,
    kind: char,
    value: &str,
) -> Result<(), SdpError> {
    match kind {
        'c' => media.connection = Some(parse_connection(line, value)?),
        'b' => media.bandwidths.push(parse_bandwidth(line, value)?),
        'a' => parse_media_attribute(media, line, value)?,
        _ => media.extra_lines.push(format!("{}={}", kind, value)),
    }
    Ok(())
}

fn parse_originator(line: usize, value: &str) -> Result<Originator, SdpError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 6 {
        return Err(invalid(line, "originator", value));
    }
    Ok(Originator {
        username: parts[0].to_string(),
        session_id: parts[1].to_string(),
        session_version: number(line, "session version", parts[2])?,
        net_type: parts[3].to_string(),
        address_type: parts[4].to_string(),
        address: parts[5].to_string(),
    })
}

fn parse_connection(line: usize, value: &str) -> Result<Connection, SdpError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(invalid(line, "connection", value));
    }
    Ok(Connection {
        net_type: parts[0].to_string(),
        address_type: parts[1].to_string(),
        address: parts[2].to_string(),
    })
}

fn parse_bandwidth(line: usize, value: &str) -> Result<Bandwidth, SdpError> {
    let (modifier, amount) = value
        .split_once(':')
        .ok_or_else(|| invalid(line, "bandwidth", value))?;
    Ok(Bandwidth {
        modifier: modifier.to_string(),
        value: number(line, "bandwidth", amount)?,
    })
}

fn parse_timing(line: usize, value: &str) -> Result<Timing, SdpError> {
    let (start, stop) = value
        .split_once(' ')
        .ok_or_else(|| invalid(line, "timing", value))?;
    Ok(Timing {
        start_time: number(line, "start time", start.trim())?,
        stop_time: number(line, "stop time", stop.trim())?,
    })
}

fn parse_media_line(line: usize, value: &str) -> Result<MediaDescription, SdpError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(invalid(line, "media", value));
    }

    let (port, port_count) = match parts[1].split_once('/') {
        Some((port, count)) => (
            number(line, "port", port)?,
            Some(number(line, "port count", count)?),
        ),
        None => (number(line, "port", parts[1])?, None),
    };

    let mut media = MediaDescription {
        media: parts[0].to_string(),
        port,
        port_count,
        protocol: parts[2].to_string(),
        ..MediaDescription::default()
    };

    for format in &parts[3..] {
        if media.is_rtp() {
            media.payloads.push(Payload {
                payload_type: number(line, "payload type", format)?,
                ..Payload::default()
            });
        } else {
            media.formats.push(format.to_string());
        }
    }

    Ok(media)
}

fn split_attribute(value: &str) -> (&str, Option<&str>) {
    match value.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (value, None),
    }
}

/// Handle ICE and DTLS attributes, which may appear at either level.
///
/// Returns `false` if the attribute is not one of them.
fn parse_transport_attribute(
    ice: &mut Option<Ice>,
    dtls: &mut Option<Dtls>,
    line: usize,
    name: &str,
    value: Option<&str>,
) -> Result<bool, SdpError> {
    let text = value.unwrap_or_default();
    match name {
        "ice-ufrag" => ice.get_or_insert_with(Ice::default).ufrag = Some(text.to_string()),
        "ice-pwd" => ice.get_or_insert_with(Ice::default).password = Some(text.to_string()),
        "ice-options" => {
            ice.get_or_insert_with(Ice::default).ice_options = Some(text.to_string())
        }
        "candidate" => {
            let candidate: Candidate = text.parse()?;
            ice.get_or_insert_with(Ice::default).candidates.push(candidate);
        }
        "end-of-candidates" => ice.get_or_insert_with(Ice::default).end_of_candidates = true,
        "fingerprint" => {
            let (hash, fingerprint) = text
                .split_once(' ')
                .ok_or_else(|| invalid(line, "fingerprint", text))?;
            let dtls = dtls.get_or_insert_with(Dtls::default);
            dtls.fingerprint_hash_function = Some(hash.to_string());
            dtls.fingerprint = Some(fingerprint.trim().to_string());
        }
        "setup" => dtls.get_or_insert_with(Dtls::default).setup = Some(text.to_string()),
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_media_attribute(
    media: &mut MediaDescription,
    line: usize,
    value: &str,
) -> Result<(), SdpError> {
    let (name, attr_value) = split_attribute(value);
    if parse_transport_attribute(&mut media.ice, &mut media.dtls, line, name, attr_value)? {
        return Ok(());
    }

    let text = attr_value.unwrap_or_default();
    let handled = match name {
        "rtpmap" => parse_rtpmap(media, line, text)?,
        "fmtp" => parse_fmtp(media, line, text)?,
        "rtcp-fb" => parse_rtcp_fb(media, text),
        "rtcp" => {
            media.rtcp = Some(parse_rtcp(line, text)?);
            true
        }
        "rtcp-mux" if attr_value.is_none() => {
            media.rtcp_mux = true;
            true
        }
        "mid" => {
            media.mid = Some(text.to_string());
            true
        }
        "msid" => {
            let mut parts = text.splitn(2, ' ');
            media.media_stream_id = parts.next().map(str::to_owned);
            media.media_stream_track_id = parts.next().map(str::to_owned);
            true
        }
        "ssrc" => {
            media.ssrcs.push(parse_ssrc(line, text)?);
            true
        }
        "sctpmap" => {
            let parts: Vec<&str> = text.split_whitespace().collect();
            if parts.len() < 2 {
                return Err(invalid(line, "sctpmap", text));
            }
            let sctp = media.sctp.get_or_insert_with(Sctp::default);
            sctp.port = Some(number(line, "sctp port", parts[0])?);
            sctp.app = Some(parts[1].to_string());
            sctp.streams = match parts.get(2) {
                Some(streams) => Some(number(line, "sctp streams", streams)?),
                None => None,
            };
            true
        }
        "sctp-port" => {
            media.sctp.get_or_insert_with(Sctp::default).port =
                Some(number(line, "sctp port", text)?);
            true
        }
        "max-message-size" => {
            media.sctp.get_or_insert_with(Sctp::default).max_message_size =
                Some(number(line, "max message size", text)?);
            true
        }
        _ => match Direction::from_attribute(name) {
            Some(mode) if attr_value.is_none() => {
                media.mode = Some(mode);
                true
            }
            _ => false,
        },
    };

    if !handled {
        media
            .attributes
            .push(Attribute::new(name, attr_value.map(str::to_owned)));
    }
    Ok(())
}

/// `a=rtpmap:<pt> <encoding>/<clock rate>[/<channels>]`
fn parse_rtpmap(media: &mut MediaDescription, line: usize, text: &str) -> Result<bool, SdpError> {
    let (pt, encoding) = text
        .split_once(' ')
        .ok_or_else(|| invalid(line, "rtpmap", text))?;
    let Some(payload) = pt.parse().ok().and_then(|pt| media.payload_mut(pt)) else {
        return Ok(false);
    };

    let mut parts = encoding.trim().split('/');
    payload.encoding_name = parts.next().map(str::to_owned);
    payload.clock_rate = match parts.next() {
        Some(rate) => Some(number(line, "clock rate", rate)?),
        None => None,
    };
    payload.channels = match parts.next() {
        Some(channels) => Some(number(line, "channels", channels)?),
        None => None,
    };
    Ok(true)
}

/// `a=fmtp:<pt> key=value;key=value`
fn parse_fmtp(media: &mut MediaDescription, line: usize, text: &str) -> Result<bool, SdpError> {
    let (pt, params) = text
        .split_once(' ')
        .ok_or_else(|| invalid(line, "fmtp", text))?;
    let Some(payload) = pt.parse().ok().and_then(|pt| media.payload_mut(pt)) else {
        return Ok(false);
    };

    for param in params.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        payload
            .parameters
            .insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(true)
}

/// `a=rtcp-fb:<pt> <type>`; wildcard entries stay generic attributes
fn parse_rtcp_fb(media: &mut MediaDescription, text: &str) -> bool {
    let Some((pt, feedback)) = text.split_once(' ') else {
        return false;
    };
    match pt.parse().ok().and_then(|pt| media.payload_mut(pt)) {
        Some(payload) => {
            payload.feedback.push(feedback.trim().to_string());
            true
        }
        None => false,
    }
}

/// `a=rtcp:<port> [<nettype> <addrtype> <address>]`
fn parse_rtcp(line: usize, text: &str) -> Result<Rtcp, SdpError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let port = parts
        .first()
        .ok_or_else(|| invalid(line, "rtcp", text))
        .and_then(|port| number(line, "rtcp port", port))?;
    let connection = match parts.len() {
        1 => None,
        4 => Some(Connection {
            net_type: parts[1].to_string(),
            address_type: parts[2].to_string(),
            address: parts[3].to_string(),
        }),
        _ => return Err(invalid(line, "rtcp", text)),
    };
    Ok(Rtcp { port, connection })
}

/// `a=ssrc:<id> <attribute>[:<value>]`
fn parse_ssrc(line: usize, text: &str) -> Result<SsrcAttribute, SdpError> {
    let (id, rest) = text
        .split_once(' ')
        .ok_or_else(|| invalid(line, "ssrc", text))?;
    let (attribute, value) = split_attribute(rest);
    Ok(SsrcAttribute {
        id: number(line, "ssrc", id)?,
        attribute: attribute.to_string(),
        value: value.map(str::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_only() {
        let desc = parse("m=application 0 NONE\r\na=candidate:1 1 UDP 1 10.0.0.1 5000 typ host\r\n")
            .unwrap();
        assert_eq!(desc.version, 0);
        assert!(desc.originator.is_none());
        assert_eq!(desc.media_descriptions.len(), 1);

        let media = &desc.media_descriptions[0];
        assert_eq!(media.media, "application");
        assert_eq!(media.protocol, "NONE");
        assert!(media.formats.is_empty());
        let ice = media.ice.as_ref().unwrap();
        assert_eq!(ice.candidates.len(), 1);
        assert_eq!(ice.candidates[0].port, 5000);
    }

    #[test]
    fn test_parse_rtpmap_unknown_payload_is_generic() {
        let desc = parse("m=audio 9 RTP/AVP 0\na=rtpmap:8 PCMA/8000\n").unwrap();
        let media = &desc.media_descriptions[0];
        assert_eq!(media.payloads[0].encoding_name, None);
        assert_eq!(media.attributes, vec![Attribute::new("rtpmap", Some("8 PCMA/8000".into()))]);
    }

    #[test]
    fn test_parse_wildcard_rtcp_fb_is_generic() {
        let desc = parse("m=video 9 RTP/AVPF 96\na=rtcp-fb:* nack\n").unwrap();
        let media = &desc.media_descriptions[0];
        assert!(media.payloads[0].feedback.is_empty());
        assert_eq!(media.attributes[0].name, "rtcp-fb");
    }

    #[test]
    fn test_parse_session_level_transport() {
        let desc = parse(
            "v=0\na=ice-ufrag:abcd\na=fingerprint:sha-256 AA:BB\na=group:BUNDLE 0\n",
        )
        .unwrap();
        assert_eq!(desc.ice.unwrap().ufrag.as_deref(), Some("abcd"));
        let dtls = desc.dtls.unwrap();
        assert_eq!(dtls.fingerprint_hash_function.as_deref(), Some("sha-256"));
        assert_eq!(dtls.fingerprint.as_deref(), Some("AA:BB"));
        assert_eq!(desc.attributes, vec![Attribute::new("group", Some("BUNDLE 0".into()))]);
    }

    #[test]
    fn test_parse_port_count() {
        let desc = parse("m=video 49170/2 RTP/AVP 31\n").unwrap();
        let media = &desc.media_descriptions[0];
        assert_eq!(media.port, 49170);
        assert_eq!(media.port_count, Some(2));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("v=0\nthis is not sdp\n"),
            Err(SdpError::MalformedLine { line: 2, .. })
        ));
        assert!(matches!(
            parse("m=audio nine RTP/AVP 0\n"),
            Err(SdpError::InvalidField { field: "port", .. })
        ));
        assert!(matches!(
            parse("m=audio 9 RTP/AVP opus\n"),
            Err(SdpError::InvalidField {
                field: "payload type",
                ..
            })
        ));
        assert!(matches!(
            parse("o=- 1 2 IN IP4\n"),
            Err(SdpError::InvalidField {
                field: "originator",
                ..
            })
        ));
        assert!(matches!(
            parse("m=audio 9 RTP/AVP 0\na=candidate:bogus\n"),
            Err(SdpError::InvalidCandidate(_))
        ));
    }
}
