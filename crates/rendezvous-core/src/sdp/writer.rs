//! [`SessionDescription`] → SDP text

use crate::error::SdpError;

use super::types::{
    Attribute, Bandwidth, Connection, Dtls, Ice, MediaDescription, Payload, SessionDescription,
};

pub(crate) fn generate(desc: &SessionDescription) -> Result<String, SdpError> {
    let mut w = Writer::default();

    w.line('v', desc.version.to_string())?;
    if let Some(o) = &desc.originator {
        w.line(
            'o',
            format!(
                "{} {} {} {} {} {}",
                o.username, o.session_id, o.session_version, o.net_type, o.address_type, o.address
            ),
        )?;
    }
    if let Some(name) = &desc.session_name {
        w.line('s', name)?;
    }

    // i= u= e= p= precede connection data; r= z= k= follow timing
    let (before, after): (Vec<&String>, Vec<&String>) = desc
        .extra_lines
        .iter()
        .partition(|l| matches!(l.chars().next(), Some('i' | 'u' | 'e' | 'p')));
    for raw in before {
        w.raw(raw)?;
    }

    w.connection(desc.connection.as_ref())?;
    w.bandwidths(&desc.bandwidths)?;
    if let Some(t) = &desc.timing {
        w.line('t', format!("{} {}", t.start_time, t.stop_time))?;
    }
    for raw in after {
        w.raw(raw)?;
    }

    w.ice(desc.ice.as_ref())?;
    w.dtls(desc.dtls.as_ref())?;
    w.attributes(&desc.attributes)?;
    w.candidates(desc.ice.as_ref())?;

    for media in &desc.media_descriptions {
        w.media(media)?;
    }

    Ok(w.out)
}

#[derive(Default)]
struct Writer {
    out: String,
}

impl Writer {
    fn line(&mut self, kind: char, value: impl AsRef<str>) -> Result<(), SdpError> {
        let value = value.as_ref();
        if value.contains(['\r', '\n']) {
            return Err(SdpError::InvalidDescription(format!(
                "{}= value contains a line break",
                kind
            )));
        }
        self.out.push(kind);
        self.out.push('=');
        self.out.push_str(value);
        self.out.push_str("\r\n");
        Ok(())
    }

    fn raw(&mut self, raw: &str) -> Result<(), SdpError> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(kind), Some('=')) if kind.is_ascii_lowercase() => self.line(kind, &raw[2..]),
            _ => Err(SdpError::InvalidDescription(format!(
                "extra line {:?} is not `<type>=<value>`",
                raw
            ))),
        }
    }

    fn attr(&mut self, name: &str, value: Option<&str>) -> Result<(), SdpError> {
        match value {
            Some(value) => self.line('a', format!("{}:{}", name, value)),
            None => self.line('a', name),
        }
    }

    fn connection(&mut self, connection: Option<&Connection>) -> Result<(), SdpError> {
        if let Some(c) = connection {
            self.line('c', format!("{} {} {}", c.net_type, c.address_type, c.address))?;
        }
        Ok(())
    }

    fn bandwidths(&mut self, bandwidths: &[Bandwidth]) -> Result<(), SdpError> {
        for b in bandwidths {
            self.line('b', format!("{}:{}", b.modifier, b.value))?;
        }
        Ok(())
    }

    fn attributes(&mut self, attributes: &[Attribute]) -> Result<(), SdpError> {
        for attribute in attributes {
            self.attr(&attribute.name, attribute.value.as_deref())?;
        }
        Ok(())
    }

    fn ice(&mut self, ice: Option<&Ice>) -> Result<(), SdpError> {
        let Some(ice) = ice else { return Ok(()) };
        if let Some(ufrag) = &ice.ufrag {
            self.attr("ice-ufrag", Some(ufrag))?;
        }
        if let Some(password) = &ice.password {
            self.attr("ice-pwd", Some(password))?;
        }
        if let Some(options) = &ice.ice_options {
            self.attr("ice-options", Some(options))?;
        }
        Ok(())
    }

    fn candidates(&mut self, ice: Option<&Ice>) -> Result<(), SdpError> {
        let Some(ice) = ice else { return Ok(()) };
        for candidate in &ice.candidates {
            self.line('a', candidate.to_string())?;
        }
        if ice.end_of_candidates {
            self.attr("end-of-candidates", None)?;
        }
        Ok(())
    }

    fn dtls(&mut self, dtls: Option<&Dtls>) -> Result<(), SdpError> {
        let Some(dtls) = dtls else { return Ok(()) };
        if let (Some(hash), Some(fingerprint)) = (&dtls.fingerprint_hash_function, &dtls.fingerprint) {
            self.attr("fingerprint", Some(&format!("{} {}", hash, fingerprint)))?;
        }
        if let Some(setup) = &dtls.setup {
            self.attr("setup", Some(setup))?;
        }
        Ok(())
    }

    fn media(&mut self, media: &MediaDescription) -> Result<(), SdpError> {
        let port = match media.port_count {
            Some(count) => format!("{}/{}", media.port, count),
            None => media.port.to_string(),
        };
        let mut m = format!("{} {} {}", media.media, port, media.protocol);
        if media.payloads.is_empty() {
            for format in &media.formats {
                m.push(' ');
                m.push_str(format);
            }
        } else {
            for payload in &media.payloads {
                m.push(' ');
                m.push_str(&payload.payload_type.to_string());
            }
        }
        self.line('m', m)?;

        for raw in &media.extra_lines {
            self.raw(raw)?;
        }
        self.connection(media.connection.as_ref())?;
        self.bandwidths(&media.bandwidths)?;

        if let Some(rtcp) = &media.rtcp {
            let value = match &rtcp.connection {
                Some(c) => format!("{} {} {} {}", rtcp.port, c.net_type, c.address_type, c.address),
                None => rtcp.port.to_string(),
            };
            self.attr("rtcp", Some(&value))?;
        }
        self.ice(media.ice.as_ref())?;
        self.dtls(media.dtls.as_ref())?;
        if let Some(mid) = &media.mid {
            self.attr("mid", Some(mid))?;
        }
        if let Some(mode) = media.mode {
            self.attr(mode.as_str(), None)?;
        }
        if let Some(stream) = &media.media_stream_id {
            let value = match &media.media_stream_track_id {
                Some(track) => format!("{} {}", stream, track),
                None => stream.clone(),
            };
            self.attr("msid", Some(&value))?;
        }
        if media.rtcp_mux {
            self.attr("rtcp-mux", None)?;
        }

        for payload in &media.payloads {
            self.payload(payload)?;
        }

        if let Some(sctp) = &media.sctp {
            match (sctp.port, &sctp.app) {
                (Some(port), Some(app)) => {
                    let value = match sctp.streams {
                        Some(streams) => format!("{} {} {}", port, app, streams),
                        None => format!("{} {}", port, app),
                    };
                    self.attr("sctpmap", Some(&value))?;
                }
                (Some(port), None) => self.attr("sctp-port", Some(&port.to_string()))?,
                _ => {}
            }
            if let Some(size) = sctp.max_message_size {
                self.attr("max-message-size", Some(&size.to_string()))?;
            }
        }

        for ssrc in &media.ssrcs {
            let value = match &ssrc.value {
                Some(value) => format!("{} {}:{}", ssrc.id, ssrc.attribute, value),
                None => format!("{} {}", ssrc.id, ssrc.attribute),
            };
            self.attr("ssrc", Some(&value))?;
        }

        self.candidates(media.ice.as_ref())?;
        self.attributes(&media.attributes)
    }

    fn payload(&mut self, payload: &Payload) -> Result<(), SdpError> {
        let pt = payload.payload_type;
        if let Some(encoding) = &payload.encoding_name {
            let mut value = format!("{} {}", pt, encoding);
            if let Some(rate) = payload.clock_rate {
                value.push_str(&format!("/{}", rate));
                if let Some(channels) = payload.channels {
                    value.push_str(&format!("/{}", channels));
                }
            }
            self.attr("rtpmap", Some(&value))?;
        }
        if !payload.parameters.is_empty() {
            let params: Vec<String> = payload
                .parameters
                .iter()
                .map(|(key, value)| {
                    if value.is_empty() {
                        key.clone()
                    } else {
                        format!("{}={}", key, value)
                    }
                })
                .collect();
            self.attr("fmtp", Some(&format!("{} {}", pt, params.join(";"))))?;
        }
        for feedback in &payload.feedback {
            self.attr("rtcp-fb", Some(&format!("{} {}", pt, feedback)))?;
        }
        Ok(())
    }
}
