//! Handshake payload transform
//!
//! Augments relayed JSON payloads so either peer can consume the session
//! description in compact or structured form. Branch selection follows
//! JavaScript truthiness, which is what browser clients encode against.

use serde_json::{Map, Value};

use rendezvous_core::sdp::{Candidate, SdpTransform, SessionDescription};

use crate::error::TransformError;

/// Transform a relayed body.
///
/// Returns `Ok(None)` when the body is valid JSON but not an object, in
/// which case it is relayed as-is. On success the re-serialized object is
/// returned, whether or not a branch applied.
pub fn transform_payload(
    sdp: &dyn SdpTransform,
    body: &[u8],
) -> Result<Option<String>, TransformError> {
    let mut value: Value = serde_json::from_slice(body)?;
    let Some(message) = value.as_object_mut() else {
        return Ok(None);
    };

    if truthy(message.get("sdp")) && !truthy(message.get("sessionDescription")) {
        expand_description(sdp, message)?;
    } else if truthy(message.get("sessionDescription"))
        && truthy(message.get("type"))
        && !truthy(message.get("sdp"))
    {
        compact_description(sdp, message)?;
    } else if truthy(message.get("candidate")) {
        if let Some(candidate) = message.get_mut("candidate").and_then(Value::as_object_mut) {
            transform_candidate(sdp, candidate)?;
        }
    }

    Ok(Some(serde_json::to_string(&value)?))
}

/// `sdp` -> `sessionDescription` and top-level `type`
fn expand_description(
    sdp: &dyn SdpTransform,
    message: &mut Map<String, Value>,
) -> Result<(), TransformError> {
    let (text, kind) = {
        let compact = message.get("sdp").ok_or(TransformError::MissingField("sdp"))?;
        let text = compact
            .get("sdp")
            .and_then(Value::as_str)
            .ok_or(TransformError::MissingField("sdp.sdp"))?;
        (text.to_string(), compact.get("type").cloned())
    };

    let description = sdp.parse(&text)?;
    message.insert(
        "sessionDescription".into(),
        serde_json::to_value(description)?,
    );
    match kind {
        Some(kind) => message.insert("type".into(), kind),
        None => message.remove("type"),
    };
    Ok(())
}

/// `sessionDescription` + `type` -> `sdp`
fn compact_description(
    sdp: &dyn SdpTransform,
    message: &mut Map<String, Value>,
) -> Result<(), TransformError> {
    let description: SessionDescription = serde_json::from_value(
        message
            .get("sessionDescription")
            .cloned()
            .ok_or(TransformError::MissingField("sessionDescription"))?,
    )?;
    let kind = message
        .get("type")
        .cloned()
        .ok_or(TransformError::MissingField("type"))?;

    let text = sdp.generate(&description)?;
    let mut compact = Map::new();
    compact.insert("type".into(), kind);
    compact.insert("sdp".into(), Value::String(text));
    message.insert("sdp".into(), Value::Object(compact));
    Ok(())
}

fn transform_candidate(
    sdp: &dyn SdpTransform,
    candidate: &mut Map<String, Value>,
) -> Result<(), TransformError> {
    if truthy(candidate.get("candidate")) && !truthy(candidate.get("candidateDescription")) {
        let line = candidate
            .get("candidate")
            .and_then(Value::as_str)
            .ok_or(TransformError::MissingField("candidate.candidate"))?;

        let wrapped = sdp.parse(&format!("m=application 0 NONE\r\na={}\r\n", line))?;
        let parsed = wrapped
            .media_descriptions
            .first()
            .and_then(|m| m.ice.as_ref())
            .and_then(|ice| ice.candidates.first());
        if let Some(parsed) = parsed {
            candidate.insert("candidateDescription".into(), serde_json::to_value(parsed)?);
        }
    } else if truthy(candidate.get("candidateDescription")) && !truthy(candidate.get("candidate")) {
        let description: Candidate = serde_json::from_value(
            candidate
                .get("candidateDescription")
                .cloned()
                .ok_or(TransformError::MissingField("candidateDescription"))?,
        )?;
        candidate.insert("candidate".into(), Value::String(description.to_string()));
    }
    Ok(())
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_core::SdpCodec;
    use serde_json::json;

    const OFFER: &str = "v=0\r\n\
        o=- 20518 0 IN IP4 0.0.0.0\r\n\
        s=-\r\n\
        t=0 0\r\n\
        m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=ice-ufrag:F7gI\r\n\
        a=ice-pwd:x9cml/YzichV2+XlhiMu8g\r\n\
        a=fingerprint:sha-256 49:66:12:17:0D:1C:91:AE:57:4C:C6:36:DD:D5:97\r\n\
        a=setup:actpass\r\n\
        a=mid:0\r\n\
        a=sctp-port:5000\r\n";

    fn run(body: Value) -> Value {
        let out = transform_payload(&SdpCodec, body.to_string().as_bytes())
            .unwrap()
            .unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_expand_offer() {
        let out = run(json!({ "sdp": { "type": "offer", "sdp": OFFER } }));
        assert_eq!(out["type"], "offer");
        let desc = &out["sessionDescription"];
        assert_eq!(desc["mediaDescriptions"][0]["type"], "application");
        assert_eq!(desc["mediaDescriptions"][0]["ice"]["ufrag"], "F7gI");
        assert_eq!(out["sdp"]["sdp"], OFFER);
    }

    #[test]
    fn test_compact_answer() {
        let description = SdpCodec.parse(OFFER).unwrap();
        let out = run(json!({
            "type": "answer",
            "sessionDescription": serde_json::to_value(&description).unwrap(),
        }));
        assert_eq!(out["sdp"]["type"], "answer");
        let text = out["sdp"]["sdp"].as_str().unwrap();
        assert_eq!(SdpCodec.parse(text).unwrap(), description);
    }

    #[test]
    fn test_both_forms_present_is_untouched() {
        let body = json!({
            "type": "offer",
            "sdp": { "type": "offer", "sdp": "v=0\r\n" },
            "sessionDescription": { "version": 0 },
        });
        assert_eq!(run(body.clone()), body);
    }

    #[test]
    fn test_candidate_to_description() {
        let line = "candidate:1 1 UDP 2130706431 10.0.1.1 8998 typ host";
        let out = run(json!({ "candidate": { "candidate": line, "sdpMid": "0" } }));
        let desc = &out["candidate"]["candidateDescription"];
        assert_eq!(desc["foundation"], "1");
        assert_eq!(desc["componentId"], 1);
        assert_eq!(desc["priority"], 2130706431u32);
        assert_eq!(desc["type"], "host");
        assert_eq!(out["candidate"]["sdpMid"], "0");
    }

    #[test]
    fn test_description_to_candidate() {
        let out = run(json!({
            "candidate": {
                "candidateDescription": {
                    "foundation": "842163049",
                    "componentId": 1,
                    "transport": "udp",
                    "priority": 1677729535u32,
                    "address": "203.0.113.7",
                    "port": 49203,
                    "type": "srflx",
                    "relatedAddress": "192.168.1.4",
                    "relatedPort": 49203,
                }
            }
        }));
        assert_eq!(
            out["candidate"]["candidate"],
            "candidate:842163049 1 udp 1677729535 203.0.113.7 49203 typ srflx raddr 192.168.1.4 rport 49203"
        );
    }

    #[test]
    fn test_key_order_preserved() {
        let body = r#"{"type":"answer","zeta":1,"candidate":{"sdpMid":"0","candidate":""},"alpha":2}"#;
        let out = transform_payload(&SdpCodec, body.as_bytes()).unwrap().unwrap();
        assert_eq!(out, body);

        let line = "candidate:1 1 UDP 2130706431 10.0.1.1 8998 typ host";
        let body = format!(r#"{{"candidate":{{"sdpMid":"0","candidate":"{}"}},"label":0}}"#, line);
        let out = transform_payload(&SdpCodec, body.as_bytes()).unwrap().unwrap();
        assert!(out.starts_with(&format!(r#"{{"candidate":{{"sdpMid":"0","candidate":"{}","candidateDescription":{{"#, line)));
        assert!(out.ends_with(r#"},"label":0}"#));
    }

    #[test]
    fn test_non_object_passes_through() {
        assert_eq!(transform_payload(&SdpCodec, b"\"hello\"").unwrap(), None);
        assert_eq!(transform_payload(&SdpCodec, b"[1,2]").unwrap(), None);
    }

    #[test]
    fn test_invalid_json_fails() {
        assert!(matches!(
            transform_payload(&SdpCodec, b"not json"),
            Err(TransformError::Json(_))
        ));
    }

    #[test]
    fn test_malformed_sdp_fails() {
        let body = json!({ "sdp": { "type": "offer", "sdp": "garbage" } });
        assert!(matches!(
            transform_payload(&SdpCodec, body.to_string().as_bytes()),
            Err(TransformError::Sdp(_))
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(false))));
        assert!(truthy(Some(&json!({}))));
        assert!(truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!("x"))));
    }
}
