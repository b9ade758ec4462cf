//! Negotiation payload and request fixtures.

use common::types::RoomId;
use sc_service::coordinator::JoinRequest;
use sc_service::rpc::Jsep;
use serde_json::{json, Value};

/// Builder for a well-formed offer declaring a chosen set of streams.
///
/// Each stream gets its own audio section with an `a=msid` line.
#[derive(Debug, Clone, Default)]
pub struct TestOffer {
    streams: Vec<String>,
    info: Option<Value>,
}

impl TestOffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stream(mut self, stream_id: &str) -> Self {
        self.streams.push(stream_id.to_string());
        self
    }

    /// Application payload to put on the join request.
    #[must_use]
    pub fn info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    /// The session description text.
    #[must_use]
    pub fn sdp(&self) -> String {
        let mut sdp = String::from("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
        if self.streams.is_empty() {
            sdp.push_str("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\na=recvonly\r\n");
        }
        for (mid, stream) in self.streams.iter().enumerate() {
            sdp.push_str(&format!(
                "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:{mid}\r\na=msid:{stream} track-{mid}\r\n"
            ));
        }
        sdp
    }

    #[must_use]
    pub fn jsep(&self) -> Jsep {
        Jsep::offer(self.sdp())
    }
}

/// Join request for `room` carrying the given offer.
#[must_use]
pub fn join_request(room: &str, offer: TestOffer) -> JoinRequest {
    JoinRequest {
        room_id: RoomId::from(room),
        jsep: json!(offer.jsep()),
        info: offer.info.clone().unwrap_or_else(|| json!({})),
    }
}

/// Join payloads the coordinator must reject as unparseable, with a label
/// for assertion messages.
#[must_use]
pub fn malformed_offers() -> Vec<(&'static str, Value)> {
    vec![
        ("empty", json!(Jsep::offer(""))),
        ("no version line", json!(Jsep::offer("o=- 1 2 IN IP4 127.0.0.1\r\nm=audio 9 RTP/AVP 0\r\n"))),
        ("garbage", json!(Jsep::offer("v=0\r\nthis is not sdp\r\n"))),
        ("no media section", json!(Jsep::offer("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\n"))),
        ("missing payload", Value::Null),
        ("missing sdp", json!({ "type": "offer" })),
        ("unknown type", json!({ "type": "bogus", "sdp": "v=0\r\n" })),
        ("not an object", json!("v=0")),
    ]
}

/// A renegotiation answer as a client would send it.
#[must_use]
pub fn test_answer() -> Jsep {
    Jsep::answer("v=0\r\no=- 3 4 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_service::sdp::SessionDescription;

    #[test]
    fn test_offer_declares_streams() {
        let sdp = TestOffer::new().stream("cam").stream("mic").sdp();
        let desc = SessionDescription::parse(&sdp).unwrap();
        assert_eq!(desc.streams().len(), 2);
        assert_eq!(desc.media_sections(), 2);
    }

    #[test]
    fn test_offer_without_streams_is_still_valid() {
        let desc = SessionDescription::parse(&TestOffer::new().sdp()).unwrap();
        assert!(desc.streams().is_empty());
    }

    #[test]
    fn test_malformed_offers_fail_to_parse() {
        for (label, payload) in malformed_offers() {
            let Ok(jsep) = serde_json::from_value::<Jsep>(payload) else {
                continue;
            };
            assert!(SessionDescription::parse(&jsep.sdp).is_err(), "{label}");
        }
    }
}
