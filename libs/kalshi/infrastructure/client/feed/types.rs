//! Communications feed message types
//!
//! Envelope format is `{"type": "...", "msg": {...}}`. Unknown types decode
//! to [`FeedMessage::Unknown`] and are dropped by the worker rather than
//! failing the session.

use crate::domain::Side;
use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

/// One leg inside an RFQ's `mve_selected_legs`
#[derive(Debug, Clone, Deserialize)]
pub struct RfqLeg {
    #[serde(default)]
    pub event_ticker: String,
    pub market_ticker: String,
    pub side: Side,
}

/// Body of `rfq_created` (and of REST RFQ backfill entries)
#[derive(Debug, Clone, Deserialize)]
pub struct RfqPayload {
    pub id: String,
    #[serde(default)]
    pub market_ticker: String,
    #[serde(default)]
    pub contracts: u64,
    #[serde(default)]
    pub mve_selected_legs: Vec<RfqLeg>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// Body of `rfq_deleted` / `rfq_expired`
#[derive(Debug, Clone, Deserialize)]
pub struct RfqIdPayload {
    pub rfq_id: String,
}

/// Body of the quote lifecycle notifications
#[derive(Debug, Clone, Deserialize)]
pub struct QuotePayload {
    pub quote_id: String,
    #[serde(default)]
    pub rfq_id: String,
    #[serde(default)]
    pub market_ticker: String,
    #[serde(default)]
    pub accepted_side: Option<String>,
}

/// Body of `subscribed`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedPayload {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub sid: u64,
}

/// Body of venue `error` messages
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// A decoded communications feed message
#[derive(Debug, Clone)]
pub enum FeedMessage {
    RfqCreated(RfqPayload),
    RfqDeleted(RfqIdPayload),
    RfqExpired(RfqIdPayload),
    QuoteAccepted(QuotePayload),
    QuoteRejected(QuotePayload),
    QuoteConfirmed(QuotePayload),
    Subscribed(SubscribedPayload),
    Error(ErrorPayload),
    Unknown,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    msg: serde_json::Value,
}

// Decoded in two steps through the envelope so that unrecognized `type`
// values fall through to Unknown whatever their `msg` carries
impl<'de> Deserialize<'de> for FeedMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        macro_rules! body {
            ($msg:expr) => {
                serde_json::from_value($msg).map_err(D::Error::custom)?
            };
        }

        let Envelope { kind, msg } = Envelope::deserialize(deserializer)?;
        Ok(match kind.as_str() {
            "rfq_created" => FeedMessage::RfqCreated(body!(msg)),
            "rfq_deleted" => FeedMessage::RfqDeleted(body!(msg)),
            "rfq_expired" => FeedMessage::RfqExpired(body!(msg)),
            "quote_accepted" => FeedMessage::QuoteAccepted(body!(msg)),
            "quote_rejected" => FeedMessage::QuoteRejected(body!(msg)),
            "quote_confirmed" => FeedMessage::QuoteConfirmed(body!(msg)),
            "subscribed" => FeedMessage::Subscribed(body!(msg)),
            "error" => FeedMessage::Error(body!(msg)),
            _ => FeedMessage::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfq_created_with_legs() {
        let json = r#"{
            "type": "rfq_created",
            "msg": {
                "id": "rfq-123",
                "market_ticker": "KXSPORTSMULTIGAME-25NOV18",
                "contracts": 100,
                "mve_selected_legs": [
                    {"event_ticker": "KXNFLGAME-25DET", "market_ticker": "KXNFLGAME-25DET-GB", "side": "yes"},
                    {"event_ticker": "KXNBAGAME-25BOS", "market_ticker": "KXNBAGAME-25BOS-NYK", "side": "no"}
                ]
            }
        }"#;

        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        match msg {
            FeedMessage::RfqCreated(rfq) => {
                assert_eq!(rfq.id, "rfq-123");
                assert_eq!(rfq.contracts, 100);
                assert_eq!(rfq.mve_selected_legs.len(), 2);
                assert_eq!(rfq.mve_selected_legs[0].side, Side::Yes);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn decodes_quote_accepted() {
        let json = r#"{
            "type": "quote_accepted",
            "msg": {"quote_id": "q-9", "rfq_id": "rfq-123", "accepted_side": "yes"}
        }"#;

        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        match msg {
            FeedMessage::QuoteAccepted(q) => {
                assert_eq!(q.quote_id, "q-9");
                assert_eq!(q.rfq_id, "rfq-123");
                assert_eq!(q.accepted_side.as_deref(), Some("yes"));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_types_decode_to_unknown() {
        // Unrecognized types carry payloads too; neither shape may fail
        let json = r#"{"type": "orderbook_delta", "msg": {"market_ticker": "T", "yes": [[1, 100]]}}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, FeedMessage::Unknown));

        let json = r#"{"type": "pong"}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, FeedMessage::Unknown));
    }

    #[test]
    fn known_type_with_bad_body_is_an_error() {
        let json = r#"{"type": "rfq_created", "msg": {"contracts": 1}}"#;
        assert!(serde_json::from_str::<FeedMessage>(json).is_err());
    }
}
