use crate::infrastructure::client::feed::types::FeedMessage;
use feedsock::{FeedSockError, MessageRouter, WsMessage};

/// Route keys for the communications feed
///
/// Everything rides one route on purpose: RFQ lifecycle and quote lifecycle
/// events must be processed in the order the venue delivered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedRoute {
    Communications,
}

/// Decodes communications feed frames
pub struct FeedRouter;

impl MessageRouter for FeedRouter {
    type Event = FeedMessage;
    type RouteKey = FeedRoute;

    fn decode(&self, message: WsMessage) -> feedsock::Result<FeedMessage> {
        let text = message
            .as_text()
            .ok_or_else(|| FeedSockError::Decode("non-text frame on feed".into()))?;
        serde_json::from_str(text)
            .map_err(|e| FeedSockError::Decode(format!("{}: {}", e, truncate(text, 200))))
    }

    fn route_key(&self, _event: &FeedMessage) -> FeedRoute {
        FeedRoute::Communications
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_events_share_one_route() {
        let router = FeedRouter;
        let created = router
            .decode(WsMessage::Text(
                r#"{"type":"rfq_created","msg":{"id":"r1"}}"#.into(),
            ))
            .unwrap();
        let deleted = router
            .decode(WsMessage::Text(
                r#"{"type":"rfq_deleted","msg":{"rfq_id":"r1"}}"#.into(),
            ))
            .unwrap();

        assert_eq!(router.route_key(&created), FeedRoute::Communications);
        assert_eq!(router.route_key(&deleted), FeedRoute::Communications);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let router = FeedRouter;
        let err = router
            .decode(WsMessage::Text("{not json".into()))
            .unwrap_err();
        assert!(matches!(err, FeedSockError::Decode(_)));
    }
}
