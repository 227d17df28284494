/// A WebSocket message payload
///
/// Control frames (ping/pong/close) are handled inside the session loop and
/// never surface through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Protocol-level ping frame (outbound heartbeats)
    Ping(Vec<u8>),
}

impl WsMessage {
    /// View the payload as text, if it is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(text) => Some(text),
            WsMessage::Binary(_) | WsMessage::Ping(_) => None,
        }
    }
}
