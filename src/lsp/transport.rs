//! LSP transport abstraction (framed Content-Length messages).
use crate::lsp::error::TransportError;
use crate::lsp::types::Message;
use async_trait::async_trait;

/// Minimal async trait for LSP transport.
/// - `send` serializes a message, frames it (Content-Length) and writes it out.
/// - `receive` blocks until one complete framed message has been read and decoded.
#[async_trait]
pub trait LspTransport: Send {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;
    async fn receive(&mut self) -> Result<Message, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::LspTransport;
    use crate::lsp::error::TransportError;
    use crate::lsp::stdio_transport::StdioTransport;
    use crate::lsp::types::{Message, Notification, RequestId, Response};
    use serde_json::json;
    use tokio::io::{duplex, split};

    fn boxed_pair() -> (Box<dyn LspTransport>, Box<dyn LspTransport>) {
        let (a, b) = duplex(1024);
        let (a_read, a_write) = split(a);
        let (b_read, b_write) = split(b);
        (
            Box::new(StdioTransport::new(a_read, a_write)),
            Box::new(StdioTransport::new(b_read, b_write)),
        )
    }

    #[tokio::test]
    async fn test_boxed_transports_exchange_messages() {
        let (mut client, mut server) = boxed_pair();

        let notification: Message =
            Notification::new("initialized".to_string(), json!({})).into();
        client.send(&notification).await.expect("send failed");
        assert_eq!(server.receive().await.expect("receive failed"), notification);

        let response: Message = Response::success(RequestId::Number(1), json!({"ok": true})).into();
        server.send(&response).await.expect("send failed");
        assert_eq!(client.receive().await.expect("receive failed"), response);
    }

    #[tokio::test]
    async fn test_receive_after_peer_dropped_is_stream_closed() {
        let (mut client, server) = boxed_pair();
        drop(server);

        let err = client.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::StreamClosed));
    }
}
