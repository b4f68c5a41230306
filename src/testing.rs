//! Scripted in-memory language server speaking the same framing as a real one.
use crate::lsp::error::TransportError;
use crate::lsp::stdio_transport::{read_message_from, write_message_to, StdioTransport};
use crate::lsp::transport::LspTransport;
use crate::lsp::types::{Message, Outcome, Request, Response, ResponseError, JSONRPC_VERSION};
use serde_json::Value;
use tokio::io::{duplex, split};
use tokio::task::JoinHandle;

pub fn result(request: &Request, value: Value) -> Message {
    Response::success(request.id.clone(), value).into()
}

pub fn error(request: &Request, code: i64, message: &str) -> Message {
    Response {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: request.id.clone(),
        outcome: Outcome::Error(ResponseError {
            code,
            message: message.to_string(),
            data: None,
        }),
    }
    .into()
}

/// Spawn a fake server. For every request it receives, `handler` returns the
/// messages to write back, in order. The server stops on `exit` or when the
/// client side is dropped, and yields every message it received.
pub fn spawn_fake_server<F>(mut handler: F) -> (Box<dyn LspTransport>, JoinHandle<Vec<Message>>)
where
    F: FnMut(&Request) -> Vec<Message> + Send + 'static,
{
    let (client, server) = duplex(64 * 1024);
    let (client_read, client_write) = split(client);
    let (mut server_read, mut server_write) = split(server);

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        loop {
            let message = match read_message_from(&mut server_read).await {
                Ok(message) => message,
                Err(TransportError::StreamClosed) => break,
                Err(e) => panic!("fake server failed to read: {}", e),
            };
            received.push(message.clone());

            match message {
                Message::Request(request) => {
                    for reply in handler(&request) {
                        if write_message_to(&mut server_write, &reply).await.is_err() {
                            return received;
                        }
                    }
                }
                Message::Notification(notification) if notification.method == "exit" => break,
                _ => {}
            }
        }
        received
    });

    (
        Box::new(StdioTransport::new(client_read, client_write)),
        handle,
    )
}
