use crate::error::HarnessError;
use crate::lsp::message_creator::MessageFactory;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::{Message, RequestId, Response};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// A request that has been sent and whose response has not been read yet.
#[derive(Debug)]
pub struct PendingCall {
    pub method: String,
    pub sent_at: Instant,
}

/// Request/response correlation on top of a framed transport.
pub struct Communicator {
    transport: Box<dyn LspTransport>,
    factory: MessageFactory,
    pending: HashMap<RequestId, PendingCall>,
    // responses that arrived while a different id was being awaited
    completed: HashMap<RequestId, Response>,
}

fn encode<P: Serialize>(method: &str, params: P) -> Result<Value, HarnessError> {
    serde_json::to_value(params).map_err(|source| HarnessError::Encode {
        method: method.to_string(),
        source,
    })
}

impl Communicator {
    pub fn new(transport: Box<dyn LspTransport>) -> Self {
        Communicator {
            transport,
            factory: MessageFactory::new(),
            pending: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_request_id(&mut self) -> RequestId {
        loop {
            let id = self.factory.get_id();
            if !self.pending.contains_key(&id) && !self.completed.contains_key(&id) {
                return id;
            }
        }
    }

    /// Send a request and register it as pending. Does not wait for the reply.
    pub async fn call<P: Serialize>(
        &mut self,
        method: &str,
        params: P,
    ) -> Result<RequestId, HarnessError> {
        let params = encode(method, params)?;
        let id = self.next_request_id();
        let request = self.factory.create_request(id.clone(), method, params);

        self.pending.insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                sent_at: Instant::now(),
            },
        );
        if let Err(e) = self.transport.send(&Message::Request(request)).await {
            self.pending.remove(&id);
            return Err(e.into());
        }

        tracing::debug!(id = %id, method, "request sent");
        Ok(id)
    }

    /// Send a notification. Nothing is registered and no reply must be read.
    pub async fn notify<P: Serialize>(&mut self, method: &str, params: P) -> Result<(), HarnessError> {
        let params = encode(method, params)?;
        let notification = self.factory.create_notification(method, params);
        self.transport
            .send(&Message::Notification(notification))
            .await?;
        tracing::debug!(method, "notification sent");
        Ok(())
    }

    /// Answer a request initiated by the server.
    pub async fn respond(&mut self, id: RequestId, result: Value) -> Result<(), HarnessError> {
        let response = Response::success(id, result);
        self.transport.send(&Message::Response(response)).await?;
        Ok(())
    }

    /// Read exactly one message and return it as is. A response to a pending
    /// call releases it; matching ids is up to the caller.
    pub async fn await_reply(&mut self) -> Result<Message, HarnessError> {
        let (message, _) = self.receive_tracked().await?;
        Ok(message)
    }

    /// One receive, also telling whether it resolved a pending call.
    async fn receive_tracked(&mut self) -> Result<(Message, bool), HarnessError> {
        let message = self.transport.receive().await?;

        let mut resolved = false;
        if let Message::Response(response) = &message {
            if let Some(call) = self.pending.remove(&response.id) {
                tracing::debug!(
                    id = %response.id,
                    method = %call.method,
                    elapsed_ms = call.sent_at.elapsed().as_millis() as u64,
                    "pending call resolved"
                );
                resolved = true;
            }
        }

        Ok((message, resolved))
    }

    /// One-at-a-time correlation: the next message must not be a response to
    /// anything but `id`. Notifications and server requests are returned as is.
    pub async fn expect_reply(&mut self, id: &RequestId) -> Result<Message, HarnessError> {
        let message = self.await_reply().await?;
        if let Message::Response(response) = &message {
            if &response.id != id {
                return Err(HarnessError::UnexpectedId {
                    expected: Some(id.clone()),
                    received: response.id.clone(),
                });
            }
        }
        Ok(message)
    }

    /// Wait for the response to `id`. Responses to other outstanding calls are
    /// kept until asked for, notifications are skipped and requests from the
    /// server get a `null` result.
    pub async fn await_response(&mut self, id: &RequestId) -> Result<Response, HarnessError> {
        if let Some(response) = self.completed.remove(id) {
            return Ok(response);
        }
        if !self.is_pending(id) {
            return Err(HarnessError::UnexpectedId {
                expected: None,
                received: id.clone(),
            });
        }

        loop {
            match self.receive_tracked().await? {
                (Message::Response(response), _) if &response.id == id => return Ok(response),
                (Message::Response(response), true) => {
                    tracing::debug!(id = %response.id, waiting_for = %id, "buffered out-of-order response");
                    self.completed.insert(response.id.clone(), response);
                }
                (Message::Response(response), false) => {
                    return Err(HarnessError::UnexpectedId {
                        expected: Some(id.clone()),
                        received: response.id,
                    })
                }
                (Message::Notification(notification), _) => {
                    tracing::debug!(method = %notification.method, "skipped server notification");
                }
                (Message::Request(request), _) => {
                    tracing::warn!(
                        id = %request.id,
                        method = %request.method,
                        "answering server request with null"
                    );
                    self.respond(request.id, Value::Null).await?;
                }
            }
        }
    }
}
