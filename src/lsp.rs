pub mod communicator;
pub mod error;
pub mod message_creator;
pub mod message_parser;
pub mod stdio_transport;
pub mod transport;
pub mod types;

use crate::error::HarnessError;
use crate::lsp::communicator::Communicator;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::{Outcome, Response};
use crate::session::DocumentState;

use lsp_types::{Position, Url};
use serde::Serialize;
use serde_json::{json, Value};

/// The LSP lifecycle verbs the harness needs, one exchange at a time.
pub struct LspClient {
    communicator: Communicator,
}

impl LspClient {
    pub fn new(transport: Box<dyn LspTransport>) -> Self {
        LspClient {
            communicator: Communicator::new(transport),
        }
    }

    async fn exchange<P: Serialize>(
        &mut self,
        method: &str,
        params: P,
    ) -> Result<Response, HarnessError> {
        let id = self.communicator.call(method, params).await?;
        self.communicator.await_response(&id).await
    }

    async fn request<P: Serialize>(&mut self, method: &str, params: P) -> Result<Value, HarnessError> {
        let response = self.exchange(method, params).await?;
        match response.outcome {
            Outcome::Result(result) => Ok(result),
            Outcome::Error(error) => Err(HarnessError::Server {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
        }
    }

    pub async fn initialize(&mut self, root_uri: Option<&Url>) -> Result<Value, HarnessError> {
        let params = message_creator::initialize_params(root_uri);
        self.request("initialize", params).await
    }

    pub async fn initialized(&mut self) -> Result<(), HarnessError> {
        self.communicator.notify("initialized", json!({})).await
    }

    pub async fn did_open(&mut self, document: &DocumentState) -> Result<(), HarnessError> {
        let params = message_creator::did_open_params(document);
        self.communicator
            .notify("textDocument/didOpen", params)
            .await
    }

    pub async fn did_change(&mut self, document: &DocumentState) -> Result<(), HarnessError> {
        let params = message_creator::did_change_params(document);
        self.communicator
            .notify("textDocument/didChange", params)
            .await
    }

    /// Returns the raw response: an error reply is a reportable outcome here,
    /// not a failure.
    pub async fn completion(
        &mut self,
        uri: &Url,
        position: Position,
    ) -> Result<Response, HarnessError> {
        let params = message_creator::completion_params(uri, position);
        self.exchange("textDocument/completion", params).await
    }

    pub async fn shutdown(&mut self) -> Result<Value, HarnessError> {
        let outstanding = self.communicator.pending_count();
        if outstanding > 0 {
            tracing::warn!(outstanding, "shutting down with unanswered requests");
        }
        self.request("shutdown", Value::Null).await
    }

    pub async fn exit(&mut self) -> Result<(), HarnessError> {
        self.communicator.notify("exit", Value::Null).await
    }
}
