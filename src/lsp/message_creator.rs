use crate::session::DocumentState;
use lsp_types::{
    ClientCapabilities, ClientInfo, CompletionClientCapabilities, CompletionItemCapability,
    CompletionParams, DidChangeTextDocumentParams, DidOpenTextDocumentParams, InitializeParams,
    PartialResultParams, Position, TextDocumentClientCapabilities,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Url, VersionedTextDocumentIdentifier, WorkDoneProgressParams,
};
use serde_json::Value;

use super::types::{Notification, Request, RequestId};

pub struct MessageFactory {
    id: i64,
}

impl MessageFactory {
    pub fn new() -> Self {
        MessageFactory { id: 0 }
    }

    pub fn get_id(&mut self) -> RequestId {
        self.id += 1;
        RequestId::Number(self.id)
    }

    pub fn create_request(&self, id: RequestId, method: &str, params: Value) -> Request {
        Request::new(id, method.to_string(), params)
    }

    pub fn create_notification(&self, method: &str, params: Value) -> Notification {
        Notification::new(method.to_string(), params)
    }
}

// `root_uri` is deprecated in favour of workspace folders but is what most
// servers still read.
#[allow(deprecated)]
pub fn initialize_params(root_uri: Option<&Url>) -> InitializeParams {
    InitializeParams {
        process_id: Some(std::process::id()),
        root_uri: root_uri.cloned(),
        capabilities: ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                completion: Some(CompletionClientCapabilities {
                    dynamic_registration: Some(false),
                    completion_item: Some(CompletionItemCapability {
                        snippet_support: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        client_info: Some(ClientInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
        ..Default::default()
    }
}

pub fn did_open_params(document: &DocumentState) -> DidOpenTextDocumentParams {
    DidOpenTextDocumentParams {
        text_document: TextDocumentItem::new(
            document.uri.clone(),
            document.language_id.clone(),
            document.version,
            document.text.clone(),
        ),
    }
}

/// Full-document replacement: a single change event without a range.
pub fn did_change_params(document: &DocumentState) -> DidChangeTextDocumentParams {
    DidChangeTextDocumentParams {
        text_document: VersionedTextDocumentIdentifier::new(
            document.uri.clone(),
            document.version,
        ),
        content_changes: vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: document.text.clone(),
        }],
    }
}

pub fn completion_params(uri: &Url, position: Position) -> CompletionParams {
    CompletionParams {
        text_document_position: TextDocumentPositionParams {
            text_document: TextDocumentIdentifier::new(uri.clone()),
            position,
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
        context: None,
    }
}
