use crate::lsp::error::TransportError;
use crate::lsp::types::RequestId;
use crate::session::SessionState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected response id {received}{}", expected_suffix(.expected))]
    UnexpectedId {
        expected: Option<RequestId>,
        received: RequestId,
    },

    #[error("server returned error for {method}: code={code}, message={message}")]
    Server {
        method: String,
        code: i64,
        message: String,
    },

    #[error("unexpected result for {method}: {reason}")]
    UnexpectedResult { method: String, reason: String },

    #[error("invalid session transition: {from} -> {to}")]
    InvalidState { from: SessionState, to: SessionState },

    #[error("no document is open")]
    NoOpenDocument,

    #[error("cannot encode params for {method}: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write report: {0}")]
    Report(#[from] std::io::Error),

    #[error("scenario run aborted: {0}")]
    Aborted(String),
}

fn expected_suffix(expected: &Option<RequestId>) -> String {
    match expected {
        Some(id) => format!(" (expected {})", id),
        None => " (no outstanding request has it)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_id_names_both_ids() {
        let err = HarnessError::UnexpectedId {
            expected: Some(RequestId::Number(1)),
            received: RequestId::Number(2),
        };
        assert_eq!(err.to_string(), "unexpected response id 2 (expected 1)");
    }
}
