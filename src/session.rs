use crate::error::HarnessError;
use lsp_types::Url;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::ShuttingDown => "shutting down",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Editor-side view of the single open document. The harness is the only writer.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    pub uri: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl DocumentState {
    pub fn open(uri: Url, language_id: String, text: String) -> Self {
        DocumentState {
            uri,
            language_id,
            version: 1,
            text,
        }
    }

    pub fn replace_text(&mut self, text: &str) {
        self.version += 1;
        self.text = text.to_string();
    }
}

/// Lifecycle of one connection to a server, passed explicitly through the driver.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    document: Option<DocumentState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SessionState::Uninitialized,
            document: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> Option<&DocumentState> {
        self.document.as_ref()
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<(), HarnessError> {
        if self.state != from {
            return Err(HarnessError::InvalidState {
                from: self.state,
                to,
            });
        }
        tracing::info!(from = %self.state, to = %to, "session transition");
        self.state = to;
        Ok(())
    }

    pub fn begin_initialize(&mut self) -> Result<(), HarnessError> {
        self.transition(SessionState::Uninitialized, SessionState::Initializing)
    }

    pub fn mark_ready(&mut self) -> Result<(), HarnessError> {
        self.transition(SessionState::Initializing, SessionState::Ready)
    }

    pub fn begin_shutdown(&mut self) -> Result<(), HarnessError> {
        self.transition(SessionState::Ready, SessionState::ShuttingDown)
    }

    pub fn close(&mut self) -> Result<(), HarnessError> {
        self.transition(SessionState::ShuttingDown, SessionState::Closed)?;
        self.document = None;
        Ok(())
    }

    pub fn open_document(&mut self, document: DocumentState) -> Result<&DocumentState, HarnessError> {
        if self.state != SessionState::Ready {
            return Err(HarnessError::InvalidState {
                from: self.state,
                to: SessionState::Ready,
            });
        }
        Ok(self.document.insert(document))
    }

    pub fn change_document(&mut self, text: &str) -> Result<&DocumentState, HarnessError> {
        let document = self.document.as_mut().ok_or(HarnessError::NoOpenDocument)?;
        document.replace_text(text);
        Ok(document)
    }
}
