use thiserror::Error;

/// Failures of the Content-Length framed byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream closed by the server")]
    StreamClosed,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("io error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
                TransportError::StreamClosed
            }
            _ => TransportError::Io(e),
        }
    }
}
