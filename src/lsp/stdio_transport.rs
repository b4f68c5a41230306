// low-level stdio transport: framing (Content-Length) and raw read/write
use crate::lsp::error::TransportError;
use crate::lsp::message_parser::parse_message_from_slice;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on the header block; a peer that never sends `\r\n\r\n` is broken.
const MAX_HEADER_LEN: usize = 8 * 1024;
/// Largest body the harness will allocate for.
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// Content-Length framed transport over any reader/writer pair: a child's
/// stdout/stdin in production, an in-memory duplex stream in tests.
pub struct StdioTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        StdioTransport {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

#[async_trait::async_trait]
impl<R, W> LspTransport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        write_message_to(&mut self.writer, message).await
    }

    async fn receive(&mut self) -> Result<Message, TransportError> {
        read_message_from(&mut self.reader).await
    }
}

/// Frame a message and write header and body with a single `write_all`.
pub(crate) async fn write_message_to<W>(
    writer: &mut W,
    message: &Message,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + Send,
{
    let body = serde_json::to_vec(message)
        .map_err(|e| TransportError::MalformedBody(format!("cannot encode message: {}", e)))?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    tracing::debug!(
        kind = message.kind(),
        method = message.method(),
        bytes = body.len(),
        "sent frame"
    );
    Ok(())
}

/// Read a single LSP message from an async reader (Content-Length framing).
pub(crate) async fn read_message_from<R>(reader: &mut R) -> Result<Message, TransportError>
where
    R: AsyncRead + Unpin + Send,
{
    let body = read_frame_from(reader).await?;
    let message = parse_message_from_slice(&body)?;
    tracing::debug!(
        kind = message.kind(),
        id = ?message.id(),
        method = message.method(),
        bytes = body.len(),
        "received frame"
    );
    Ok(message)
}

/// Read the header block and exactly `Content-Length` bytes of body.
pub(crate) async fn read_frame_from<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut header_buffer = Vec::new();

    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).await?;
        header_buffer.push(byte[0]);
        if header_buffer.ends_with(b"\r\n\r\n") {
            break;
        }
        if header_buffer.len() > MAX_HEADER_LEN {
            return Err(TransportError::MalformedHeader(format!(
                "header block exceeds {} bytes",
                MAX_HEADER_LEN
            )));
        }
    }

    let header_str = String::from_utf8(header_buffer)
        .map_err(|_| TransportError::MalformedHeader("header is not valid UTF-8".to_string()))?;
    let content_length = get_content_length_from(&header_str)?;
    if content_length > MAX_BODY_LEN {
        return Err(TransportError::MalformedHeader(format!(
            "Content-Length {} exceeds {} bytes",
            content_length, MAX_BODY_LEN
        )));
    }
    let mut payload_buffer = vec![0u8; content_length];
    reader.read_exact(&mut payload_buffer).await?;

    Ok(payload_buffer)
}

/// Extract Content-Length from a header block. Header names are matched
/// case-insensitively and may appear in any order.
pub(crate) fn get_content_length_from(header: &str) -> Result<usize, TransportError> {
    let mut content_length = None;

    for line in header.split("\r\n").filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            TransportError::MalformedHeader(format!("header line without ':': {:?}", line))
        })?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                TransportError::MalformedHeader(format!(
                    "invalid Content-Length value {:?}",
                    value.trim()
                ))
            })?;
            content_length = Some(parsed);
        }
    }

    content_length
        .ok_or_else(|| TransportError::MalformedHeader("Content-Length header not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::types::{Notification, Outcome, Request, RequestId, Response, ResponseError};
    use serde_json::{json, Value};
    use tokio::io::duplex;

    async fn round_trip(message: Message) -> Message {
        let (mut a, mut b) = duplex(4096);
        write_message_to(&mut a, &message).await.expect("write failed");
        read_message_from(&mut b).await.expect("read failed")
    }

    async fn read_raw(raw: &'static [u8]) -> Result<Message, TransportError> {
        let (mut a, mut b) = duplex(4096);
        let writer = tokio::spawn(async move {
            a.write_all(raw).await.unwrap();
            a.flush().await.unwrap();
            // dropping `a` closes the stream
        });
        let res = read_message_from(&mut b).await;
        writer.await.unwrap();
        res
    }

    #[tokio::test]
    async fn test_round_trip_every_message_shape() {
        let messages: Vec<Message> = vec![
            Request::new(
                RequestId::Number(1),
                "initialize".to_string(),
                json!({"processId": null, "capabilities": {}}),
            )
            .into(),
            Request::new(RequestId::from("srv-7"), "shutdown".to_string(), Value::Null).into(),
            Notification::new(
                "textDocument/didOpen".to_string(),
                json!({"textDocument": {"text": "Процедура Тест()"}}),
            )
            .into(),
            Response::success(RequestId::Number(2), json!([{"label": "Добавить"}])).into(),
            Response::success(RequestId::Number(3), Value::Null).into(),
            Response {
                jsonrpc: "2.0".to_string(),
                id: RequestId::from("x"),
                outcome: Outcome::Error(ResponseError {
                    code: -32603,
                    message: "internal".to_string(),
                    data: Some(json!({"why": "because"})),
                }),
            }
            .into(),
        ];

        for message in messages {
            assert_eq!(round_trip(message.clone()).await, message);
        }
    }

    #[tokio::test]
    async fn test_content_length_counts_utf8_bytes() {
        let (mut a, mut b) = duplex(4096);
        let message: Message = Notification::new("x".to_string(), json!("Сооб")).into();
        write_message_to(&mut a, &message).await.unwrap();
        drop(a);

        let mut raw = Vec::new();
        b.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8(raw).unwrap();
        let (header, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-Length: {}", body.len()));
        assert!(body.len() > body.chars().count());
    }

    #[tokio::test]
    async fn test_header_order_and_case_do_not_matter() {
        let res = read_raw(
            b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: 33\r\n\r\n{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}",
        )
        .await
        .expect("read failed");
        assert_eq!(res.method(), Some("ping"));
    }

    #[tokio::test]
    async fn test_missing_content_length_is_malformed_header() {
        let res = read_raw(b"Content-Type: application/json\r\n\r\n{}").await;
        assert!(matches!(res, Err(TransportError::MalformedHeader(_))));
    }

    #[tokio::test]
    async fn test_read_message_from_malformed_content_length() {
        let res = read_raw(b"Content-Length: abc\r\n\r\n").await;
        assert!(matches!(res, Err(TransportError::MalformedHeader(_))));
    }

    #[tokio::test]
    async fn test_short_body_is_stream_closed() {
        let res = read_raw(b"Content-Length: 100\r\n\r\n{\"jsonrpc\":").await;
        assert!(matches!(res, Err(TransportError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_eof_inside_header_is_stream_closed() {
        let res = read_raw(b"Content-Len").await;
        assert!(matches!(res, Err(TransportError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed_body() {
        let res = read_raw(b"Content-Length: 5\r\n\r\nhello").await;
        assert!(matches!(res, Err(TransportError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_consecutive_frames_are_read_in_order() {
        let (mut a, mut b) = duplex(4096);
        let first: Message = Response::success(RequestId::Number(1), json!(1)).into();
        let second: Message = Response::success(RequestId::Number(2), json!(2)).into();
        write_message_to(&mut a, &first).await.unwrap();
        write_message_to(&mut a, &second).await.unwrap();

        assert_eq!(read_message_from(&mut b).await.unwrap(), first);
        assert_eq!(read_message_from(&mut b).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_oversized_content_length_is_malformed_header() {
        let res = read_raw(b"Content-Length: 18446744073709551615\r\n\r\n{}").await;
        assert!(matches!(res, Err(TransportError::MalformedHeader(_))));

        let res = read_raw(b"Content-Length: 1099511627776\r\n\r\n{}").await;
        assert!(matches!(res, Err(TransportError::MalformedHeader(_))));
    }

    #[tokio::test]
    async fn test_unterminated_header_block_is_malformed_header() {
        let (mut a, mut b) = duplex(16 * 1024);
        let mut raw = b"X-Padding: ".to_vec();
        raw.resize(MAX_HEADER_LEN + 512, b'a');
        a.write_all(&raw).await.unwrap();

        let res = read_message_from(&mut b).await;
        assert!(matches!(res, Err(TransportError::MalformedHeader(_))));
    }

    #[test]
    fn test_header_line_without_colon_is_rejected() {
        let err = get_content_length_from("Content-Length 12\r\n\r\n").unwrap_err();
        assert!(matches!(err, TransportError::MalformedHeader(_)));
    }
}
