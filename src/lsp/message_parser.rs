use crate::lsp::error::TransportError;
use crate::lsp::types::{
    Message, Notification, Outcome, Request, RequestId, Response, ResponseError, JSONRPC_VERSION,
};
use serde_json::{Map, Value};

fn malformed(reason: impl Into<String>) -> TransportError {
    TransportError::MalformedBody(reason.into())
}

fn parse_id(value: &Value) -> Result<RequestId, TransportError> {
    serde_json::from_value(value.clone())
        .map_err(|_| malformed(format!("id must be a string or integer, got {}", value)))
}

pub fn parse_notification(
    object: &Map<String, Value>,
) -> Result<Option<Notification>, TransportError> {
    if object.get("method").is_none() || object.contains_key("id") {
        return Ok(None);
    }
    let notification: Notification = serde_json::from_value(Value::Object(object.clone()))
        .map_err(|e| malformed(format!("invalid notification: {}", e)))?;
    Ok(Some(notification))
}

pub fn parse_request(object: &Map<String, Value>) -> Result<Option<Request>, TransportError> {
    if object.get("method").is_none() || !object.contains_key("id") {
        return Ok(None);
    }
    let request: Request = serde_json::from_value(Value::Object(object.clone()))
        .map_err(|e| malformed(format!("invalid request: {}", e)))?;
    Ok(Some(request))
}

pub fn parse_response(object: &Map<String, Value>) -> Result<Option<Response>, TransportError> {
    let Some(id) = object.get("id") else {
        return Ok(None);
    };
    if object.contains_key("method") {
        return Ok(None);
    }

    let outcome = match (object.get("result"), object.get("error")) {
        (Some(result), None) => Outcome::Result(result.clone()),
        (None, Some(error)) => {
            let error: ResponseError = serde_json::from_value(error.clone())
                .map_err(|e| malformed(format!("invalid error object: {}", e)))?;
            Outcome::Error(error)
        }
        (Some(_), Some(_)) => return Err(malformed("response carries both result and error")),
        (None, None) => return Err(malformed("response carries neither result nor error")),
    };

    Ok(Some(Response {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: parse_id(id)?,
        outcome,
    }))
}

pub fn parse_message(json: Value) -> Result<Message, TransportError> {
    let Value::Object(object) = json else {
        return Err(malformed("message is not a JSON object"));
    };

    match object.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => return Err(malformed(format!("unsupported jsonrpc version {:?}", other))),
        None => return Err(malformed("missing jsonrpc version")),
    }

    if let Some(request) = parse_request(&object)? {
        return Ok(Message::Request(request));
    }
    if let Some(notification) = parse_notification(&object)? {
        return Ok(Message::Notification(notification));
    }
    if let Some(response) = parse_response(&object)? {
        return Ok(Message::Response(response));
    }
    Err(malformed("message has neither method nor id"))
}

/// Parse a full JSON payload (bytes) into a `Message`.
pub fn parse_message_from_slice(s: &[u8]) -> Result<Message, TransportError> {
    let json: Value =
        serde_json::from_slice(s).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    parse_message(json)
}
