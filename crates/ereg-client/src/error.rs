// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use thiserror::Error;

/// Failures talking to the accounts service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport failure: refused connection, DNS, timeout.
    #[error("cannot reach {base_url} -- check [server].base_url or EREG_BASE_URL ({detail})")]
    Unreachable { base_url: String, detail: String },

    #[error("rejected by server ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Usually a row deleted elsewhere; a refresh clears it.
    #[error("not found: {message} -- press r to refresh")]
    NotFound { message: String },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("build HTTP client: {0}")]
    Setup(String),
}

impl ClientError {
    /// Maps a non-success response to the matching variant.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        match status {
            400 | 422 => Self::Validation { status, message },
            404 => Self::NotFound { message },
            _ => Self::Server { status, message },
        }
    }
}

/// Pulls a human message out of FastAPI `detail` bodies, DRF field maps, or
/// short plain-text bodies.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(parsed) = serde_json::from_str::<Value>(trimmed) else {
        if trimmed.len() < 100 && !trimmed.contains('<') {
            return Some(trimmed.to_owned());
        }
        return None;
    };

    if let Some(detail) = parsed.get("detail") {
        match detail {
            Value::String(text) if !text.is_empty() => return Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<String> = items.iter().filter_map(detail_item).collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    let Value::Object(fields) = &parsed else {
        return None;
    };
    let messages: Vec<String> = fields
        .iter()
        .filter_map(|(field, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => return None,
            };
            (!text.is_empty()).then(|| format!("{field}: {text}"))
        })
        .collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

fn detail_item(item: &Value) -> Option<String> {
    let message = item.get("msg")?.as_str()?;
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .and_then(Value::as_str);
    Some(match field {
        Some(field) => format!("{field}: {message}"),
        None => message.to_owned(),
    })
}
