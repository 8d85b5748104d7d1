//! Minimal HTTP/1.1 framing: one request per connection, `Connection: close`.

use std::collections::HashMap;
use std::io::ErrorKind;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_HEADER_BYTES: usize = 16 * 1024;

const JSON_MIME: &str = "application/json";
const TEXT_MIME: &str = "text/plain; charset=utf-8";
const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
    Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
    Access-Control-Allow-Headers: Content-Type, Accept\r\n";

/// Terminating zero-length chunk.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path without query string.
    pub path: String,
    /// Lowercased names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("connection closed before a request arrived")]
    Closed,
    #[error("malformed request line")]
    BadRequestLine,
    #[error("request headers too large")]
    HeadersTooLarge,
    #[error("invalid content-length")]
    BadContentLength,
    #[error("request body too large")]
    BodyTooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Status to answer with, if the connection is still usable.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Closed | Self::Io(_) => None,
            Self::BodyTooLarge => Some(413),
            Self::HeadersTooLarge => Some(431),
            Self::BadRequestLine | Self::BadContentLength => Some(400),
        }
    }
}

async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut String,
    budget: &mut usize,
) -> Result<usize, RequestError> {
    let limit = u64::try_from(*budget).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader)
        .take(limit)
        .read_line(line)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidData => RequestError::BadRequestLine,
            _ => RequestError::Io(e),
        })?;
    if n > *budget {
        return Err(RequestError::HeadersTooLarge);
    }
    *budget -= n;
    Ok(n)
}

pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Request, RequestError> {
    let mut budget = MAX_HEADER_BYTES;
    let mut request_line = String::new();
    if read_line_capped(reader, &mut request_line, &mut budget).await? == 0 {
        return Err(RequestError::Closed);
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(RequestError::BadRequestLine);
    };
    let method = method.to_ascii_uppercase();
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if read_line_capped(reader, &mut line, &mut budget).await? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, val)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), val.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| RequestError::BadContentLength)?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(RequestError::BodyTooLarge);
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(Request {
        method,
        path,
        headers,
        body,
    })
}

#[must_use]
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Complete response with a JSON body.
#[must_use]
pub fn http_json(status: u16, body: &Value) -> Vec<u8> {
    let body = body.to_string();
    format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {JSON_MIME}\r\n{CORS_HEADERS}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        status_text(status),
        body.len(),
    )
    .into_bytes()
}

#[must_use]
pub fn http_error(status: u16, message: &str) -> Vec<u8> {
    http_json(status, &serde_json::json!({ "error": message }))
}

/// CORS preflight answer.
#[must_use]
pub fn http_no_content() -> Vec<u8> {
    format!(
        "HTTP/1.1 204 {}\r\n{CORS_HEADERS}Access-Control-Max-Age: 86400\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status_text(204),
    )
    .into_bytes()
}

/// Status line and headers for a chunked plain-text body.
#[must_use]
pub fn chunked_text_head(status: u16) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {TEXT_MIME}\r\n{CORS_HEADERS}Transfer-Encoding: chunked\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        status_text(status),
    )
    .into_bytes()
}

/// One chunk. Callers must not pass empty data, which would end the body.
#[must_use]
pub fn chunk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:X}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}
