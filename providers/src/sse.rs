//! Server-sent event framing for the backend stream.

use thiserror::Error;

/// Unparsed bytes allowed to pile up before the stream is abandoned.
pub const MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("SSE buffer exceeded maximum size (4 MiB)")]
    Overflow,
    #[error("Received invalid UTF-8 from SSE stream")]
    InvalidUtf8,
}

/// Collects raw body bytes and hands out the `data` payload of each complete
/// event, in order.
#[derive(Debug, Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
}

impl SseFramer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<(), FramingError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_BUFFER_BYTES {
            return Err(FramingError::Overflow);
        }
        Ok(())
    }

    /// Data of the next complete event. Events without a `data:` line are
    /// skipped; an incomplete tail stays buffered.
    pub fn next_data(&mut self) -> Option<Result<String, FramingError>> {
        loop {
            let (end, delimiter) = event_end(&self.buffer)?;
            let event: Vec<u8> = self.buffer.drain(..end + delimiter).take(end).collect();
            let Ok(event) = String::from_utf8(event) else {
                return Some(Err(FramingError::InvalidUtf8));
            };
            if let Some(data) = data_field(&event) {
                return Some(Ok(data));
            }
        }
    }
}

/// Offset and length of the first blank-line delimiter (`\n\n` or `\r\n\r\n`).
fn event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

/// Multiple `data:` lines join with `\n`.
fn data_field(event: &str) -> Option<String> {
    let mut lines = event
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest));

    let first = lines.next()?;
    Some(lines.fold(first.to_string(), |mut data, line| {
        data.push('\n');
        data.push_str(line);
        data
    }))
}

#[cfg(test)]
mod tests {
    use super::{FramingError, MAX_BUFFER_BYTES, SseFramer, data_field, event_end};

    fn drain(framer: &mut SseFramer) -> Vec<String> {
        std::iter::from_fn(|| framer.next_data())
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn delimiter_is_earliest_blank_line() {
        assert_eq!(event_end(b"data: a\n\ndata: b"), Some((7, 2)));
        assert_eq!(event_end(b"data: a\r\n\r\ndata: b\n\n"), Some((7, 4)));
        assert_eq!(event_end(b"data: a\n"), None);
        assert_eq!(event_end(b""), None);
    }

    #[test]
    fn events_split_across_pushes() {
        let mut framer = SseFramer::new();
        framer.push(b"data: {\"a\":").unwrap();
        assert!(framer.next_data().is_none());
        framer.push(b"1}\r\n\r\ndata: two\n\ndata: tail").unwrap();
        assert_eq!(drain(&mut framer), ["{\"a\":1}", "two"]);

        framer.push(b"\n\n").unwrap();
        assert_eq!(drain(&mut framer), ["tail"]);
    }

    #[test]
    fn events_without_data_are_skipped() {
        let mut framer = SseFramer::new();
        framer.push(b": keep-alive\n\nevent: ping\n\ndata: real\n\n").unwrap();
        assert_eq!(drain(&mut framer), ["real"]);
    }

    #[test]
    fn data_lines_join() {
        assert_eq!(
            data_field("event: message\ndata: line1\r\ndata:line2\nid: 7").as_deref(),
            Some("line1\nline2")
        );
        assert_eq!(data_field("data: ").as_deref(), Some(""));
        assert_eq!(data_field("retry: 1000"), None);
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut framer = SseFramer::new();
        framer.push(b"data: \xff\xfe\n\n").unwrap();
        assert_eq!(framer.next_data(), Some(Err(FramingError::InvalidUtf8)));
    }

    #[test]
    fn oversized_buffer_overflows() {
        let mut framer = SseFramer::new();
        let big = vec![b'x'; MAX_BUFFER_BYTES + 1];
        assert_eq!(framer.push(&big), Err(FramingError::Overflow));
    }
}
