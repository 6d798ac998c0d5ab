//! Push-based SSE line scanner (spec.md §4.3 preamble). Buffers
//! partial lines across chunk boundaries in a growable buffer that
//! starts at 64 KiB and caps at 2 MiB; exceeding the cap without a
//! blank-line flush is a `stream_parse_error` for that event only —
//! the scanner clears its buffer and resynchronizes at the next blank
//! line, it never panics.

use bytes::BytesMut;

use crate::error::ConversionError;

pub const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
pub const MAX_BUFFER_CAPACITY: usize = 2 * 1024 * 1024;

/// One fully-assembled SSE event: an optional `event:` name and the
/// `\n`-joined payload of every `data:` line up to the terminating
/// blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl RawSseEvent {
    pub fn is_done_sentinel(&self) -> bool {
        self.data == "[DONE]"
    }
}

pub struct SseDecoder {
    buffer: BytesMut,
    pending_event: Option<String>,
    pending_data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pending_event: None,
            pending_data: Vec::new(),
        }
    }

    /// Feeds one chunk of upstream bytes and returns every SSE event
    /// that became complete (terminated by a blank line) as a result.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<RawSseEvent>, ConversionError> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() > MAX_BUFFER_CAPACITY {
            self.buffer.clear();
            self.pending_event = None;
            self.pending_data.clear();
            return Err(ConversionError::stream_parse_error(
                "SSE event exceeded the 2 MiB scanner buffer cap; resynchronizing at next blank line",
            ));
        }

        let mut events = Vec::new();
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let raw_line = self.buffer.split_to(pos + 1);
            let line = strip_newline(&raw_line);

            if line.is_empty() {
                if self.pending_event.is_some() || !self.pending_data.is_empty() {
                    let data = self.pending_data.join("\n");
                    events.push(RawSseEvent {
                        event: self.pending_event.take(),
                        data,
                    });
                    self.pending_data.clear();
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("event:") {
                self.pending_event = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.pending_data.push(rest.trim_start().to_string());
            }
            // Any other field (id:, retry:) carries no translation
            // meaning for this proxy and is ignored.
        }

        Ok(events)
    }
}

fn strip_newline(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event_across_two_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: message_start\ndata: {\"a\":").unwrap().is_empty());
        let events = decoder.push(b"1}\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message_start"));
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn multiple_data_lines_concatenate_with_newline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: line1\ndata: line2\n\n").unwrap();
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn comment_and_blank_prefix_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b":keep-alive\ndata: hi\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hi");
    }

    #[test]
    fn done_sentinel_is_recognized() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: [DONE]\n\n").unwrap();
        assert!(events[0].is_done_sentinel());
    }

    #[test]
    fn exceeding_cap_errors_and_resyncs() {
        let mut decoder = SseDecoder::new();
        let huge = vec![b'a'; MAX_BUFFER_CAPACITY + 1];
        let err = decoder.push(&huge).unwrap_err();
        assert_eq!(err.kind, crate::error::ConversionErrorKind::StreamParseError);
        // scanner has reset and can parse a fresh event afterward
        let events = decoder.push(b"data: hi\n\n").unwrap();
        assert_eq!(events[0].data, "hi");
    }
}
