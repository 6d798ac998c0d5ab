//! Stream Transducers (spec.md §4.3): stateful SSE-to-SSE converters,
//! one pass, never buffering more than the current event plus
//! per-tool-call argument builders.

pub mod anthropic_to_cc;
pub mod cc_to_anthropic;
pub mod cc_to_responses;
pub mod gemini_to_anthropic;
pub mod gemini_to_cc;
pub mod responses_to_cc;
pub mod sse;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ConversionError, ConversionErrorKind};
use crate::logging::Logger;
pub use sse::{RawSseEvent, SseDecoder};

/// A stateful, synchronous, single-pass SSE-to-SSE converter. Never
/// itself awaits — the only async surface in this module is `drive`.
pub trait Transducer: Send {
    /// Feeds one already-scanned SSE event; returns zero or more
    /// fully-rendered output SSE frames (each ending in `"\n\n"`).
    fn feed(&mut self, event: RawSseEvent) -> Result<Vec<u8>, ConversionError>;

    /// Upstream ended (EOF, or `[DONE]`/`message_stop` already consumed
    /// by `feed`); emits whatever terminal frames are still owed so the
    /// client observes a well-formed stream (spec.md §7).
    fn finish(&mut self) -> Vec<u8>;
}

/// Reads upstream SSE chunks, scans them into events, feeds each event
/// through `transducer`, and writes+flushes the result immediately —
/// no additional buffering layer (spec.md §5, §9). Only a client write
/// failure aborts the drive; scanner and per-event translation errors
/// are best-effort: logged and skipped.
pub async fn drive<T, S, W>(
    mut input: S,
    transducer: &mut T,
    out: &mut W,
    logger: Option<&dyn Logger>,
) -> Result<(), ConversionError>
where
    T: Transducer,
    S: Stream<Item = Result<Bytes, ConversionError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = input.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(err) => {
                if let Some(logger) = logger {
                    logger.error(&format!("upstream read error: {err}"));
                }
                continue;
            }
        };

        let events = match decoder.push(&chunk) {
            Ok(events) => events,
            Err(err) => {
                if let Some(logger) = logger {
                    logger.error(&format!("SSE scan error: {err}"));
                }
                continue;
            }
        };

        for event in events {
            let frame = match transducer.feed(event) {
                Ok(frame) => frame,
                Err(err) => {
                    if let Some(logger) = logger {
                        logger.error(&format!("transducer feed error: {err}"));
                    }
                    continue;
                }
            };
            write_frame(out, &frame).await?;
        }
    }

    let trailing = transducer.finish();
    write_frame(out, &trailing).await?;
    Ok(())
}

async fn write_frame<W: AsyncWrite + Unpin>(out: &mut W, frame: &[u8]) -> Result<(), ConversionError> {
    if frame.is_empty() {
        return Ok(());
    }
    out.write_all(frame)
        .await
        .map_err(|e| ConversionError::with_cause(ConversionErrorKind::MarshalError, "client write failed", e))?;
    out.flush()
        .await
        .map_err(|e| ConversionError::with_cause(ConversionErrorKind::MarshalError, "client flush failed", e))
}

/// Formats one SSE frame: an optional `event:` line plus a `data:`
/// line carrying `json`, terminated by a blank line.
pub(crate) fn sse_frame(event: Option<&str>, json: &serde_json::Value) -> Vec<u8> {
    let mut out = String::new();
    if let Some(event) = event {
        out.push_str("event: ");
        out.push_str(event);
        out.push('\n');
    }
    out.push_str("data: ");
    out.push_str(&json.to_string());
    out.push_str("\n\n");
    out.into_bytes()
}

pub(crate) fn done_frame() -> Vec<u8> {
    b"data: [DONE]\n\n".to_vec()
}
