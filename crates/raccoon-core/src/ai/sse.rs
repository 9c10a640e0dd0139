//! Minimal `text/event-stream` framer.
//!
//! Buffers raw bytes off the wire and yields complete `data: ...` JSON
//! frames, tolerating frames split across chunk boundaries the way a TCP
//! read can split them anywhere. A `[DONE]` sentinel (used by the
//! choice-delta vendor) is surfaced as `None` rather than an error so the
//! caller can distinguish "stream ended cleanly" from "chunk had no frame".

use bytes::Bytes;
use serde_json::Value;

#[derive(Default)]
pub struct SseFramer {
    buffer: String,
}

pub enum Frame {
    Event(Value),
    Done,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every complete frame it completes.
    /// Malformed JSON in a `data:` line is dropped with the byte offset
    /// logged by the caller; it never poisons the buffer for subsequent
    /// frames.
    pub fn push(&mut self, chunk: Bytes) -> Vec<Frame> {
        self.buffer.push_str(&String::from_utf8_lossy(&chunk));

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=pos);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                frames.push(Frame::Done);
                continue;
            }
            match serde_json::from_str::<Value>(data) {
                Ok(value) => frames.push(Frame::Event(value)),
                Err(e) => {
                    let preview: String = data.chars().take(200).collect();
                    tracing::warn!(error = %e, preview = %preview, "malformed SSE JSON frame");
                }
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_split_across_chunks_reassembles() {
        let mut framer = SseFramer::new();
        let first = framer.push(Bytes::from_static(b"data: {\"a\":"));
        assert!(first.is_empty());
        let second = framer.push(Bytes::from_static(b"1}\n\n"));
        assert_eq!(second.len(), 1);
        assert!(matches!(&second[0], Frame::Event(v) if v["a"] == 1));
    }

    #[test]
    fn done_sentinel_is_distinguished_from_an_event() {
        let mut framer = SseFramer::new();
        let frames = framer.push(Bytes::from_static(b"data: [DONE]\n"));
        assert!(matches!(frames.as_slice(), [Frame::Done]));
    }

    #[test]
    fn malformed_json_is_dropped_not_fatal() {
        let mut framer = SseFramer::new();
        let frames = framer.push(Bytes::from_static(b"data: {not json}\ndata: {\"ok\":true}\n"));
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::Event(v) if v["ok"] == true));
    }
}
