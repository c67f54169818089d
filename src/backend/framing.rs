//! Incremental decoders for streamed response bodies.
//!
//! Network reads split records at arbitrary byte offsets, including in the
//! middle of a UTF-8 sequence, so both decoders buffer raw bytes and only
//! decode text once a full line is available.

use crate::error::{AppError, Result};

/// Longest line either decoder will hold while waiting for its newline
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

fn check_pending(pending: &[u8]) -> Result<()> {
    if pending.len() > MAX_LINE_BYTES {
        return Err(AppError::MalformedChunk(format!(
            "line exceeds {} bytes without a newline",
            MAX_LINE_BYTES
        )));
    }
    Ok(())
}

/// Splits a byte stream into newline-terminated lines (NDJSON framing)
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every complete, non-blank line
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1])? {
                lines.push(line);
            }
        }
        check_pending(&self.buffer)?;
        Ok(lines)
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Result<Option<String>> {
        let raw = std::mem::take(&mut self.buffer);
        decode_line(&raw)
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| AppError::MalformedChunk(format!("invalid UTF-8 in stream: {}", e)))?;
    let text = text.trim_end_matches('\r').trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}

/// Decoded server-sent event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Payload(String),
    Done,
}

/// Collects `data:` lines into event payloads (server-sent events framing)
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every event completed by a blank line
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseData>> {
        self.lines.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.lines.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.lines.drain(..=pos).collect();
            let line = std::str::from_utf8(&raw[..raw.len() - 1])
                .map_err(|e| AppError::MalformedChunk(format!("invalid UTF-8 in stream: {}", e)))?
                .trim_end_matches('\r')
                .to_string();

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments, `event:`, `id:` and `retry:` fields carry nothing we use.
        }
        check_pending(&self.lines)?;
        Ok(events)
    }

    /// Dispatch an event left open when the body ended without a blank line
    pub fn finish(&mut self) -> Result<Option<SseData>> {
        if !self.lines.is_empty() {
            let mut tail = std::mem::take(&mut self.lines);
            tail.push(b'\n');
            let mut events = self.push(&tail)?;
            if let Some(event) = events.pop() {
                return Ok(Some(event));
            }
        }
        Ok(self.dispatch())
    }

    fn dispatch(&mut self) -> Option<SseData> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload.trim() == "[DONE]" {
            Some(SseData::Done)
        } else {
            Some(SseData::Payload(payload))
        }
    }
}
