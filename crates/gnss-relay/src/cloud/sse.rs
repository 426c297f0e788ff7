// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; complete lines are consumed and frames
//! are emitted on each blank line:
//!
//! ```text
//! :ok                          <- comment, ignored
//! event: GNSS/Bat              <- frame name
//! data: {"data":"87",...}      <- payload (multiple data lines join with '\n')
//!                              <- dispatch
//! ```
//!
//! See: <https://html.spec.whatwg.org/multipage/server-sent-events.html>

use thiserror::Error;

/// Longest line held while waiting for its terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Decoder failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SseError {
    #[error("SSE line exceeds {limit} bytes without a line terminator")]
    LineTooLong { limit: usize },
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, if present.
    pub event: Option<String>,
    /// Concatenated `data:` lines.
    pub data: String,
    /// `id:` field, if present.
    pub id: Option<String>,
}

/// Stateful decoder; feed it chunks with [`SseDecoder::push`].
#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that gives up on lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Consume a chunk and return every frame it completes.
    ///
    /// Lines may end in `\n` or `\r\n`. A partial trailing line is kept
    /// until the next chunk, up to the line limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, SseError> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.buf.len() > self.max_line {
            self.buf.clear();
            return Err(SseError::LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(frames)
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields carry nothing the relay uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event,
            data,
            id: self.id.clone(),
        })
    }
}
