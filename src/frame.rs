// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Line-oriented event framing.
//!
//! Turns a byte stream of blank-line-delimited blocks into discrete
//! [`Frame`]s. One block looks like:
//!
//! ```text
//! event: update
//! id: 8f3c
//! data: {"name": "one"}
//! data: {"more": true}
//!
//! ```
//!
//! # Parsing Rules
//!
//! Line by line, in order:
//!
//! - a line beginning with `:` is a comment and is discarded;
//! - `event: <name>` sets the frame's event type (last write wins);
//! - `data: <bytes>` appends to the payload; multiple `data:` lines are
//!   joined with a single `\n`, in order;
//! - an empty line finalizes the payload and emits the frame;
//! - any other line containing `: ` is a `key: value` param (last write
//!   wins for duplicate keys);
//! - anything else is ignored for forward compatibility.
//!
//! End of input with no pending blank line is a clean end of stream; a
//! partial, unterminated frame at EOF is discarded, never emitted.
//!
//! The split between [`FrameAssembler`] (synchronous, one line at a time)
//! and [`FrameReader`] (drives the assembler from an async reader) keeps
//! the parsing logic runtime-free so it can be exercised directly by unit,
//! property, and fuzz tests.

use crate::error::{Result, StreamError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// One parsed unit of the event framing.
///
/// Immutable once emitted. The payload is opaque bytes; callers decode it
/// through [`decode_value()`](Self::decode_value) or
/// [`decode_list()`](Self::decode_list) with their own element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event type from the `event: ` line (empty if none was present).
    pub event_type: String,
    /// `key: value` params. Insertion order is irrelevant.
    pub params: HashMap<String, String>,
    /// Joined payload from the `data: ` lines.
    pub data: Vec<u8>,
}

impl Frame {
    /// Get a param by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Read an integer position param (`new-position` / `old-position`).
    ///
    /// A missing or non-numeric value is a decode error; range checking
    /// against the tracked collection happens at the point of use.
    pub fn position(&self, name: &str) -> Result<usize> {
        let raw = self
            .param(name)
            .ok_or_else(|| StreamError::Decode(format!("missing {} param", name)))?;
        raw.parse()
            .map_err(|_| StreamError::Decode(format!("non-integer {} param: {:?}", name, raw)))
    }

    /// Decode the payload as a single element.
    pub fn decode_value<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Decode the payload as a sequence of elements.
    pub fn decode_list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

/// Accumulates lines into frames.
///
/// Holds no state across frames except the block currently being built.
/// Feed it stripped lines (no trailing `\n` / `\r\n`) via
/// [`push_line()`](Self::push_line); it returns a [`Frame`] whenever a
/// blank line terminates the current block.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    event_type: String,
    params: HashMap<String, String>,
    data: Vec<Vec<u8>>,
}

impl FrameAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line; returns a frame if this line terminated a block.
    pub fn push_line(&mut self, line: &[u8]) -> Option<Frame> {
        if line.is_empty() {
            return Some(self.finish());
        }

        if line.starts_with(b":") {
            return None;
        }

        if let Some(rest) = line.strip_prefix(b"event: ") {
            self.event_type = String::from_utf8_lossy(rest).into_owned();
            return None;
        }

        if let Some(rest) = line.strip_prefix(b"data: ") {
            self.data.push(rest.to_vec());
            return None;
        }

        // Generic `key: value` param. Params are text; non-UTF-8 bytes are
        // replaced rather than failing the whole stream.
        let text = String::from_utf8_lossy(line);
        if let Some((key, value)) = text.split_once(": ") {
            self.params.insert(key.to_string(), value.to_string());
        }

        None
    }

    fn finish(&mut self) -> Frame {
        let data = std::mem::take(&mut self.data).join(&b'\n');
        Frame {
            event_type: std::mem::take(&mut self.event_type),
            params: std::mem::take(&mut self.params),
            data,
        }
    }
}

/// Reads frames from an async byte stream.
///
/// Lazy and restartable per session: a new connection attempt gets a new
/// reader. Not restartable mid-session; once it returns `Ok(None)` or an
/// error, the session is over.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    assembler: FrameAssembler,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a byte stream positioned at the start of the event framing.
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            line: Vec::new(),
            assembler: FrameAssembler::new(),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream. A partial frame pending
    /// at EOF is discarded.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }

            strip_line_ending(&mut self.line);
            if let Some(frame) = self.assembler.push_line(&self.line) {
                return Ok(Some(frame));
            }
        }
    }
}

fn strip_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_all(input: &[u8]) -> Vec<Frame> {
        let mut assembler = FrameAssembler::new();
        let mut frames = Vec::new();
        // A trailing `\n` delimits the last line; it does not start an
        // empty one.
        let mut lines: Vec<&[u8]> = input.split(|&b| b == b'\n').collect();
        if input.is_empty() || input.last() == Some(&b'\n') {
            lines.pop();
        }
        for line in lines {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if let Some(frame) = assembler.push_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let frames = parse_all(b"event: update\ndata: {\"a\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "update");
        assert_eq!(frames[0].data, b"{\"a\":1}");
    }

    #[test]
    fn test_multiple_data_lines_joined() {
        let frames = parse_all(b"event: initial\ndata: one\ndata: two\ndata: three\n\n");
        assert_eq!(frames[0].data, b"one\ntwo\nthree");
    }

    #[test]
    fn test_comment_lines_discarded() {
        let frames = parse_all(b": keepalive\nevent: heartbeat\n: another comment\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "heartbeat");
        assert!(frames[0].params.is_empty());
    }

    #[test]
    fn test_params_last_write_wins() {
        let frames = parse_all(b"event: sync\nid: first\nid: second\n\n");
        assert_eq!(frames[0].param("id"), Some("second"));
    }

    #[test]
    fn test_event_type_overwritten() {
        let frames = parse_all(b"event: add\nevent: remove\n\n");
        assert_eq!(frames[0].event_type, "remove");
    }

    #[test]
    fn test_params_parsed() {
        let frames = parse_all(b"event: add\nnew-position: 3\nold-position: 1\n\n");
        assert_eq!(frames[0].param("new-position"), Some("3"));
        assert_eq!(frames[0].param("old-position"), Some("1"));
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let frames = parse_all(b"garbage without separator\nevent: update\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "update");
        assert!(frames[0].params.is_empty());
    }

    #[test]
    fn test_empty_frame_emitted_on_blank_line() {
        // A lone blank line still terminates a (contentless) block.
        let frames = parse_all(b"\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "");
        assert!(frames[0].data.is_empty());
    }

    #[test]
    fn test_partial_frame_discarded() {
        // No terminating blank line: nothing is emitted.
        let frames = parse_all(b"event: update\ndata: pending");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_no_state_across_frames() {
        let frames = parse_all(b"event: add\nnew-position: 0\ndata: x\n\nevent: sync\nid: t\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].event_type, "sync");
        assert!(frames[1].param("new-position").is_none());
        assert!(frames[1].data.is_empty());
    }

    #[test]
    fn test_position_param() {
        let frames = parse_all(b"event: add\nnew-position: 42\n\n");
        assert_eq!(frames[0].position("new-position").unwrap(), 42);
    }

    #[test]
    fn test_position_param_missing() {
        let frames = parse_all(b"event: add\n\n");
        let err = frames[0].position("new-position").unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)));
    }

    #[test]
    fn test_position_param_non_integer() {
        let frames = parse_all(b"event: add\nnew-position: abc\n\n");
        let err = frames[0].position("new-position").unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_position_param_negative() {
        let frames = parse_all(b"event: remove\nold-position: -1\n\n");
        assert!(frames[0].position("old-position").is_err());
    }

    #[test]
    fn test_decode_value() {
        let frames = parse_all(b"event: update\ndata: {\"name\":\"a\"}\n\n");
        let value: serde_json::Value = frames[0].decode_value().unwrap();
        assert_eq!(value["name"], "a");
    }

    #[test]
    fn test_decode_value_invalid_json() {
        let frames = parse_all(b"event: update\ndata: nope\n\n");
        let result: Result<serde_json::Value> = frames[0].decode_value();
        assert!(matches!(result, Err(StreamError::Decode(_))));
    }

    #[test]
    fn test_decode_list() {
        let frames = parse_all(b"event: list\ndata: [\"a\",\"b\"]\n\n");
        let list: Vec<String> = frames[0].decode_list().unwrap();
        assert_eq!(list, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_reader_yields_frames_in_order() {
        let input = b"event: initial\ndata: 1\n\nevent: update\ndata: 2\n\n".to_vec();
        let mut reader = FrameReader::new(Cursor::new(input));

        let first = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(first.event_type, "initial");
        assert_eq!(first.data, b"1");

        let second = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(second.event_type, "update");
        assert_eq!(second.data, b"2");

        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_crlf_lines() {
        let input = b"event: update\r\ndata: x\r\n\r\n".to_vec();
        let mut reader = FrameReader::new(Cursor::new(input));
        let frame = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.event_type, "update");
        assert_eq!(frame.data, b"x");
    }

    #[tokio::test]
    async fn test_reader_eof_discards_partial() {
        let input = b"event: update\ndata: half".to_vec();
        let mut reader = FrameReader::new(Cursor::new(input));
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_empty_input() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        assert!(reader.next_frame().await.unwrap().is_none());
    }
}
