//! Fuzz target for the event-frame assembler.
//!
//! This tests that line-oriented framing never panics on arbitrary input
//! and emits exactly one frame per terminating blank line.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stream_sync_engine::FrameAssembler;

fuzz_target!(|data: &[u8]| {
    let mut assembler = FrameAssembler::new();
    let mut frames = 0usize;
    let mut blank_lines = 0usize;

    // A trailing `\n` delimits the last line; it does not start an empty one.
    let mut lines: Vec<&[u8]> = data.split(|&b| b == b'\n').collect();
    if data.is_empty() || data.last() == Some(&b'\n') {
        lines.pop();
    }

    for line in lines {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            blank_lines += 1;
        }
        if assembler.push_line(line).is_some() {
            frames += 1;
        }
    }

    assert_eq!(frames, blank_lines);
});
