//! Fuzz target for frame param and payload decoding.
//!
//! Decoding arbitrary param values and payload bytes must return errors,
//! never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stream_sync_engine::FrameAssembler;

fuzz_target!(|data: (&str, &[u8])| {
    let (param, payload) = data;

    let mut assembler = FrameAssembler::new();
    assembler.push_line(b"event: add");
    assembler.push_line(format!("new-position: {}", param).as_bytes());
    for line in payload.split(|&b| b == b'\n') {
        let mut data_line = b"data: ".to_vec();
        data_line.extend_from_slice(line);
        assembler.push_line(&data_line);
    }

    if let Some(frame) = assembler.push_line(b"") {
        let _ = frame.position("new-position");
        let _ = frame.position("old-position");
        let _ = frame.decode_value::<serde_json::Value>();
        let _ = frame.decode_list::<serde_json::Value>();
    }
});
