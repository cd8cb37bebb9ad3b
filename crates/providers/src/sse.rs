//! Incremental Server-Sent Events decoder.
//!
//! Network reads split records at arbitrary byte offsets, including in the
//! middle of a multi-byte UTF-8 sequence. The decoder keeps the unfinished
//! tail between calls and only hands out complete `data:` records.

/// One decoded SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseRecord {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Buffers raw bytes and yields complete records.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed the next chunk of bytes; returns every record completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseRecord> {
        self.buffer.extend_from_slice(bytes);

        let mut records = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(record) = decode_line(&line[..line.len() - 1]) {
                records.push(record);
            }
        }
        records
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseRecord> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }

    /// Bytes waiting for the rest of their line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<SseRecord> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    // Skip empty lines, SSE comments and non-data fields (event:, id:, retry:)
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data).trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseRecord::Done);
    }
    Some(SseRecord::Data(data.to_string()))
}
