//! # Line Framing Module
//!
//! Turns the raw serial byte stream into newline-delimited text lines.
//!
//! The partial line is carried as bytes, not text, so a multi-byte UTF-8
//! character split across two reads still decodes intact. Each complete
//! line is decoded permissively: invalid byte sequences are dropped rather
//! than replaced or reported.

const LINE_TERMINATOR: u8 = b'\n';

/// Decode bytes as UTF-8, silently dropping invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Split newly arrived bytes into complete lines.
///
/// `carry` is the partial line left over from the previous call. Returns the
/// complete lines found (terminator removed, otherwise untrimmed) and the new
/// partial remainder to pass into the next call. A chunk without a terminator
/// yields no lines and a longer remainder; a chunk ending on a terminator
/// yields an empty remainder.
pub fn split_chunk(carry: &[u8], chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut pending = Vec::with_capacity(carry.len() + chunk.len());
    pending.extend_from_slice(carry);
    pending.extend_from_slice(chunk);

    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, byte) in pending.iter().enumerate() {
        if *byte == LINE_TERMINATOR {
            lines.push(decode_lossy(&pending[start..idx]));
            start = idx + 1;
        }
    }

    let remainder = pending.split_off(start);
    (lines, remainder)
}

/// Stateful wrapper around [`split_chunk`] that owns the carried partial line.
#[derive(Debug)]
pub struct LineDecoder {
    partial: Vec<u8>,
    max_partial: usize,
    /// Skipping the tail of an oversized line until the next terminator
    discarding: bool,
}

impl LineDecoder {
    /// `max_partial` bounds the carried partial line. A device that never
    /// sends a terminator would otherwise grow the buffer forever.
    pub fn new(max_partial: usize) -> Self {
        Self {
            partial: Vec::new(),
            max_partial,
            discarding: false,
        }
    }

    /// Feed a chunk of bytes; returns every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let chunk = if self.discarding {
            match chunk.iter().position(|b| *b == LINE_TERMINATOR) {
                Some(idx) => {
                    self.discarding = false;
                    &chunk[idx + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };

        let (lines, remainder) = split_chunk(&self.partial, chunk);
        if remainder.len() > self.max_partial {
            log::debug!(
                "Discarding {} bytes of unterminated input (limit {})",
                remainder.len(),
                self.max_partial
            );
            self.partial.clear();
            self.discarding = true;
        } else {
            self.partial = remainder;
        }
        lines
    }

    /// Bytes currently held as an incomplete line
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }
}
