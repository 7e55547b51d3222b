//! Child output handling: the bounded tail, UTF-8 decoding across reads,
//! and the line assembly used for marker scanning.
//!
//! Output is forwarded as it arrives, in whatever chunks the pipe yields.
//! Only marker scanning needs whole lines, and it gets them from a
//! [`LineAssembler`] with a fixed cap.

use std::collections::VecDeque;

/// Characters of output kept per process.
pub const OUTPUT_TAIL_CHARS: usize = 5000;

/// Bytes of one line kept for marker scanning. The rest of a longer line is
/// dropped.
pub const MARKER_LINE_BYTES: usize = 64 * 1024;

/// Keeps the last `capacity` characters written to it.
#[derive(Debug, Clone)]
pub struct OutputTail {
    chars: VecDeque<char>,
    capacity: usize,
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::with_capacity(OUTPUT_TAIL_CHARS)
    }
}

impl OutputTail {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chars: VecDeque::with_capacity(capacity.min(OUTPUT_TAIL_CHARS)),
            capacity,
        }
    }

    pub fn push_str(&mut self, text: &str) {
        self.chars.extend(text.chars());
        let excess = self.chars.len().saturating_sub(self.capacity);
        self.chars.drain(..excess);
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn contents(&self) -> String {
        self.chars.iter().collect()
    }
}

/// Decodes a byte stream as UTF-8 when reads may split a character.
#[derive(Debug, Default)]
pub struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    /// Decode `bytes` after whatever the previous call held back.
    ///
    /// An incomplete character at the end is held back until the next call.
    /// Invalid sequences become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        text
    }

    /// Whatever is still held back, decoded lossily.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Reassembles lines from arbitrary chunks of text.
#[derive(Debug)]
pub struct LineAssembler {
    partial: String,
    limit: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::with_limit(MARKER_LINE_BYTES)
    }
}

impl LineAssembler {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            partial: String::new(),
            limit,
        }
    }

    /// Feed `text` and return every line it completes, without the line
    /// terminator. Lines longer than the limit are cut at the limit.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for piece in text.split_inclusive('\n') {
            let (body, complete) = match piece.strip_suffix('\n') {
                Some(body) => (body, true),
                None => (piece, false),
            };

            let room = self.limit.saturating_sub(self.partial.len());
            let cut = (0..=room.min(body.len()))
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            self.partial.push_str(&body[..cut]);

            if complete {
                lines.push(self.take_line());
            }
        }
        lines
    }

    /// The unterminated last line, if any.
    pub fn finish(&mut self) -> Option<String> {
        (!self.partial.is_empty()).then(|| self.take_line())
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.partial);
        if line.ends_with('\r') {
            line.pop();
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_the_tail() {
        let mut tail = OutputTail::with_capacity(5);
        tail.push_str("abc");
        tail.push_str("defg");
        assert_eq!(tail.contents(), "cdefg");
        assert_eq!(tail.len(), 5);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let mut tail = OutputTail::with_capacity(3);
        tail.push_str("ñandú");
        assert_eq!(tail.contents(), "ndú");
    }

    #[test]
    fn test_default_capacity() {
        let mut tail = OutputTail::default();
        assert!(tail.is_empty());
        tail.push_str(&"x".repeat(OUTPUT_TAIL_CHARS + 10));
        assert_eq!(tail.len(), OUTPUT_TAIL_CHARS);
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let bytes = "ñandú".as_bytes();
        let mut chunks = Utf8Chunks::default();

        assert_eq!(chunks.decode(&bytes[..1]), "");
        assert_eq!(chunks.decode(&bytes[1..4]), "ñan");
        assert_eq!(chunks.decode(&bytes[4..]), "dú");
        assert_eq!(chunks.finish(), "");
    }

    #[test]
    fn test_utf8_invalid_bytes_are_replaced() {
        let mut chunks = Utf8Chunks::default();
        assert_eq!(chunks.decode(b"ok\xffok"), "ok\u{FFFD}ok");

        assert_eq!(chunks.decode(b"end\xc3"), "end");
        assert_eq!(chunks.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_lines_span_chunks() {
        let mut lines = LineAssembler::default();
        assert!(lines.push("Running flow 3/10...").is_empty());
        assert_eq!(lines.push(" done\r\nnext"), vec!["Running flow 3/10... done"]);
        assert_eq!(lines.push("\n\n"), vec!["next", ""]);
        assert_eq!(lines.finish(), None);

        lines.push("[TASK_COMPLETE] no newline");
        assert_eq!(lines.finish().as_deref(), Some("[TASK_COMPLETE] no newline"));
    }

    #[test]
    fn test_long_lines_are_capped() {
        let mut lines = LineAssembler::with_limit(8);
        assert!(lines.push("[TAG] abcdef").is_empty());
        assert!(lines.push("ghijkl").is_empty());
        assert_eq!(lines.push("\nshort\n"), vec!["[TAG] ab", "short"]);

        let mut lines = LineAssembler::with_limit(3);
        assert_eq!(lines.push("añb\n"), vec!["añ"]);
    }
}
