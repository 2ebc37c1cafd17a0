//! Frame parser for the server-pushed event stream.
//!
//! A frame is a run of `field: value` lines terminated by a blank line.
//! Chunks arrive with arbitrary boundaries, so bytes are buffered raw and
//! only complete frames are decoded. A multi-byte UTF-8 character split
//! across two chunks therefore decodes correctly.

use tracing::debug;

/// Event type used when a frame carries no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One unparsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub event_type: String,
    pub data: String,
}

impl RawRecord {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// Incremental frame splitter with a single carry-over buffer.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Start of the first unconsumed byte in `buffer`.
    cursor: usize,
    /// Bytes after `cursor` already searched for a delimiter.
    scanned: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk of the response body.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Append an already-decoded text fragment.
    pub fn push_str(&mut self, fragment: &str) {
        self.push(fragment.as_bytes());
    }

    /// Pull the next complete frame that carries data.
    ///
    /// Frames without data (heartbeats, comments) are skipped silently.
    /// Returns `None` once the buffer holds no further complete frame.
    pub fn next_record(&mut self) -> Option<RawRecord> {
        loop {
            let pending = &self.buffer[self.cursor..];
            let Some((end, delimiter_len)) = find_delimiter(pending, self.scanned) else {
                // Keep two bytes of overlap so a split "\n\r\n" is found next time.
                self.scanned = pending.len().saturating_sub(2);
                return None;
            };

            let start = self.cursor;
            self.cursor += end + delimiter_len;
            self.scanned = 0;

            let text = String::from_utf8_lossy(&self.buffer[start..start + end]);
            match parse_frame(&text) {
                Some(record) => return Some(record),
                None => debug!(bytes = end, "Dropping frame without data"),
            }
        }
    }

    /// Lazily drain every complete frame currently buffered.
    pub fn records(&mut self) -> Records<'_> {
        Records { parser: self }
    }

    /// Number of buffered bytes that do not yet form a complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// End of stream. An incomplete trailing frame is dropped, not an error.
    ///
    /// Returns the number of bytes discarded.
    pub fn finish(self) -> usize {
        let leftover = self.pending_bytes();
        if leftover > 0 {
            debug!(bytes = leftover, "Discarding incomplete frame at end of stream");
        }
        leftover
    }
}

/// Iterator over the complete frames currently held by a [`FrameParser`].
pub struct Records<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Records<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_record()
    }
}

/// Locate the first blank line. Returns the frame length and the length of
/// the delimiter that follows it (`\n\n` or `\n\r\n`).
fn find_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parse the lines of one frame. `None` when the frame has no data.
fn parse_frame(text: &str) -> Option<RawRecord> {
    let mut event_type: Option<&str> = None;
    let mut data: Option<&str> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value),
            // Last data line wins; the server never sends more than one.
            "data" => data = Some(value),
            _ => {}
        }
    }

    let data = data.filter(|d| !d.trim().is_empty())?;
    let event_type = event_type
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_EVENT_TYPE);
    Some(RawRecord::new(event_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(parser: &mut FrameParser) -> Vec<RawRecord> {
        parser.records().collect()
    }

    #[test]
    fn test_single_frame() {
        let mut parser = FrameParser::new();
        parser.push_str("event: status\ndata: {\"step\":\"analyzing\"}\n\n");
        let records = collect(&mut parser);
        assert_eq!(
            records,
            vec![RawRecord::new("status", "{\"step\":\"analyzing\"}")]
        );
        assert_eq!(parser.pending_bytes(), 0);
    }

    #[test]
    fn test_default_event_type() {
        let mut parser = FrameParser::new();
        parser.push_str("data: {}\n\n");
        assert_eq!(parser.next_record().unwrap().event_type, "message");
    }

    #[test]
    fn test_frame_without_data_is_dropped() {
        let mut parser = FrameParser::new();
        parser.push_str(": keep-alive\n\nevent: ping\n\nevent: status\ndata:\n\nevent: result\ndata: {}\n\n");
        let records = collect(&mut parser);
        assert_eq!(records, vec![RawRecord::new("result", "{}")]);
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut parser = FrameParser::new();
        parser.push_str("event: status\nda");
        assert!(parser.next_record().is_none());
        parser.push_str("ta: {\"a\":1}\n");
        assert!(parser.next_record().is_none());
        parser.push_str("\n");
        assert_eq!(parser.next_record().unwrap().data, "{\"a\":1}");
    }

    #[test]
    fn test_delimiter_split_across_chunks() {
        let mut parser = FrameParser::new();
        parser.push_str("data: one\n");
        assert!(parser.next_record().is_none());
        parser.push_str("\ndata: two\n\n");
        let records = collect(&mut parser);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data, "one");
        assert_eq!(records[1].data, "two");
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut parser = FrameParser::new();
        parser.push_str("event: status\r\ndata: x\r\n\r");
        assert!(parser.next_record().is_none());
        parser.push_str("\n");
        assert_eq!(parser.next_record(), Some(RawRecord::new("status", "x")));
    }

    #[test]
    fn test_value_without_leading_space() {
        let mut parser = FrameParser::new();
        parser.push_str("event:result\ndata:{\"name\":\"A\"}\n\n");
        assert_eq!(
            parser.next_record(),
            Some(RawRecord::new("result", "{\"name\":\"A\"}"))
        );
    }

    #[test]
    fn test_last_data_line_wins() {
        let mut parser = FrameParser::new();
        parser.push_str("data: first\ndata: second\n\n");
        assert_eq!(parser.next_record().unwrap().data, "second");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "data: {\"name\":\"Zoë\"}\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut parser = FrameParser::new();
        parser.push(&bytes[..split]);
        assert!(parser.next_record().is_none());
        parser.push(&bytes[split..]);
        assert_eq!(parser.next_record().unwrap().data, "{\"name\":\"Zoë\"}");
    }

    #[test]
    fn test_finish_discards_leftover() {
        let mut parser = FrameParser::new();
        parser.push_str("data: done\n\nevent: result\ndata: {\"partial\":");
        assert_eq!(parser.next_record().unwrap().data, "done");
        assert!(parser.next_record().is_none());
        assert_eq!(parser.finish(), "event: result\ndata: {\"partial\":".len());
    }

    #[test]
    fn test_leading_blank_lines() {
        let mut parser = FrameParser::new();
        parser.push_str("\n\n\nevent: status\ndata: y\n\n");
        assert_eq!(collect(&mut parser), vec![RawRecord::new("status", "y")]);
    }
}
