//! Server-Sent Events wire parser.
//!
//! Incremental `text/event-stream` framing: feed arbitrary slices of the
//! body, get back complete events. Handles LF, CRLF and bare CR line
//! endings, a leading BOM, comments and multi-line `data:` fields.

/// One framed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`event:` field, defaults to `message`).
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id (`id:` field).
    pub id: Option<String>,
}

impl Default for SseEvent {
    fn default() -> Self {
        Self {
            event: String::from("message"),
            data: String::new(),
            id: None,
        }
    }
}

/// Incremental parser state.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: SseEvent,
    has_data: bool,
    bom_checked: bool,
}

impl SseParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => value.clone_into(&mut self.current.event),
            "data" => {
                self.current.data.push_str(value);
                self.current.data.push('\n');
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.current.id = Some(value.to_owned()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.current = SseEvent::default();
            return None;
        }
        let mut event = std::mem::take(&mut self.current);
        if event.data.ends_with('\n') {
            event.data.pop();
        }
        if event.event.is_empty() {
            event.event = String::from("message");
        }
        self.has_data = false;
        Some(event)
    }

    /// Feed body text and collect every event completed by it.
    pub fn feed(&mut self, data: &str) -> Vec<SseEvent> {
        self.buffer.push_str(data);
        let mut events = Vec::new();
        let mut buffer = std::mem::take(&mut self.buffer);

        if !self.bom_checked && !buffer.is_empty() {
            self.bom_checked = true;
            if buffer.starts_with('\u{feff}') {
                buffer.drain(..'\u{feff}'.len_utf8());
            }
        }

        let mut start = 0usize;
        while let Some(rel) = memchr::memchr2(b'\r', b'\n', &buffer.as_bytes()[start..]) {
            let pos = start + rel;
            let next_start = if buffer.as_bytes()[pos] == b'\n' {
                pos + 1
            } else if pos + 1 < buffer.len() {
                if buffer.as_bytes()[pos + 1] == b'\n' {
                    pos + 2
                } else {
                    pos + 1
                }
            } else {
                // CR at the end: wait to see whether LF follows.
                break;
            };

            let line = &buffer[start..pos];
            start = next_start;

            if line.is_empty() {
                events.extend(self.dispatch());
            } else {
                self.process_line(line);
            }
        }

        buffer.drain(..start);
        self.buffer = buffer;
        events
    }

    /// Flush a trailing event at end of stream.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(line.trim_end_matches('\r'));
        }
        self.dispatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("event: done\ndata: {\"id\":\"42\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "done");
        assert_eq!(events[0].data, "{\"id\":\"42\"}");
    }

    #[test]
    fn test_default_event_name_and_id() {
        let mut parser = SseParser::new();
        let events = parser.feed("id: 7\ndata: hi\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_split_across_feeds() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: mess").is_empty());
        assert!(parser.feed("age\ndata: Hel").is_empty());
        let events = parser.feed("lo\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "Hello");
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(": keep-alive\ndata: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_crlf_and_bare_cr() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: one\r\n\r\ndata: two\r\r");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one");
        // Trailing CR held back until the next byte arrives.
        let events = parser.feed("x");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "two");
    }

    #[test]
    fn test_bom_stripped() {
        let mut parser = SseParser::new();
        let events = parser.feed("\u{feff}data: x\n\n");
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_blank_line_without_data_dispatches_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: meta\n\n").is_empty());
        let events = parser.feed("data: y\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn test_flush_trailing_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed("event: error\ndata: boom").is_empty());
        let event = parser.flush().unwrap();
        assert_eq!(event.event, "error");
        assert_eq!(event.data, "boom");
        assert!(parser.flush().is_none());
    }
}
