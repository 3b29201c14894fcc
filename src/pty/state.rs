//! Marker matching over the PTY output stream.

/// Recent output is trimmed back to this many bytes once it passes
/// `RECENT_OUTPUT_LIMIT`.
const RECENT_OUTPUT_KEEP: usize = 8 * 1024;
const RECENT_OUTPUT_LIMIT: usize = 10 * 1024;

/// Rolling window of recent output used to spot prompts.
///
/// Markers may be split across reads, so matching is done against the
/// accumulated window rather than the latest chunk.
#[derive(Debug, Default)]
pub struct MatchBuffer {
    recent_output: String,
    decoder: Utf8Decoder,
}

impl MatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output and trim to the last 8KB once it grows past 10KB
    pub fn append(&mut self, data: &[u8]) {
        let text = self.decoder.decode(data);
        self.recent_output.push_str(&text);
        trim_to_recent(&mut self.recent_output);
    }

    /// Check if a marker is present anywhere in the window, with or without
    /// ANSI styling between its characters.
    pub fn contains(&self, marker: &str) -> bool {
        self.recent_output.contains(marker) || strip_ansi_codes(&self.recent_output).contains(marker)
    }

    /// Check if the line currently being drawn ends with one of the prompts.
    ///
    /// Only the unterminated tail counts: a prompt followed by a newline has
    /// already been answered.
    pub fn ends_with_prompt<S: AsRef<str>>(&self, prompts: &[S]) -> bool {
        let stripped = strip_ansi_codes(&self.recent_output);
        let line = current_line(&stripped);
        prompts
            .iter()
            .map(AsRef::as_ref)
            .any(|prompt| !prompt.is_empty() && line.ends_with(prompt))
    }

    /// Forget everything seen so far
    pub fn clear(&mut self) {
        self.recent_output.clear();
    }

    pub fn recent_output(&self) -> &str {
        &self.recent_output
    }

    /// Last non-blank line of the window with ANSI styling removed
    pub fn last_line(&self) -> String {
        strip_ansi_codes(&self.recent_output)
            .split(['\n', '\r'])
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Drop the front of `text` once it passes `RECENT_OUTPUT_LIMIT`, keeping
/// the last `RECENT_OUTPUT_KEEP` bytes. Returns whether anything was dropped.
fn trim_to_recent(text: &mut String) -> bool {
    if text.len() <= RECENT_OUTPUT_LIMIT {
        return false;
    }
    let mut start = text.len() - RECENT_OUTPUT_KEEP;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text.drain(..start);
    true
}

/// Text after the last line feed or carriage return
fn current_line(text: &str) -> &str {
    match text.rfind(['\n', '\r']) {
        Some(pos) => &text[pos + 1..],
        None => text,
    }
}

/// Splits relayed output into lines and reports whether any complete line
/// equals the completion marker.
#[derive(Debug)]
pub struct LineScanner {
    marker: String,
    partial: String,
    /// The start of the current line was dropped to bound memory
    truncated: bool,
    found: bool,
}

impl LineScanner {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.trim().to_string(),
            partial: String::new(),
            truncated: false,
            found: false,
        }
    }

    /// Feed decoded text. Returns true once the marker has been seen.
    pub fn feed(&mut self, text: &str) -> bool {
        self.partial.push_str(text);
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            if !std::mem::take(&mut self.truncated) {
                self.check_line(&line);
            }
        }
        // Progress bars redrawn with bare \r never end a line
        if trim_to_recent(&mut self.partial) {
            self.truncated = true;
        }
        self.found
    }

    /// Check the trailing unterminated line, for streams that end without a
    /// final newline.
    pub fn finish(&mut self) -> bool {
        let line = std::mem::take(&mut self.partial);
        if !std::mem::take(&mut self.truncated) {
            self.check_line(&line);
        }
        self.found
    }

    pub fn found(&self) -> bool {
        self.found
    }

    fn check_line(&mut self, line: &str) {
        if self.found || self.marker.is_empty() {
            return;
        }
        let stripped = strip_ansi_codes(line);
        if stripped.trim() == self.marker {
            self.found = true;
        }
    }
}

/// Lossy UTF-8 decoding across chunk boundaries.
///
/// A multi-byte character split between two reads is held back until the
/// rest arrives; genuinely invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, data: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(data);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end, wait for more
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a truncated trailing sequence at end-of-stream
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Strip ANSI escape sequences from a string for reliable text matching
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip ESC and the following sequence
            if let Some(&next) = chars.peek() {
                if next == '[' {
                    chars.next(); // consume '['
                    // Skip until we hit a letter (the terminator)
                    while let Some(&ch) = chars.peek() {
                        chars.next();
                        if ch.is_ascii_alphabetic() {
                            break;
                        }
                    }
                } else if next == ']' {
                    // OSC sequence - skip until BEL or ST
                    chars.next();
                    for ch in chars.by_ref() {
                        if ch == '\x07' || ch == '\\' {
                            break;
                        }
                    }
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes_no_codes() {
        assert_eq!(strip_ansi_codes("hello world"), "hello world");
    }

    #[test]
    fn test_strip_ansi_codes_color() {
        assert_eq!(strip_ansi_codes("\x1b[31mred text\x1b[0m"), "red text");
    }

    #[test]
    fn test_strip_ansi_codes_osc_title() {
        // Window title set by most shells before drawing the prompt
        assert_eq!(
            strip_ansi_codes("\x1b]0;root@web: ~\x07root@web:~# "),
            "root@web:~# "
        );
    }

    #[test]
    fn test_marker_split_across_chunks() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"root@host's pass");
        assert!(!buffer.contains("assword:"));
        buffer.append(b"word: ");
        assert!(buffer.contains("assword:"));
    }

    #[test]
    fn test_marker_with_styling() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"\x1b[1mPass\x1b[0mword: ");
        assert!(buffer.contains("assword:"));
    }

    #[test]
    fn test_clear_forgets_marker() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"Password: ");
        buffer.clear();
        assert!(!buffer.contains("assword:"));
        assert_eq!(buffer.recent_output(), "");
    }

    #[test]
    fn test_ends_with_prompt_on_current_line() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"Welcome to Ubuntu\r\nLast login: today\r\n\x1b[01;32mroot@web\x1b[00m:~# ");
        assert!(buffer.ends_with_prompt(&["$ ", "# "]));
    }

    #[test]
    fn test_answered_prompt_does_not_count() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"root@web:~# cd /opt\r\n");
        assert!(!buffer.ends_with_prompt(&["$ ", "# "]));
        buffer.append(b"building...");
        assert!(!buffer.ends_with_prompt(&["$ ", "# "]));
        buffer.append(b"\r\nroot@web:/opt# ");
        assert!(buffer.ends_with_prompt(&["$ ", "# "]));
    }

    #[test]
    fn test_empty_prompt_never_matches() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"anything");
        assert!(!buffer.ends_with_prompt(&[""]));
    }

    #[test]
    fn test_append_trims_to_recent_window() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"Password: ");
        buffer.append(&vec![b'x'; RECENT_OUTPUT_LIMIT]);
        assert!(buffer.recent_output().len() <= RECENT_OUTPUT_KEEP);
        assert!(!buffer.contains("Password"));
    }

    #[test]
    fn test_append_joins_split_character() {
        let mut buffer = MatchBuffer::new();
        buffer.append(b"caf\xc3");
        buffer.append(b"\xa9 # ");
        assert_eq!(buffer.recent_output(), "café # ");
    }

    #[test]
    fn test_last_line_skips_blank_and_styling() {
        let mut buffer = MatchBuffer::new();
        assert_eq!(buffer.last_line(), "");
        buffer.append(b"\x1b[31mssh: connect to host 10.0.0.5 port 22: Connection refused\x1b[0m\r\n\r\n");
        assert_eq!(
            buffer.last_line(),
            "ssh: connect to host 10.0.0.5 port 22: Connection refused"
        );
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok \xff\xfe done"), "ok \u{FFFD}\u{FFFD} done");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_joins_split_character() {
        let mut decoder = Utf8Decoder::new();
        // "é" is 0xC3 0xA9
        assert_eq!(decoder.decode(b"caf\xc3"), "caf");
        assert_eq!(decoder.decode(b"\xa9!"), "é!");
    }

    #[test]
    fn test_decoder_finish_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"abc\xe2\x82"), "abc");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_line_scanner_ignores_echoed_command() {
        let mut scanner = LineScanner::new("DEPLOYMENT COMPLETE!");
        assert!(!scanner.feed("root@web:/opt# echo \"DEPLOYMENT COMPLETE!\"\r\n"));
        assert!(scanner.feed("DEPLOYMENT COMPLETE!\r\n"));
    }

    #[test]
    fn test_line_scanner_split_line() {
        let mut scanner = LineScanner::new("DEPLOYMENT COMPLETE!");
        assert!(!scanner.feed("DEPLOYMENT COM"));
        assert!(scanner.feed("PLETE!\n"));
        assert!(scanner.found());
    }

    #[test]
    fn test_line_scanner_finish_checks_tail() {
        let mut scanner = LineScanner::new("DONE");
        assert!(!scanner.feed("\x1b[32mDONE\x1b[0m"));
        assert!(scanner.finish());
    }

    #[test]
    fn test_line_scanner_bounds_unterminated_line() {
        let mut scanner = LineScanner::new("DONE");
        let progress = "\r[=====>    ] 50%".repeat(2000);
        scanner.feed(&progress);
        assert!(scanner.partial.len() <= RECENT_OUTPUT_KEEP);
        // The overlong line never matches, even if its tail looks like the marker
        scanner.feed(&format!("{}DONE\n", " ".repeat(RECENT_OUTPUT_LIMIT)));
        assert!(!scanner.found());
        assert!(scanner.feed("DONE\r\n"));
    }
}
