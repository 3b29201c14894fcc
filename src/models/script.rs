//! Command script sent to the remote shell.

/// Embedded default deployment script
pub const EMBEDDED_SCRIPT: &str = include_str!("../../deploy.sh");

/// Ordered list of shell command lines, written to the PTY one at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    lines: Vec<String>,
}

impl CommandScript {
    /// Build a script from explicit command lines, keeping them verbatim
    /// except for blank entries which are skipped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines
            .into_iter()
            .map(Into::into)
            .filter(|line: &String| !line.trim().is_empty())
            .collect();
        Self { lines }
    }

    /// Parse script text: one command per line, blank lines and `#` comment
    /// lines dropped, surrounding whitespace trimmed.
    pub fn parse(text: &str) -> Self {
        let lines = text
            .trim()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
