use std::fmt;

/// Visible error area. Collects every non-fatal problem the loop runs into.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    lines: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message`, one entry per non-empty line. Returns the number of
    /// lines added.
    pub fn report(&mut self, message: impl fmt::Display) -> usize {
        let text = message.to_string();
        let before = self.lines.len();
        for line in text.split(&['\r', '\n', '\0'][..]) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::warn!(target: "searchspace::diagnostics", "{line}");
            self.lines.push(line.to_string());
        }
        self.lines.len() - before
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.lines.iter().filter(|line| line.contains(needle)).count()
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}
