//! Append-only record of everything the run tells the user.
//!
//! Each line is echoed to stdout as it is recorded (unless the log is quiet)
//! and the whole record becomes `script.output` inside the archive.

/// Width of the `=` rule framing command output.
pub const SEPARATOR_WIDTH: usize = 80;

#[derive(Debug, Default)]
pub struct RunLog {
    lines: Vec<String>,
    echo: bool,
}

impl RunLog {
    /// A log that echoes every line to stdout.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            echo: true,
        }
    }

    /// A log that only records.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Append a line (or a multi-line block, split on newlines).
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if self.echo {
            println!("{}", text);
        }
        if text.is_empty() {
            self.lines.push(String::new());
            return;
        }
        self.lines.extend(text.lines().map(str::to_string));
    }

    pub fn ok(&mut self, text: impl AsRef<str>) {
        self.line(format!("✅ {}", text.as_ref()));
    }

    pub fn warn(&mut self, text: impl AsRef<str>) {
        self.line(format!("⚠️ {}", text.as_ref()));
    }

    pub fn fail(&mut self, text: impl AsRef<str>) {
        self.line(format!("❌ {}", text.as_ref()));
    }

    /// Indented per-file detail under an entry.
    pub fn detail(&mut self, text: impl AsRef<str>) {
        self.line(format!("  {}", text.as_ref()));
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    /// `=` rule, header text, `=` rule.
    pub fn header(&mut self, title: impl AsRef<str>) {
        let rule = "=".repeat(SEPARATOR_WIDTH);
        self.blank();
        self.line(&rule);
        self.line(title);
        self.line(&rule);
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

    /// Full text, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
