//! Compile error reporting.
//!
//! An error carries the virtual path, the offending line, and a short
//! message. Rendering adds a window of source context, two lines either
//! side, with the error line marked.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub path: String,
    pub line: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(path: impl Into<String>, line: u32, message: impl Into<String>) -> CompileError {
        CompileError {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Multi-line report with source context, in the shape the driver logs
    /// and echoes to the triggering player:
    ///
    /// ```text
    /// compile: /obj/thing.ci line #12: expected ';'
    ///       Line 10: x = 1
    /// >>>>  Line 12: y = 2
    ///       Line 13: return y
    /// ```
    pub fn render(&self, source: &str) -> String {
        let mut out = format!(
            "compile: {}.ci line #{}: {}",
            self.path, self.line, self.message
        );
        let lines: Vec<&str> = source.lines().collect();
        if self.line == 0 || lines.is_empty() {
            return out;
        }
        let target = self.line as usize;
        let start = target.saturating_sub(2).max(1);
        let end = (target + 2).min(lines.len());
        for n in start..=end {
            let Some(text) = lines.get(n - 1) else { continue };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let marker = if n == target { ">>>> " } else { "     " };
            out.push_str(&format!("\n{marker} Line {n}: {trimmed}"));
        }
        out
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compile: {}.ci line #{}: {}",
            self.path, self.line, self.message
        )
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_error_line() {
        let src = "int x;\n\nbroken(\nint y;\nfixed() {}\n";
        let err = CompileError::new("/obj/thing", 3, "expected ')'");
        let report = err.render(src);
        assert!(report.starts_with("compile: /obj/thing.ci line #3: expected ')'"));
        assert!(report.contains(">>>>  Line 3: broken("));
        assert!(report.contains("      Line 4: int y;"));
        // blank line 2 is skipped
        assert!(!report.contains("Line 2:"));
    }
}
