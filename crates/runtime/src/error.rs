//! Runtime diagnostics and the multi-frame stack trace protocol.

use std::fmt;

/// One unwound frame of a runtime error's stack trace.
#[derive(Debug, Clone)]
pub struct FrameTrace {
    pub name: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for FrameTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = self.name.as_deref().unwrap_or("script");
        write!(f, "[{}:{}:{}] in {}", self.file, self.line, self.column, who)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub frames: Vec<FrameTrace>,
}

impl fmt::Display for RuntimeError {
    /// `Error: MESSAGE` followed by one `[file:line:column] in NAME` line
    /// per frame, most recent first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.message)?;
        for (i, frame) in self.frames.iter().enumerate() {
            if i + 1 == self.frames.len() {
                write!(f, "{frame}")?;
            } else {
                writeln!(f, "{frame}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_message_then_frames_most_recent_first() {
        let err = RuntimeError {
            message: "Undefined variable 'a'.".to_string(),
            frames: vec![
                FrameTrace {
                    name: Some("helper".to_string()),
                    file: "main.wisp".to_string(),
                    line: 4,
                    column: 3,
                },
                FrameTrace {
                    name: None,
                    file: "main.wisp".to_string(),
                    line: 9,
                    column: 1,
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("Error: Undefined variable 'a'.\n"));
        assert!(rendered.contains("[main.wisp:4:3] in helper"));
        assert!(rendered.contains("[main.wisp:9:1] in script"));
    }
}
