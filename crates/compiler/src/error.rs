//! Compile-time diagnostics.

use std::fmt;

/// Where a [`CompileError`] is anchored, which determines its rendering.
#[derive(Debug, Clone)]
pub enum ErrorLocation {
    /// The lexer could not produce a token at all.
    Lexical,
    /// A syntactic or semantic error anchored at a specific token.
    Token(String),
    /// An error anchored at end-of-file.
    End,
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub at: ErrorLocation,
}

impl fmt::Display for CompileError {
    /// `[line N] Error: MSG` for lexical errors, `[line N] Error at end:
    /// MSG` at EOF, `[line N] Error at 'LEXEME': MSG` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.at {
            ErrorLocation::Lexical => write!(f, "[line {}] Error: {}", self.line, self.message),
            ErrorLocation::End => write!(f, "[line {}] Error at end: {}", self.line, self.message),
            ErrorLocation::Token(lexeme) => write!(
                f,
                "[line {}] Error at '{}': {}",
                self.line, lexeme, self.message
            ),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_per_location_kind() {
        let base = CompileError {
            message: "Expect expression.".to_string(),
            line: 3,
            column: 7,
            at: ErrorLocation::Lexical,
        };
        assert_eq!(base.to_string(), "[line 3] Error: Expect expression.");

        let at_end = CompileError {
            at: ErrorLocation::End,
            ..base.clone()
        };
        assert_eq!(at_end.to_string(), "[line 3] Error at end: Expect expression.");

        let at_token = CompileError {
            at: ErrorLocation::Token("+".to_string()),
            ..base
        };
        assert_eq!(
            at_token.to_string(),
            "[line 3] Error at '+': Expect expression."
        );
    }
}
