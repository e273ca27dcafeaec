//! Token types for the kernel description language.

use crate::utils::location::Span;
use std::fmt;

/// A token in the source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source span
    pub span: Span,
    /// The lexeme (raw text)
    pub lexeme: String,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, span: Span, lexeme: String) -> Self {
        Self { kind, span, lexeme }
    }

    /// Check if this is an EOF token.
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.lexeme)
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer,
    /// Floating-point literal
    Float,

    /// Identifier (tensor, index or symbol name)
    Identifier,

    // Section keywords
    /// `TENSORS`
    Tensors,
    /// `LOOPS`
    Loops,
    /// `BODY`
    Body,
    /// `min`
    Min,

    // Operators
    /// `+`
    Plus,
    /// `*`
    Star,
    /// `=`
    Equal,

    // Delimiters
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,

    /// End of file
    Eof,
}

impl TokenKind {
    /// Check if this is a keyword.
    pub fn is_keyword(&self) -> bool {
        use TokenKind::*;
        matches!(self, Tensors | Loops | Body | Min)
    }

    /// Starts a top-level section.
    pub fn is_section(&self) -> bool {
        use TokenKind::*;
        matches!(self, Tensors | Loops | Body)
    }

    /// Get the keyword for a string, if it is a keyword.
    pub fn keyword(s: &str) -> Option<TokenKind> {
        match s {
            "TENSORS" => Some(TokenKind::Tensors),
            "LOOPS" => Some(TokenKind::Loops),
            "BODY" => Some(TokenKind::Body),
            "min" | "MIN" => Some(TokenKind::Min),
            _ => None,
        }
    }

    /// Get a human-readable name for this token kind.
    pub fn name(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Integer => "integer",
            Float => "float",
            Identifier => "identifier",
            Tensors => "TENSORS",
            Loops => "LOOPS",
            Body => "BODY",
            Min => "min",
            Plus => "+",
            Star => "*",
            Equal => "=",
            LeftParen => "(",
            RightParen => ")",
            LeftBracket => "[",
            RightBracket => "]",
            Comma => ",",
            Colon => ":",
            Semicolon => ";",
            Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
