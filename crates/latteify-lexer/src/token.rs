use std::fmt;

/// A position in source text, tracking line and column for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Numeric literal, keeping integers apart from floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// Token classification for Twig source.
///
/// Data-carrying variants embed their value directly (no separate `value` field on Token).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Template structure
    Text(String),
    BlockStart,
    BlockEnd,
    VarStart,
    VarEnd,
    Comment(String),
    Verbatim(String),

    // Expression tokens
    Name(String),
    Number(Number),
    String(String),
    Operator(String),
    Punctuation(char),
    InterpolationStart,
    InterpolationEnd,
    Arrow,

    Eof,
}

impl TokenKind {
    /// Human readable kind, as used in "Unexpected token" diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Text(_) => "text",
            TokenKind::BlockStart => "begin of statement block",
            TokenKind::BlockEnd => "end of statement block",
            TokenKind::VarStart => "begin of print statement",
            TokenKind::VarEnd => "end of print statement",
            TokenKind::Comment(_) => "comment",
            TokenKind::Verbatim(_) => "verbatim",
            TokenKind::Name(_) => "name",
            TokenKind::Number(_) => "number",
            TokenKind::String(_) => "string",
            TokenKind::Operator(_) => "operator",
            TokenKind::Punctuation(_) => "punctuation",
            TokenKind::InterpolationStart => "begin of string interpolation",
            TokenKind::InterpolationEnd => "end of string interpolation",
            TokenKind::Arrow => "arrow function",
            TokenKind::Eof => "end of template",
        }
    }

    /// Printable value of value-carrying kinds.
    pub fn value(&self) -> Option<String> {
        match self {
            TokenKind::Name(v) | TokenKind::String(v) | TokenKind::Operator(v) => Some(v.clone()),
            TokenKind::Number(Number::Int(n)) => Some(n.to_string()),
            TokenKind::Number(Number::Float(n)) => Some(n.to_string()),
            TokenKind::Punctuation(c) => Some(c.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "\"{}\" of value \"{value}\"", self.describe()),
            None => write!(f, "\"{}\"", self.describe()),
        }
    }
}

/// A token produced by the Twig lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punctuation(c)
    }

    /// Any of the given punctuation characters.
    pub fn is_any_punct(&self, chars: &[char]) -> bool {
        matches!(self.kind, TokenKind::Punctuation(c) if chars.contains(&c))
    }

    pub fn is_operator(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Operator(o) if o == op)
    }

    /// A name token with exactly this value.
    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_with_value() {
        assert_eq!(
            TokenKind::Name("foo".into()).to_string(),
            "\"name\" of value \"foo\""
        );
        assert_eq!(TokenKind::Punctuation(')').to_string(), "\"punctuation\" of value \")\"");
    }

    #[test]
    fn test_display_without_value() {
        assert_eq!(TokenKind::BlockEnd.to_string(), "\"end of statement block\"");
        assert_eq!(TokenKind::Eof.to_string(), "\"end of template\"");
    }

    #[test]
    fn test_predicates() {
        let tok = Token::new(TokenKind::Operator("not in".into()), Span::default());
        assert!(tok.is_operator("not in"));
        assert!(!tok.is_operator("in"));
        assert!(!tok.is_name("not in"));
        let tok = Token::new(TokenKind::Punctuation('['), Span::default());
        assert!(tok.is_any_punct(&['(', '[']));
    }
}
