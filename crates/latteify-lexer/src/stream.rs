//! Cursor over a token sequence with bounded lookahead and typed expectations.

use std::sync::Arc;

use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::source::Source;
use crate::token::{Token, TokenKind};

/// Owns the tokens of one template and a monotonic cursor into them.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    current: usize,
    source: Arc<Source>,
}

impl TokenStream {
    /// The token list must end with `Eof`.
    pub fn new(tokens: Vec<Token>, source: Arc<Source>) -> Self {
        Self {
            tokens,
            current: 0,
            source,
        }
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    pub fn current(&self) -> &Token {
        self.look(0)
    }

    /// Token `n` positions ahead of the cursor, clamped to `Eof`.
    pub fn look(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.current + n).min(last)]
    }

    /// The token before the cursor, if any.
    pub fn previous(&self) -> Option<&Token> {
        self.current.checked_sub(1).map(|i| &self.tokens[i])
    }

    pub fn is_eof(&self) -> bool {
        self.current().is_eof()
    }

    /// Consume the current token and return it.
    pub fn next(&mut self) -> Result<Token, SyntaxError> {
        let token = self.current().clone();
        if token.is_eof() {
            return Err(self.error(SyntaxErrorKind::UnexpectedEnd, "Unexpected end of template"));
        }
        self.current += 1;
        Ok(token)
    }

    /// Consume the current token when `test` accepts it.
    pub fn next_if(&mut self, test: impl FnOnce(&Token) -> bool) -> Option<Token> {
        if test(self.current()) && !self.is_eof() {
            let token = self.current().clone();
            self.current += 1;
            Some(token)
        } else {
            None
        }
    }

    pub fn next_if_punct(&mut self, c: char) -> Option<Token> {
        self.next_if(|t| t.is_punct(c))
    }

    pub fn next_if_operator(&mut self, op: &str) -> Option<Token> {
        self.next_if(|t| t.is_operator(op))
    }

    pub fn next_if_name(&mut self, name: &str) -> Option<Token> {
        self.next_if(|t| t.is_name(name))
    }

    // --- Expectations ---

    /// Consume the current token if `test` accepts it, otherwise fail with
    /// an "Unexpected token" diagnostic describing `expected`.
    pub fn expect(
        &mut self,
        test: impl FnOnce(&Token) -> bool,
        expected: &str,
        message: Option<&str>,
    ) -> Result<Token, SyntaxError> {
        if test(self.current()) {
            return self.next();
        }
        let token = self.current();
        let prefix = message.map(|m| format!("{m}. ")).unwrap_or_default();
        let text = format!("{prefix}Unexpected token {} ({expected} expected)", token.kind);
        Err(SyntaxError::new(
            SyntaxErrorKind::UnexpectedToken,
            text,
            token.line(),
            &self.source,
        ))
    }

    pub fn expect_punct(&mut self, c: char, message: Option<&str>) -> Result<Token, SyntaxError> {
        let expected = format!("\"punctuation\" with value \"{c}\"");
        self.expect(|t| t.is_punct(c), &expected, message)
    }

    pub fn expect_operator(&mut self, op: &str) -> Result<Token, SyntaxError> {
        let expected = format!("\"operator\" with value \"{op}\"");
        self.expect(|t| t.is_operator(op), &expected, None)
    }

    /// Consume any name token and return its value.
    pub fn expect_name(&mut self) -> Result<String, SyntaxError> {
        let token = self.expect(|t| t.name().is_some(), "\"name\"", None)?;
        Ok(token.name().map(str::to_string).unwrap_or_default())
    }

    pub fn expect_name_value(&mut self, name: &str) -> Result<Token, SyntaxError> {
        let expected = format!("\"name\" with value \"{name}\"");
        self.expect(|t| t.is_name(name), &expected, None)
    }

    pub fn expect_string(&mut self) -> Result<String, SyntaxError> {
        let token = self.expect(|t| matches!(t.kind, TokenKind::String(_)), "\"string\"", None)?;
        match token.kind {
            TokenKind::String(value) => Ok(value),
            _ => Ok(String::new()),
        }
    }

    pub fn expect_block_end(&mut self) -> Result<Token, SyntaxError> {
        self.expect(|t| t.kind == TokenKind::BlockEnd, "\"end of statement block\"", None)
    }

    pub fn expect_var_end(&mut self) -> Result<Token, SyntaxError> {
        self.expect(|t| t.kind == TokenKind::VarEnd, "\"end of print statement\"", None)
    }

    pub fn error(&self, kind: SyntaxErrorKind, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(kind, message, self.current().line(), &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Number, Span};
    use pretty_assertions::assert_eq;

    fn token(kind: TokenKind, line: usize) -> Token {
        Token::new(kind, Span::new(0, 0, line, 1))
    }

    fn stream() -> TokenStream {
        TokenStream::new(
            vec![
                token(TokenKind::VarStart, 1),
                token(TokenKind::Name("a".into()), 1),
                token(TokenKind::Punctuation('('), 1),
                token(TokenKind::Number(Number::Int(1)), 2),
                token(TokenKind::Eof, 2),
            ],
            Arc::new(Source::new("", "stream")),
        )
    }

    #[test]
    fn test_look_does_not_advance() {
        let s = stream();
        assert_eq!(s.look(1).kind, TokenKind::Name("a".into()));
        assert_eq!(s.look(10).kind, TokenKind::Eof);
        assert_eq!(s.current().kind, TokenKind::VarStart);
    }

    #[test]
    fn test_next_if() {
        let mut s = stream();
        assert!(s.next_if_punct('(').is_none());
        assert!(s.next_if(|t| t.kind == TokenKind::VarStart).is_some());
        assert_eq!(s.expect_name().unwrap(), "a");
        assert_eq!(s.previous().and_then(|t| t.name()), Some("a"));
    }

    #[test]
    fn test_expect_failure_message() {
        let mut s = stream();
        s.next().unwrap();
        let err = s.expect_punct(')', Some("An opened parenthesis is not properly closed")).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
        assert_eq!(
            err.message,
            "An opened parenthesis is not properly closed. Unexpected token \"name\" of value \"a\" (\"punctuation\" with value \")\" expected)"
        );
    }

    #[test]
    fn test_next_past_eof_fails() {
        let mut s = stream();
        for _ in 0..4 {
            s.next().unwrap();
        }
        assert!(s.is_eof());
        let err = s.next().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(err.line, 2);
    }
}
