use std::sync::Arc;

use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::source::Source;
use crate::token::{Number, Span, Token, TokenKind};

/// Lexer state; the scanner keeps a stack of them so strings can nest
/// interpolations which in turn contain expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Block,
    Var,
    String,
    Interpolation,
}

/// Opening delimiter waiting for its closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Paren,
    Square,
    Curly,
    /// Double-quoted string containing interpolations.
    Quote,
    /// `#{` inside a double-quoted string.
    Interpolation,
}

impl Bracket {
    fn symbol(self) -> &'static str {
        match self {
            Bracket::Paren => "(",
            Bracket::Square => "[",
            Bracket::Curly => "{",
            Bracket::Quote => "\"",
            Bracket::Interpolation => "#{",
        }
    }
}

/// Twig source scanner.
///
/// Alternates between copying literal text and tokenizing the code inside
/// `{{ }}`, `{% %}` and `{# #}` delimiters. Operators are supplied by the
/// caller so the environment's operator table drives recognition.
///
/// - `Vec<char>` source for index-based navigation
/// - State stack for strings and interpolation
/// - Bracket stack for balance checking
/// - Position tracking on every token
pub struct Scanner {
    source: Arc<Source>,
    chars: Vec<char>,
    operators: Vec<Vec<char>>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    states: Vec<State>,
    brackets: Vec<(Bracket, usize)>,
    tag_line: usize,
}

impl Scanner {
    /// Create a new scanner for the given source and operator symbols.
    pub fn new(source: Arc<Source>, operators: &[&str]) -> Self {
        let mut operators: Vec<Vec<char>> = operators.iter().map(|op| op.chars().collect()).collect();
        // Longest first so `==` wins over `=` and `not in` over `not`.
        operators.sort_by(|a, b| b.len().cmp(&a.len()));
        let chars = source.code().chars().collect();
        Self {
            source,
            chars,
            operators,
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            states: vec![State::Data],
            brackets: Vec::new(),
            tag_line: 1,
        }
    }

    /// Tokenize the entire source into a vector of tokens ending with `Eof`.
    pub fn tokenize(source: Arc<Source>, operators: &[&str]) -> Result<Vec<Token>, SyntaxError> {
        let mut scanner = Scanner::new(source, operators);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    fn scan_tokens(&mut self) -> Result<(), SyntaxError> {
        while !self.is_at_end() {
            match self.state() {
                State::Data => self.lex_data()?,
                State::Block => self.lex_tag_body(State::Block)?,
                State::Var => self.lex_tag_body(State::Var)?,
                State::String => self.lex_string()?,
                State::Interpolation => self.lex_interpolation()?,
            }
        }

        match self.state() {
            State::Data => {}
            State::Block => {
                return Err(self.error_at(SyntaxErrorKind::UnterminatedTag, "Unclosed \"block\"", self.tag_line))
            }
            State::Var => {
                return Err(self.error_at(SyntaxErrorKind::UnterminatedTag, "Unclosed \"variable\"", self.tag_line))
            }
            State::String | State::Interpolation => {
                let line = self.brackets.last().map_or(self.line, |(_, line)| *line);
                return Err(self.error_at(SyntaxErrorKind::UnterminatedString, "Unclosed \"\"\"", line));
            }
        }

        self.emit(TokenKind::Eof, self.pos, self.line, self.column);
        Ok(())
    }

    // --- Literal text ---

    fn lex_data(&mut self) -> Result<(), SyntaxError> {
        let Some(tag) = self.find_tag_start(self.pos) else {
            let text: String = self.chars[self.pos..].iter().collect();
            self.push_text(text, self.chars.len());
            return Ok(());
        };

        let text: String = self.chars[self.pos..tag].iter().collect();
        self.push_text(text, tag);

        match self.chars[tag + 1] {
            '#' => self.lex_comment(),
            '%' => {
                if let Some(end) = self.match_named_tag(tag, "verbatim") {
                    self.lex_verbatim(end)
                } else {
                    self.open_tag(TokenKind::BlockStart, State::Block);
                    Ok(())
                }
            }
            _ => {
                self.open_tag(TokenKind::VarStart, State::Var);
                Ok(())
            }
        }
    }

    fn push_text(&mut self, text: String, end: usize) {
        let (start, line, column) = (self.pos, self.line, self.column);
        self.advance_to(end);
        if !text.is_empty() {
            self.emit(TokenKind::Text(text), start, line, column);
        }
    }

    fn open_tag(&mut self, kind: TokenKind, state: State) {
        let (start, line, column) = (self.pos, self.line, self.column);
        self.advance_to(self.pos + 2);
        if matches!(self.peek(), '-' | '~') {
            self.advance();
        }
        self.tag_line = line;
        self.emit(kind, start, line, column);
        self.states.push(state);
    }

    fn lex_comment(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let Some(end) = self.find(&['#', '}'], self.pos + 2) else {
            return Err(self.error(SyntaxErrorKind::UnterminatedTag, "Unclosed comment"));
        };
        let mut content = &self.chars[self.pos + 2..end];
        if let [first, rest @ ..] = content {
            if matches!(first, '-' | '~') {
                content = rest;
            }
        }
        if let [rest @ .., last] = content {
            if matches!(last, '-' | '~') {
                content = rest;
            }
        }
        let text: String = content.iter().collect();
        self.advance_to(end + 2);
        self.emit(TokenKind::Comment(text), start, line, column);
        Ok(())
    }

    /// `verbatim_end` is the position right after the opening `{% verbatim %}`.
    fn lex_verbatim(&mut self, verbatim_end: usize) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let mut search = verbatim_end;
        let (content_end, tag_end) = loop {
            let Some(candidate) = self.find(&['{', '%'], search) else {
                return Err(self.error(SyntaxErrorKind::UnterminatedTag, "Unclosed \"verbatim\" block"));
            };
            if let Some(end) = self.match_named_tag(candidate, "endverbatim") {
                break (candidate, end);
            }
            search = candidate + 1;
        };
        let raw: String = self.chars[verbatim_end..content_end].iter().collect();
        self.advance_to(tag_end);
        self.emit(TokenKind::Verbatim(raw), start, line, column);
        Ok(())
    }

    // --- Code inside {% %} and {{ }} ---

    fn lex_tag_body(&mut self, state: State) -> Result<(), SyntaxError> {
        let closer = if state == State::Block { '%' } else { '}' };
        if self.brackets.is_empty() {
            if let Some(end) = self.match_tag_end(closer) {
                let (start, line, column) = (self.pos, self.line, self.column);
                self.advance_to(end);
                let kind = if state == State::Block {
                    TokenKind::BlockEnd
                } else {
                    TokenKind::VarEnd
                };
                self.emit(kind, start, line, column);
                self.states.pop();
                return Ok(());
            }
        }
        self.lex_expression()
    }

    fn lex_expression(&mut self) -> Result<(), SyntaxError> {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
        if self.is_at_end() {
            return Ok(());
        }

        let (start, line, column) = (self.pos, self.line, self.column);
        let ch = self.peek();

        if ch == '=' && self.peek_next() == '>' {
            self.advance_to(self.pos + 2);
            self.emit(TokenKind::Arrow, start, line, column);
            return Ok(());
        }

        if let Some((end, operator)) = self.match_operator() {
            self.advance_to(end);
            self.emit(TokenKind::Operator(operator), start, line, column);
            return Ok(());
        }

        match ch {
            c if is_name_start(c) => {
                let mut end = self.pos + 1;
                while end < self.chars.len() && is_name_char(self.chars[end]) {
                    end += 1;
                }
                let name: String = self.chars[self.pos..end].iter().collect();
                self.advance_to(end);
                self.emit(TokenKind::Name(name), start, line, column);
                Ok(())
            }
            '0'..='9' => self.scan_number(),
            '(' | '[' | '{' => {
                let bracket = match ch {
                    '(' => Bracket::Paren,
                    '[' => Bracket::Square,
                    _ => Bracket::Curly,
                };
                self.brackets.push((bracket, line));
                self.advance();
                self.emit(TokenKind::Punctuation(ch), start, line, column);
                Ok(())
            }
            ')' | ']' | '}' => {
                let Some((open, open_line)) = self.brackets.pop() else {
                    return Err(self.error(SyntaxErrorKind::UnexpectedCharacter, format!("Unexpected \"{ch}\"")));
                };
                let expected = match ch {
                    ')' => Bracket::Paren,
                    ']' => Bracket::Square,
                    _ => Bracket::Curly,
                };
                if open != expected {
                    return Err(self.error_at(
                        SyntaxErrorKind::UnexpectedCharacter,
                        format!("Unclosed \"{}\"", open.symbol()),
                        open_line,
                    ));
                }
                self.advance();
                self.emit(TokenKind::Punctuation(ch), start, line, column);
                Ok(())
            }
            '?' | ':' | '.' | ',' | '|' => {
                self.advance();
                self.emit(TokenKind::Punctuation(ch), start, line, column);
                Ok(())
            }
            '\'' => self.scan_single_quoted(),
            '"' => self.scan_double_quoted(),
            _ => Err(self.error(SyntaxErrorKind::UnexpectedCharacter, format!("Unexpected character \"{ch}\""))),
        }
    }

    fn scan_number(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let digits = |chars: &[char], mut i: usize| {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            i
        };
        let mut end = digits(&self.chars, self.pos);
        let mut is_float = false;
        if self.char_at(end) == '.' && self.char_at(end + 1).is_ascii_digit() {
            end = digits(&self.chars, end + 1);
            is_float = true;
        }
        if matches!(self.char_at(end), 'e' | 'E') {
            let mut exp = end + 1;
            if matches!(self.char_at(exp), '+' | '-') {
                exp += 1;
            }
            if self.char_at(exp).is_ascii_digit() {
                end = digits(&self.chars, exp);
                is_float = true;
            }
        }

        let text: String = self.chars[self.pos..end].iter().collect();
        let number = match (is_float, text.parse::<i64>()) {
            (false, Ok(n)) => Number::Int(n),
            _ => Number::Float(text.parse::<f64>().map_err(|_| {
                self.error(SyntaxErrorKind::UnexpectedCharacter, format!("Invalid number \"{text}\""))
            })?),
        };
        self.advance_to(end);
        self.emit(TokenKind::Number(number), start, line, column);
        Ok(())
    }

    fn scan_single_quoted(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let Some(end) = self.find_string_end(self.pos + 1, '\'', false) else {
            return Err(self.error(SyntaxErrorKind::UnterminatedString, "Unclosed \"'\""));
        };
        let raw: String = self.chars[self.pos + 1..end].iter().collect();
        self.advance_to(end + 1);
        self.emit(TokenKind::String(unescape(&raw)), start, line, column);
        Ok(())
    }

    fn scan_double_quoted(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        // A string without `#` needs no interpolation handling.
        if let Some(end) = self.find_string_end(self.pos + 1, '"', true) {
            let raw: String = self.chars[self.pos + 1..end].iter().collect();
            self.advance_to(end + 1);
            self.emit(TokenKind::String(unescape(&raw)), start, line, column);
            return Ok(());
        }
        self.brackets.push((Bracket::Quote, line));
        self.advance();
        self.states.push(State::String);
        Ok(())
    }

    // --- Double-quoted strings with interpolation ---

    fn lex_string(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column);

        if self.peek() == '#' && self.peek_next() == '{' {
            self.brackets.push((Bracket::Interpolation, line));
            self.advance_to(self.pos + 2);
            while !self.is_at_end() && self.peek().is_whitespace() {
                self.advance();
            }
            self.emit(TokenKind::InterpolationStart, start, line, column);
            self.states.push(State::Interpolation);
            return Ok(());
        }

        if self.peek() == '"' {
            self.brackets.pop();
            self.advance();
            self.states.pop();
            return Ok(());
        }

        let mut end = self.pos;
        while end < self.chars.len() {
            match self.chars[end] {
                '"' => break,
                '\\' => end += 2,
                '#' if self.char_at(end + 1) == '{' => break,
                _ => end += 1,
            }
        }
        let end = end.min(self.chars.len());
        let raw: String = self.chars[self.pos..end].iter().collect();
        self.advance_to(end);
        self.emit(TokenKind::String(unescape(&raw)), start, line, column);
        Ok(())
    }

    fn lex_interpolation(&mut self) -> Result<(), SyntaxError> {
        if matches!(self.brackets.last(), Some((Bracket::Interpolation, _))) {
            let mut end = self.pos;
            while end < self.chars.len() && self.chars[end].is_whitespace() {
                end += 1;
            }
            if self.char_at(end) == '}' {
                self.advance_to(end);
                let (start, line, column) = (self.pos, self.line, self.column);
                self.advance();
                self.brackets.pop();
                self.emit(TokenKind::InterpolationEnd, start, line, column);
                self.states.pop();
                return Ok(());
            }
        }
        self.lex_expression()
    }

    // --- Matching helpers ---

    /// Position of the next `{{`, `{%` or `{#` at or after `from`.
    fn find_tag_start(&self, from: usize) -> Option<usize> {
        (from..self.chars.len().saturating_sub(1))
            .find(|&i| self.chars[i] == '{' && matches!(self.chars[i + 1], '{' | '%' | '#'))
    }

    /// Position of the first occurrence of the two-char `pair` at or after `from`.
    fn find(&self, pair: &[char; 2], from: usize) -> Option<usize> {
        (from..self.chars.len().saturating_sub(1))
            .find(|&i| self.chars[i] == pair[0] && self.chars[i + 1] == pair[1])
    }

    /// Index of the closing quote, honoring backslash escapes. With
    /// `reject_hash` any `#` disqualifies the fast path.
    fn find_string_end(&self, from: usize, quote: char, reject_hash: bool) -> Option<usize> {
        let mut i = from;
        while i < self.chars.len() {
            match self.chars[i] {
                '\\' => i += 2,
                '#' if reject_hash => return None,
                c if c == quote => return Some(i),
                _ => i += 1,
            }
        }
        None
    }

    /// Match `{%[-~]? name [-~]?%}` at `at`, returning the position after it.
    fn match_named_tag(&self, at: usize, name: &str) -> Option<usize> {
        if self.char_at(at) != '{' || self.char_at(at + 1) != '%' {
            return None;
        }
        let mut i = at + 2;
        if matches!(self.char_at(i), '-' | '~') {
            i += 1;
        }
        i = self.skip_whitespace_from(i);
        for expected in name.chars() {
            if self.char_at(i) != expected {
                return None;
            }
            i += 1;
        }
        if is_name_char(self.char_at(i)) {
            return None;
        }
        i = self.skip_whitespace_from(i);
        if matches!(self.char_at(i), '-' | '~') {
            i += 1;
        }
        (self.char_at(i) == '%' && self.char_at(i + 1) == '}').then_some(i + 2)
    }

    /// Match `\s*[-~]?` followed by `closer}` at the cursor.
    fn match_tag_end(&self, closer: char) -> Option<usize> {
        let mut i = self.skip_whitespace_from(self.pos);
        if matches!(self.char_at(i), '-' | '~') {
            i += 1;
        }
        (self.char_at(i) == closer && self.char_at(i + 1) == '}').then_some(i + 2)
    }

    /// Longest operator at the cursor, normalized to single spaces.
    fn match_operator(&self) -> Option<(usize, String)> {
        let previous = self.pos.checked_sub(1).map(|i| self.chars[i]);
        for op in &self.operators {
            let starts_alpha = op.first().is_some_and(|c| c.is_ascii_alphabetic());
            let ends_alpha = op.last().is_some_and(|c| c.is_ascii_alphabetic());
            if starts_alpha && matches!(previous, Some('.' | '|')) {
                continue;
            }
            let Some(end) = self.match_operator_chars(op) else {
                continue;
            };
            if ends_alpha && !matches!(self.char_at(end), c if c.is_whitespace() || matches!(c, '(' | ')' | '[' | '{'))
            {
                continue;
            }
            return Some((end, op.iter().collect()));
        }
        None
    }

    fn match_operator_chars(&self, op: &[char]) -> Option<usize> {
        let mut i = self.pos;
        for &c in op {
            if c == ' ' {
                if !self.char_at(i).is_whitespace() {
                    return None;
                }
                i = self.skip_whitespace_from(i);
            } else if self.char_at(i) == c {
                i += 1;
            } else {
                return None;
            }
        }
        Some(i)
    }

    // --- Helpers ---

    fn state(&self) -> State {
        self.states.last().copied().unwrap_or(State::Data)
    }

    fn emit(&mut self, kind: TokenKind, start: usize, line: usize, column: usize) {
        let span = Span::new(start, self.pos, line, column);
        self.tokens.push(Token::new(kind, span));
    }

    fn skip_whitespace_from(&self, mut i: usize) -> usize {
        while i < self.chars.len() && self.chars[i].is_whitespace() {
            i += 1;
        }
        i
    }

    fn char_at(&self, i: usize) -> char {
        self.chars.get(i).copied().unwrap_or('\0')
    }

    fn peek(&self) -> char {
        self.char_at(self.pos)
    }

    fn peek_next(&self) -> char {
        self.char_at(self.pos + 1)
    }

    fn advance(&mut self) {
        if let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_to(&mut self, target: usize) {
        while self.pos < target && !self.is_at_end() {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, kind: SyntaxErrorKind, message: impl Into<String>) -> SyntaxError {
        self.error_at(kind, message, self.line)
    }

    fn error_at(&self, kind: SyntaxErrorKind, message: impl Into<String>, line: usize) -> SyntaxError {
        SyntaxError::new(kind, message, line, &self.source)
    }
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || (!c.is_ascii() && c != '\0')
}

/// Resolve C-style escapes the way PHP's `stripcslashes` does.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            break;
        };
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'v' => out.push('\u{0b}'),
            'f' => out.push('\u{0c}'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'e' => out.push('\u{1b}'),
            'x' if chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) => {
                let mut value = 0u32;
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value & 0xff));
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OPERATORS: &[&str] = &[
        "=", "not", "-", "+", "or", "and", "b-or", "b-xor", "b-and", "==", "!=", "<=>", "<",
        ">", ">=", "<=", "not in", "in", "matches", "starts with", "ends with", "..", "~", "*",
        "/", "//", "%", "is", "is not", "**", "??",
    ];

    fn source(code: &str) -> Arc<Source> {
        Arc::new(Source::new(code, "test"))
    }

    /// Helper: tokenize and return token kinds (ignoring spans).
    fn kinds(code: &str) -> Vec<TokenKind> {
        Scanner::tokenize(source(code), OPERATORS)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    /// Helper: tokenize and panic on error.
    fn tokens(code: &str) -> Vec<Token> {
        Scanner::tokenize(source(code), OPERATORS).unwrap()
    }

    fn error(code: &str) -> SyntaxError {
        Scanner::tokenize(source(code), OPERATORS).unwrap_err()
    }

    fn name(n: &str) -> TokenKind {
        TokenKind::Name(n.into())
    }

    fn op(o: &str) -> TokenKind {
        TokenKind::Operator(o.into())
    }

    fn string(s: &str) -> TokenKind {
        TokenKind::String(s.into())
    }

    // =========================================================================
    // Text and delimiters
    // =========================================================================

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            kinds("<p>hello</p>\n"),
            vec![TokenKind::Text("<p>hello</p>\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_print_tag() {
        assert_eq!(
            kinds("a{{ name }}b"),
            vec![
                TokenKind::Text("a".into()),
                TokenKind::VarStart,
                name("name"),
                TokenKind::VarEnd,
                TokenKind::Text("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_block_tag_keeps_following_newline() {
        assert_eq!(
            kinds("{% if x %}\nyes"),
            vec![
                TokenKind::BlockStart,
                name("if"),
                name("x"),
                TokenKind::BlockEnd,
                TokenKind::Text("\nyes".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_whitespace_control_markers() {
        assert_eq!(
            kinds("{%- set a = 1 -%}{{~ a ~}}"),
            vec![
                TokenKind::BlockStart,
                name("set"),
                name("a"),
                op("="),
                TokenKind::Number(Number::Int(1)),
                TokenKind::BlockEnd,
                TokenKind::VarStart,
                name("a"),
                TokenKind::VarEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_token() {
        assert_eq!(
            kinds("{#- note -#}x"),
            vec![
                TokenKind::Comment(" note ".into()),
                TokenKind::Text("x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_verbatim_block() {
        assert_eq!(
            kinds("{% verbatim %}{{ raw }}{% endverbatim %}!"),
            vec![
                TokenKind::Verbatim("{{ raw }}".into()),
                TokenKind::Text("!".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_hash_inside_print_closes_on_outer_braces() {
        assert_eq!(
            kinds("{{ {a: 1}}}"),
            vec![
                TokenKind::VarStart,
                TokenKind::Punctuation('{'),
                name("a"),
                TokenKind::Punctuation(':'),
                TokenKind::Number(Number::Int(1)),
                TokenKind::Punctuation('}'),
                TokenKind::VarEnd,
                TokenKind::Eof,
            ]
        );
    }

    // =========================================================================
    // Operators, names and numbers
    // =========================================================================

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("{{ a == b ?? c // d }}")[1..8].to_vec(),
            vec![name("a"), op("=="), name("b"), op("??"), name("c"), op("//"), name("d")]
        );
    }

    #[test]
    fn test_word_operators_with_inner_whitespace() {
        assert_eq!(
            kinds("{{ a not   in b }}")[1..4].to_vec(),
            vec![name("a"), op("not in"), name("b")]
        );
        assert_eq!(
            kinds("{{ a starts with 'x' }}")[1..4].to_vec(),
            vec![name("a"), op("starts with"), string("x")]
        );
    }

    #[test]
    fn test_word_operator_prefix_is_a_name() {
        assert_eq!(
            kinds("{{ index or notice }}")[1..4].to_vec(),
            vec![name("index"), op("or"), name("notice")]
        );
    }

    #[test]
    fn test_word_operator_after_dot_is_a_name() {
        assert_eq!(
            kinds("{{ a.and }}")[1..4].to_vec(),
            vec![name("a"), TokenKind::Punctuation('.'), name("and")]
        );
    }

    #[test]
    fn test_arrow() {
        assert_eq!(
            kinds("{{ x => x }}")[1..4].to_vec(),
            vec![name("x"), TokenKind::Arrow, name("x")]
        );
    }

    #[test]
    fn test_numbers_keep_int_and_float_apart() {
        assert_eq!(
            kinds("{{ 42 4.5 1e3 }}")[1..4].to_vec(),
            vec![
                TokenKind::Number(Number::Int(42)),
                TokenKind::Number(Number::Float(4.5)),
                TokenKind::Number(Number::Float(1000.0)),
            ]
        );
    }

    #[test]
    fn test_range_between_integers() {
        assert_eq!(
            kinds("{{ 1..5 }}")[1..4].to_vec(),
            vec![
                TokenKind::Number(Number::Int(1)),
                op(".."),
                TokenKind::Number(Number::Int(5)),
            ]
        );
    }

    // =========================================================================
    // Strings
    // =========================================================================

    #[test]
    fn test_single_quoted_escapes() {
        assert_eq!(kinds(r"{{ 'it\'s\n' }}")[1], string("it's\n"));
    }

    #[test]
    fn test_double_quoted_without_interpolation() {
        assert_eq!(kinds(r#"{{ "a#b" }}"#)[1..3].to_vec(), vec![string("a#b"), TokenKind::VarEnd]);
        assert_eq!(kinds(r#"{{ "" }}"#)[1], string(""));
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            kinds(r#"{{ "Hi #{ user.name }!" }}"#),
            vec![
                TokenKind::VarStart,
                string("Hi "),
                TokenKind::InterpolationStart,
                name("user"),
                TokenKind::Punctuation('.'),
                name("name"),
                TokenKind::InterpolationEnd,
                string("!"),
                TokenKind::VarEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unescape_octal_and_hex() {
        assert_eq!(unescape(r"\101\x42\q"), "ABq");
    }

    // =========================================================================
    // Positions
    // =========================================================================

    #[test]
    fn test_token_lines() {
        let toks = tokens("a\n{{ b }}\n\n{% c %}");
        let lines: Vec<usize> = toks.iter().map(|t| t.line()).collect();
        assert_eq!(lines, vec![1, 2, 2, 2, 2, 4, 4, 4, 4]);
    }

    #[test]
    fn test_token_columns() {
        let toks = tokens("ab{{ c }}");
        assert_eq!(toks[1].span.column, 3);
        assert_eq!(toks[2].span.column, 6);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unclosed_variable() {
        let err = error("{{ a ");
        assert_eq!(err.kind, SyntaxErrorKind::UnterminatedTag);
        assert_eq!(err.message, "Unclosed \"variable\"");
    }

    #[test]
    fn test_unclosed_block_reports_tag_line() {
        let err = error("x\n{% if a\n\n");
        assert_eq!(err.message, "Unclosed \"block\"");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unclosed_comment() {
        assert_eq!(error("{# oops").kind, SyntaxErrorKind::UnterminatedTag);
    }

    #[test]
    fn test_unclosed_string() {
        let err = error("{{ \"abc #{ x }");
        assert_eq!(err.kind, SyntaxErrorKind::UnterminatedString);
        assert_eq!(error("{{ 'abc }}").kind, SyntaxErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unexpected_character() {
        let err = error("{{ a @ b }}");
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedCharacter);
        assert_eq!(err.message, "Unexpected character \"@\"");
    }

    #[test]
    fn test_mismatched_bracket() {
        let err = error("{{ (a] }}");
        assert_eq!(err.message, "Unclosed \"(\"");
    }

    #[test]
    fn test_closing_bracket_without_opener() {
        assert_eq!(error("{{ a) }}").message, "Unexpected \")\"");
    }
}
