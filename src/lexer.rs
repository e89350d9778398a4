//! Character stream → token stream.
//!
//! The lexer keeps everything the formatter and the renamers need later:
//! byte spans, 1-based line/column positions, comments as ordinary tokens,
//! and the raw lexeme text next to a canonical form (lowercase for keywords
//! and unquoted identifiers, the unescaped inner text for quoted identifiers
//! and comments).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Span};
use crate::keywords;

/// 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentQuote {
    Double,
    Backtick,
    Bracket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword,
    Ident,
    QuotedIdent(IdentQuote),
    Number,
    /// Single-quoted or dollar-quoted string; `text` is the raw lexeme
    /// including delimiters.
    String,
    /// Prefixed string such as `E'…'`; the prefix letter is kept in `text`.
    TypedString,
    /// `:name`; `canonical` holds the bare name.
    NamedParam,
    /// `$1`; `canonical` holds the digits.
    IndexedParam,
    Operator,
    Symbol,
    LineComment,
    BlockComment,
    Newline,
    Whitespace,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme exactly as it appears in the source.
    pub text: String,
    /// Normalized form: lowercase for keywords and unquoted identifiers,
    /// unescaped inner text for quoted identifiers and comments, the bare
    /// name for parameters; equal to `text` otherwise.
    pub canonical: String,
    pub span: Span,
    pub start: Position,
    pub end: Position,
}

impl Token {
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.canonical == kw
    }

    pub fn is_symbol(&self, s: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == s
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::QuotedIdent(_))
    }

    /// Tokens the parser consumes; comments and layout are carried around
    /// them.
    pub fn is_significant(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
        )
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Mode flags; the defaults are the PostgreSQL-flavored behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexerMode {
    /// Allow `/* /* */ */`.
    pub nested_block_comments: bool,
    /// Lex `[name]` as an identifier (SQL Server). When off, brackets are
    /// symbols so `array[1, 2]` works.
    pub bracket_identifiers: bool,
}

pub struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    src_len: usize,
    pos: usize,
    line: usize,
    column: usize,
    mode: LexerMode,
    _src: &'a str,
}

/// Multi-character operators, longest first so that `->>` wins over `->`.
const OPERATORS: &[&str] = &["->>", "->", "::", "||", "<=", ">=", "<>", "!="];
const SINGLE_OPERATORS: &str = "=<>+-*/%^";
const SYMBOLS: &str = "(),;.:$[]";

pub fn tokenize(src: &str) -> Result<Vec<Token>, Error> {
    Lexer::new(src).tokenize()
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.char_indices().collect(),
            src_len: src.len(),
            pos: 0,
            line: 1,
            column: 1,
            mode: LexerMode::default(),
            _src: src,
        }
    }

    pub fn with_mode(mut self, mode: LexerMode) -> Self {
        self.mode = mode;
        self
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.src_len)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Does the remaining input start with `s`?
    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump_str(&mut self, s: &str) {
        for _ in s.chars() {
            self.bump();
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        while self.peek().is_some() {
            tokens.push(self.next_token()?);
        }
        let end = self.position();
        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            canonical: String::new(),
            span: Span {
                start: self.src_len,
                end: self.src_len,
            },
            start: end,
            end,
        });
        Ok(tokens)
    }

    fn token(
        &self,
        kind: TokenKind,
        text: String,
        canonical: String,
        start_offset: usize,
        start: Position,
    ) -> Token {
        Token {
            kind,
            text,
            canonical,
            span: Span {
                start: start_offset,
                end: self.offset(),
            },
            start,
            end: self.position(),
        }
    }

    fn next_token(&mut self) -> Result<Token, Error> {
        let start_offset = self.offset();
        let start = self.position();
        let c = self.peek().unwrap();

        // layout
        if c == '\n' {
            self.bump();
            return Ok(self.token(
                TokenKind::Newline,
                "\n".into(),
                "\n".into(),
                start_offset,
                start,
            ));
        }
        if c == '\r' && self.peek_at(1) == Some('\n') {
            self.bump();
            self.bump();
            return Ok(self.token(
                TokenKind::Newline,
                "\r\n".into(),
                "\r\n".into(),
                start_offset,
                start,
            ));
        }
        if c.is_whitespace() {
            let mut text = String::new();
            while let Some(w) = self.peek() {
                if w.is_whitespace() && w != '\n' && !(w == '\r' && self.peek_at(1) == Some('\n')) {
                    text.push(w);
                    self.bump();
                } else {
                    break;
                }
            }
            let canonical = text.clone();
            return Ok(self.token(
                TokenKind::Whitespace,
                text,
                canonical,
                start_offset,
                start,
            ));
        }

        // comments
        if c == '-' && self.peek_at(1) == Some('-') {
            self.bump();
            self.bump();
            let mut body = String::new();
            while let Some(ch) = self.peek() {
                if ch == '\n' || (ch == '\r' && self.peek_at(1) == Some('\n')) {
                    break;
                }
                body.push(ch);
                self.bump();
            }
            let canonical = body.trim().to_string();
            return Ok(self.token(
                TokenKind::LineComment,
                format!("--{body}"),
                canonical,
                start_offset,
                start,
            ));
        }
        if c == '/' && self.peek_at(1) == Some('*') {
            return self.block_comment(start_offset, start);
        }

        // strings
        if c == '\'' {
            return self.quoted_string(start_offset, start, '\'', false, None);
        }
        if c.is_ascii_alphabetic()
            && self.peek_at(1) == Some('\'')
            && matches!(c.to_ascii_lowercase(), 'e' | 'b' | 'x' | 'n')
        {
            let prefix = c;
            self.bump();
            // E'…' allows backslash escapes; the other prefixes do not.
            let backslash = prefix.to_ascii_lowercase() == 'e';
            return self.quoted_string(start_offset, start, '\'', backslash, Some(prefix));
        }

        // quoted identifiers
        if c == '"' {
            return self.quoted_ident(start_offset, start, '"', IdentQuote::Double);
        }
        if c == '`' {
            return self.quoted_ident(start_offset, start, '`', IdentQuote::Backtick);
        }
        if c == '[' && self.mode.bracket_identifiers {
            return self.bracket_ident(start_offset, start);
        }

        // parameters and dollar strings
        if c == ':' {
            if self.starts_with("::") {
                self.bump_str("::");
                return Ok(self.token(
                    TokenKind::Operator,
                    "::".into(),
                    "::".into(),
                    start_offset,
                    start,
                ));
            }
            if self
                .peek_at(1)
                .map(|n| n.is_ascii_alphanumeric() || n == '_')
                .unwrap_or(false)
            {
                self.bump();
                let name = self.ident_body();
                return Ok(self.token(
                    TokenKind::NamedParam,
                    format!(":{name}"),
                    name,
                    start_offset,
                    start,
                ));
            }
            self.bump();
            return Ok(self.token(
                TokenKind::Symbol,
                ":".into(),
                ":".into(),
                start_offset,
                start,
            ));
        }
        if c == '$' {
            if self.peek_at(1).map(|n| n.is_ascii_digit()).unwrap_or(false) {
                self.bump();
                let mut digits = String::new();
                while let Some(d) = self.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        self.bump();
                    } else {
                        break;
                    }
                }
                return Ok(self.token(
                    TokenKind::IndexedParam,
                    format!("${digits}"),
                    digits,
                    start_offset,
                    start,
                ));
            }
            if let Some(tag_len) = self.dollar_tag_len() {
                return self.dollar_string(start_offset, start, tag_len);
            }
            self.bump();
            return Ok(self.token(
                TokenKind::Symbol,
                "$".into(),
                "$".into(),
                start_offset,
                start,
            ));
        }

        // numbers
        if c.is_ascii_digit() {
            return Ok(self.number(start_offset, start));
        }

        // words
        if c.is_alphabetic() || c == '_' {
            let word = self.ident_body();
            let lower = word.to_ascii_lowercase();
            let kind = if keywords::is_keyword(&lower) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            return Ok(self.token(kind, word, lower, start_offset, start));
        }

        // operators
        for op in OPERATORS {
            if self.starts_with(op) {
                self.bump_str(op);
                return Ok(self.token(
                    TokenKind::Operator,
                    (*op).into(),
                    (*op).into(),
                    start_offset,
                    start,
                ));
            }
        }
        if SINGLE_OPERATORS.contains(c) {
            self.bump();
            let text = c.to_string();
            return Ok(self.token(
                TokenKind::Operator,
                text.clone(),
                text,
                start_offset,
                start,
            ));
        }
        if SYMBOLS.contains(c) {
            self.bump();
            let text = c.to_string();
            return Ok(self.token(TokenKind::Symbol, text.clone(), text, start_offset, start));
        }

        Err(Error::lex(format!("unexpected character `{c}`")).with_span(Some(Span {
            start: start_offset,
            end: start_offset + c.len_utf8(),
        })))
    }

    fn ident_body(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                word.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn number(&mut self, start_offset: usize, start: Position) -> Token {
        let mut text = String::new();
        while let Some(d) = self.peek() {
            if d.is_ascii_digit() {
                text.push(d);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).map(|d| d.is_ascii_digit()).unwrap_or(false)
        {
            text.push('.');
            self.bump();
            while let Some(d) = self.peek() {
                if d.is_ascii_digit() {
                    text.push(d);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_at(digit_at)
                .map(|d| d.is_ascii_digit())
                .unwrap_or(false)
            {
                text.push(self.bump().unwrap());
                if sign {
                    text.push(self.bump().unwrap());
                }
                while let Some(d) = self.peek() {
                    if d.is_ascii_digit() {
                        text.push(d);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        let canonical = text.clone();
        self.token(TokenKind::Number, text, canonical, start_offset, start)
    }

    fn quoted_string(
        &mut self,
        start_offset: usize,
        start: Position,
        quote: char,
        backslash_escapes: bool,
        prefix: Option<char>,
    ) -> Result<Token, Error> {
        let mut text = String::new();
        if let Some(p) = prefix {
            text.push(p);
        }
        text.push(quote);
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None => {
                    return Err(Error::lex("unterminated string literal").with_span(Some(
                        Span {
                            start: start_offset,
                            end: start_offset + 1,
                        },
                    )))
                }
                Some(ch) if ch == quote => {
                    if self.peek_at(1) == Some(quote) {
                        text.push(quote);
                        text.push(quote);
                        self.bump();
                        self.bump();
                    } else {
                        text.push(quote);
                        self.bump();
                        break;
                    }
                }
                Some('\\') if backslash_escapes => {
                    text.push('\\');
                    self.bump();
                    if let Some(esc) = self.bump() {
                        text.push(esc);
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    self.bump();
                }
            }
        }
        let kind = if prefix.is_some() {
            TokenKind::TypedString
        } else {
            TokenKind::String
        };
        let canonical = text.clone();
        Ok(self.token(kind, text, canonical, start_offset, start))
    }

    /// Length in chars of a `$tag$` opener at the cursor, if present.
    fn dollar_tag_len(&self) -> Option<usize> {
        debug_assert_eq!(self.peek(), Some('$'));
        let mut i = 1;
        loop {
            match self.peek_at(i) {
                Some('$') => return Some(i + 1),
                Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => i += 1,
                _ => return None,
            }
        }
    }

    fn dollar_string(
        &mut self,
        start_offset: usize,
        start: Position,
        tag_len: usize,
    ) -> Result<Token, Error> {
        let tag: String = (0..tag_len)
            .map(|i| self.peek_at(i).unwrap())
            .collect();
        let mut text = String::new();
        self.bump_str(&tag);
        text.push_str(&tag);
        loop {
            if self.peek().is_none() {
                return Err(
                    Error::lex("unterminated dollar-quoted string").with_span(Some(Span {
                        start: start_offset,
                        end: start_offset + tag.len(),
                    })),
                );
            }
            if self.starts_with(&tag) {
                self.bump_str(&tag);
                text.push_str(&tag);
                break;
            }
            text.push(self.bump().unwrap());
        }
        let canonical = text.clone();
        Ok(self.token(TokenKind::String, text, canonical, start_offset, start))
    }

    fn quoted_ident(
        &mut self,
        start_offset: usize,
        start: Position,
        quote: char,
        style: IdentQuote,
    ) -> Result<Token, Error> {
        let mut text = String::new();
        let mut inner = String::new();
        text.push(quote);
        self.bump();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::lex("unterminated quoted identifier").with_span(Some(
                        Span {
                            start: start_offset,
                            end: start_offset + 1,
                        },
                    )))
                }
                Some(ch) if ch == quote => {
                    if self.peek_at(1) == Some(quote) {
                        text.push(quote);
                        text.push(quote);
                        inner.push(quote);
                        self.bump();
                        self.bump();
                    } else {
                        text.push(quote);
                        self.bump();
                        break;
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    inner.push(ch);
                    self.bump();
                }
            }
        }
        Ok(self.token(
            TokenKind::QuotedIdent(style),
            text,
            inner,
            start_offset,
            start,
        ))
    }

    fn bracket_ident(&mut self, start_offset: usize, start: Position) -> Result<Token, Error> {
        let mut text = String::from("[");
        let mut inner = String::new();
        self.bump();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::lex("unterminated quoted identifier").with_span(Some(
                        Span {
                            start: start_offset,
                            end: start_offset + 1,
                        },
                    )))
                }
                Some(']') => {
                    text.push(']');
                    self.bump();
                    break;
                }
                Some(ch) => {
                    text.push(ch);
                    inner.push(ch);
                    self.bump();
                }
            }
        }
        Ok(self.token(
            TokenKind::QuotedIdent(IdentQuote::Bracket),
            text,
            inner,
            start_offset,
            start,
        ))
    }

    fn block_comment(&mut self, start_offset: usize, start: Position) -> Result<Token, Error> {
        let mut text = String::from("/*");
        let mut body = String::new();
        self.bump_str("/*");
        let mut depth = 1usize;
        loop {
            if self.peek().is_none() {
                return Err(
                    Error::lex("unterminated block comment").with_span(Some(Span {
                        start: start_offset,
                        end: start_offset + 2,
                    })),
                );
            }
            if self.starts_with("*/") {
                self.bump_str("*/");
                depth -= 1;
                if depth == 0 {
                    text.push_str("*/");
                    break;
                }
                text.push_str("*/");
                body.push_str("*/");
                continue;
            }
            if self.mode.nested_block_comments && self.starts_with("/*") {
                self.bump_str("/*");
                depth += 1;
                text.push_str("/*");
                body.push_str("/*");
                continue;
            }
            let ch = self.bump().unwrap();
            text.push(ch);
            body.push(ch);
        }
        let canonical = body.trim().to_string();
        Ok(self.token(
            TokenKind::BlockComment,
            text,
            canonical,
            start_offset,
            start,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql)
            .unwrap()
            .into_iter()
            .filter(|t| t.is_significant() && !t.is_eof())
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_preserve_original_casing() {
        let tokens = tokenize("SeLeCt id").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].text, "SeLeCt");
        assert_eq!(tokens[0].canonical, "select");
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = tokenize("select\n  id").unwrap();
        let id = tokens.iter().find(|t| t.canonical == "id").unwrap();
        assert_eq!(id.start, Position { line: 2, column: 3 });
        assert_eq!(id.span.start, 9);
    }

    #[test]
    fn doubled_quote_escapes() {
        let tokens = tokenize("'it''s' \"a\"\"b\"").unwrap();
        assert_eq!(tokens[0].text, "'it''s'");
        let ident = &tokens[2];
        assert_eq!(ident.kind, TokenKind::QuotedIdent(IdentQuote::Double));
        assert_eq!(ident.canonical, "a\"b");
    }

    #[test]
    fn dollar_quoting() {
        let tokens = tokenize("$tag$ hello 'world' $tag$").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "$tag$ hello 'world' $tag$");
    }

    #[test]
    fn parameters() {
        let tokens = tokenize(":name $2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::NamedParam);
        assert_eq!(tokens[0].canonical, "name");
        assert_eq!(tokens[2].kind, TokenKind::IndexedParam);
        assert_eq!(tokens[2].canonical, "2");
    }

    #[test]
    fn comments_keep_raw_text() {
        let tokens = tokenize("select 1 -- trailing\n/* block */").unwrap();
        let line = tokens.iter().find(|t| t.kind == TokenKind::LineComment).unwrap();
        assert_eq!(line.canonical, "trailing");
        let block = tokens.iter().find(|t| t.kind == TokenKind::BlockComment).unwrap();
        assert_eq!(block.canonical, "block");
    }

    #[test]
    fn unterminated_string_fails_with_position() {
        let err = tokenize("select 'oops").unwrap_err();
        assert_eq!(err.span.map(|s| s.start), Some(7));
    }

    #[test]
    fn scientific_numbers_stay_raw() {
        let tokens = tokenize("select 1.5e10, 9007199254740993").unwrap();
        assert_eq!(tokens[2].text, "1.5e10");
        let big = tokens.iter().find(|t| t.text == "9007199254740993");
        assert!(big.is_some());
    }

    #[test]
    fn typed_string_prefix() {
        let tokens = tokenize(r"E'a\'b'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::TypedString);
        assert_eq!(tokens[0].text, r"E'a\'b'");
    }

    #[test]
    fn cast_operator_vs_parameter() {
        assert_eq!(
            kinds("a::int"),
            vec![TokenKind::Ident, TokenKind::Operator, TokenKind::Ident]
        );
    }
}
