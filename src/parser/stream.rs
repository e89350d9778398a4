//! Cursor over the token stream.
//!
//! Comments are classified while the stream is built, using the nearest
//! non-whitespace neighbor rule: a comment on the same line as the previous
//! significant token trails it; anything else leads the next significant
//! token. The parser moves them onto AST nodes with the `take_*` methods;
//! whatever is never claimed is swept onto the root node at the end so no
//! comment is silently dropped.

use std::collections::HashMap;

use crate::ast::{attach_comment, CommentForm, CommentPosition, Comments};
use crate::error::{Error, Result, Span};
use crate::lexer::{Token, TokenKind};

pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    leading: HashMap<usize, Vec<(CommentForm, String)>>,
    trailing: HashMap<usize, Vec<(CommentForm, String)>>,
}

impl TokenStream {
    pub fn new(raw: Vec<Token>) -> Self {
        let mut tokens = Vec::new();
        let mut leading: HashMap<usize, Vec<(CommentForm, String)>> = HashMap::new();
        let mut trailing: HashMap<usize, Vec<(CommentForm, String)>> = HashMap::new();

        let mut last_sig: Option<usize> = None;
        let mut last_sig_on_line = false;
        for token in raw {
            match token.kind {
                TokenKind::Whitespace => {}
                TokenKind::Newline => last_sig_on_line = false,
                TokenKind::LineComment | TokenKind::BlockComment => {
                    let form = if token.kind == TokenKind::LineComment {
                        CommentForm::Line
                    } else {
                        CommentForm::Block
                    };
                    match last_sig {
                        Some(i) if last_sig_on_line => {
                            trailing.entry(i).or_default().push((form, token.canonical))
                        }
                        _ => leading
                            .entry(tokens.len())
                            .or_default()
                            .push((form, token.canonical)),
                    }
                }
                _ => {
                    last_sig = Some(tokens.len());
                    last_sig_on_line = true;
                    tokens.push(token);
                }
            }
        }

        TokenStream {
            tokens,
            pos: 0,
            leading,
            trailing,
        }
    }

    /// Index of the next significant token; used to claim its comments.
    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> &Token {
        self.token_at(self.pos)
    }

    pub fn peek_ahead(&self, n: usize) -> &Token {
        self.token_at(self.pos + n)
    }

    fn token_at(&self, i: usize) -> &Token {
        self.tokens
            .get(i.min(self.tokens.len().saturating_sub(1)))
            .expect("token stream always ends with Eof")
    }

    pub fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    pub fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_keyword(kw) {
            self.next();
            true
        } else {
            false
        }
    }

    /// Consume a multi-word keyword sequence, all or nothing.
    pub fn eat_keywords(&mut self, kws: &[&str]) -> bool {
        for (i, kw) in kws.iter().enumerate() {
            if !self.peek_ahead(i).is_keyword(kw) {
                return false;
            }
        }
        for _ in kws {
            self.next();
        }
        true
    }

    pub fn expect_keyword(&mut self, kw: &str) -> Result<Token, Error> {
        if self.peek().is_keyword(kw) {
            Ok(self.next())
        } else {
            Err(self.expected(&format!("`{}`", kw.to_uppercase())))
        }
    }

    pub fn eat_symbol(&mut self, s: &str) -> bool {
        if self.peek().is_symbol(s) {
            self.next();
            true
        } else {
            false
        }
    }

    pub fn expect_symbol(&mut self, s: &str) -> Result<Token, Error> {
        if self.peek().is_symbol(s) {
            Ok(self.next())
        } else {
            Err(self.expected(&format!("`{s}`")))
        }
    }

    pub fn eat_operator(&mut self, op: &str) -> bool {
        if self.peek().is_operator(op) {
            self.next();
            true
        } else {
            false
        }
    }

    fn found_text(&self) -> String {
        let token = self.peek();
        if token.is_eof() {
            "end of input".to_string()
        } else {
            format!("`{}`", token.text)
        }
    }

    pub fn expected(&self, expected: &str) -> Error {
        Error::expected(expected, &self.found_text()).with_span(Some(self.peek().span))
    }

    pub fn unexpected(&self) -> Error {
        Error::unexpected(&self.found_text()).with_span(Some(self.peek().span))
    }

    pub fn span_at(&self, index: usize) -> Span {
        self.token_at(index).span
    }

    /// Comments leading the token at `index`, as `before` annotations.
    pub fn take_leading(&mut self, index: usize) -> Comments {
        self.take_leading_as(index, CommentPosition::Before)
    }

    pub fn take_leading_as(&mut self, index: usize, position: CommentPosition) -> Comments {
        let mut out = Comments::new();
        if let Some(found) = self.leading.remove(&index) {
            for (form, text) in found {
                attach_comment(&mut out, position, form, text);
            }
        }
        out
    }

    /// Same-line comments trailing the token at `index`, as `after`
    /// annotations.
    pub fn take_trailing(&mut self, index: usize) -> Comments {
        let mut out = Comments::new();
        if let Some(found) = self.trailing.remove(&index) {
            for (form, text) in found {
                attach_comment(&mut out, CommentPosition::After, form, text);
            }
        }
        out
    }

    /// Trailing comments of the token just consumed.
    pub fn take_trailing_of_last(&mut self) -> Comments {
        if self.pos == 0 {
            return Comments::new();
        }
        self.take_trailing(self.pos - 1)
    }

    /// Everything not claimed during the parse; swept onto the root so the
    /// comment multiset is conserved.
    pub fn drain_unclaimed(&mut self) -> Comments {
        let mut entries: Vec<(usize, CommentPosition, Vec<(CommentForm, String)>)> = Vec::new();
        for (i, found) in self.leading.drain() {
            entries.push((i, CommentPosition::Before, found));
        }
        for (i, found) in self.trailing.drain() {
            entries.push((i, CommentPosition::After, found));
        }
        entries.sort_by_key(|(i, _, _)| *i);
        let mut out = Comments::new();
        for (_, position, found) in entries {
            for (form, text) in found {
                attach_comment(&mut out, position, form, text);
            }
        }
        out
    }
}
