//! The low-level emission surface: spacing, indentation, keyword casing,
//! identifier quoting, parameter slots and comment rendering. The gen_*
//! modules drive this; nothing here looks at the AST beyond leaf types.

use indexmap::IndexMap;

use super::{CommentStyle, FormatOptions, FormatResult, IdentifierEscape, KeywordCase, ListBreak,
            ParameterStyle};
use crate::ast::{CommentPosition, Comments, Ident, ParamValue, Parameter, PositionedComment};

pub struct SqlWriter<'a> {
    pub opts: &'a FormatOptions,
    out: String,
    indent: usize,
    /// When positive, `newline()` degrades to a single space; used by the
    /// *_one_line options and the one-line WITH styles.
    oneline_depth: usize,
    params: IndexMap<String, ParamValue>,
    param_index: IndexMap<String, usize>,
}

impl<'a> SqlWriter<'a> {
    pub fn new(opts: &'a FormatOptions) -> Self {
        SqlWriter {
            opts,
            out: String::new(),
            indent: 0,
            oneline_depth: 0,
            params: IndexMap::new(),
            param_index: IndexMap::new(),
        }
    }

    pub fn into_result(self) -> FormatResult {
        FormatResult {
            formatted_sql: self.out,
            params: self.params,
        }
    }

    pub fn multiline(&self) -> bool {
        self.opts.multiline() && self.oneline_depth == 0
    }

    fn needs_sep(&self) -> bool {
        match self.out.chars().last() {
            None => false,
            Some(c) => !c.is_whitespace() && c != '(' && c != '[',
        }
    }

    /// Space-separated text: keywords, identifiers, literals, operators.
    pub fn atom(&mut self, text: &str) {
        if self.needs_sep() {
            self.out.push(' ');
        }
        self.out.push_str(text);
    }

    /// Verbatim text with no separation: `(`, `)`, `,`, `.`, `::`.
    pub fn glue(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn kw(&mut self, word: &str) {
        let cased = self.case_keyword(word);
        self.atom(&cased);
    }

    /// Several keywords in a row, e.g. `group by`.
    pub fn kws(&mut self, words: &[&str]) {
        for word in words {
            self.kw(word);
        }
    }

    fn case_keyword(&self, word: &str) -> String {
        match self.opts.keyword_case {
            KeywordCase::Upper => word.to_uppercase(),
            KeywordCase::Lower | KeywordCase::Preserve => word.to_lowercase(),
        }
    }

    /// Raw keyword-ish text carried in the AST (booleans, NULL): `preserve`
    /// keeps it, the other cases normalize it.
    pub fn raw_keyword(&mut self, text: &str) {
        let cased = match self.opts.keyword_case {
            KeywordCase::Upper => text.to_uppercase(),
            KeywordCase::Lower => text.to_lowercase(),
            KeywordCase::Preserve => text.to_string(),
        };
        self.atom(&cased);
    }

    pub fn ident(&mut self, ident: &Ident) {
        let quoted = self.quote_ident(&ident.value);
        self.atom(&quoted);
    }

    /// An identifier fused to the preceding text (after a dot).
    pub fn ident_glued(&mut self, ident: &Ident) {
        let quoted = self.quote_ident(&ident.value);
        self.glue(&quoted);
    }

    pub fn quote_ident(&self, value: &str) -> String {
        match self.opts.identifier_escape {
            IdentifierEscape::Double => format!("\"{}\"", value.replace('"', "\"\"")),
            IdentifierEscape::Backtick => format!("`{}`", value.replace('`', "``")),
            IdentifierEscape::Bracket => format!("[{value}]"),
            IdentifierEscape::None => value.to_string(),
        }
    }

    /// Unquoted function names follow keyword casing (`COUNT` → `count`);
    /// quoted ones are identifiers.
    pub fn function_name(&mut self, name: &[Ident]) {
        for (i, part) in name.iter().enumerate() {
            if i > 0 {
                self.glue(".");
            }
            let text = if part.quote.is_some() {
                self.quote_ident(&part.value)
            } else {
                self.case_keyword(&part.value)
            };
            if i == 0 {
                self.atom(&text);
            } else {
                self.glue(&text);
            }
        }
    }

    /// Emit a parameter slot and record it in the parameter map. One map
    /// entry per unique name; a later bound value overwrites an earlier
    /// one (last-seen wins) but an unbound occurrence never erases a value.
    pub fn parameter(&mut self, p: &Parameter) {
        let next = self.param_index.len() + 1;
        let index = *self.param_index.entry(p.name.clone()).or_insert(next);
        let text = match self.opts.parameter_style {
            ParameterStyle::Named => format!("{}{}", self.opts.parameter_symbol, p.name),
            ParameterStyle::Indexed => format!("{}{}", self.opts.parameter_symbol, index),
            ParameterStyle::Anonymous => "?".to_string(),
        };
        self.atom(&text);
        match &p.value {
            Some(value) => {
                self.params.insert(p.name.clone(), value.clone());
            }
            None => {
                self.params.entry(p.name.clone()).or_insert(ParamValue::Null);
            }
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Line break plus indentation; a plain separator inside one-line
    /// regions.
    pub fn newline(&mut self) {
        if self.oneline_depth > 0 {
            if self.needs_sep() {
                self.out.push(' ');
            }
            return;
        }
        while self.out.ends_with(' ') {
            self.out.pop();
        }
        self.out.push_str(&self.opts.newline);
        for _ in 0..(self.indent * self.opts.indent_size) {
            self.out.push(self.opts.indent_char);
        }
    }

    pub fn begin_oneline(&mut self) {
        self.oneline_depth += 1;
    }

    pub fn end_oneline(&mut self) {
        self.oneline_depth = self.oneline_depth.saturating_sub(1);
    }

    /// The separator between two items of a comma list, honoring the given
    /// break mode. Called before every item except the first.
    pub fn comma_sep(&mut self, mode: ListBreak) {
        match mode {
            ListBreak::None => self.glue(","),
            ListBreak::After => {
                self.glue(",");
                self.newline();
            }
            ListBreak::Before => {
                self.newline();
                self.glue(", ");
            }
        }
    }

    // --- comments -------------------------------------------------------

    pub fn comments_at(&mut self, comments: &Comments, position: CommentPosition) {
        self.comments_at_ext(comments, position, false);
    }

    /// `allow_line` marks spots where the caller emits a newline right
    /// after, so smart mode may use `--` form.
    pub fn comments_at_ext(
        &mut self,
        comments: &Comments,
        position: CommentPosition,
        allow_line: bool,
    ) {
        if !self.opts.export_comment {
            return;
        }
        let groups: Vec<&PositionedComment> = comments
            .iter()
            .filter(|c| c.position == position)
            .collect();
        for group in groups {
            self.comment_group(group, allow_line);
        }
    }

    fn comment_group(&mut self, group: &PositionedComment, allow_line: bool) {
        match self.opts.comment_style {
            CommentStyle::Block => {
                for text in &group.texts {
                    self.atom(&format!("/* {} */", escape_comment(text)));
                }
            }
            CommentStyle::Smart => {
                if group.texts.len() >= 2 {
                    // stacked line comments merge into one block, one line
                    // per original comment
                    self.atom("/*");
                    self.indent();
                    for text in &group.texts {
                        self.newline();
                        self.atom(&escape_comment(text));
                    }
                    self.dedent();
                    self.newline();
                    self.atom("*/");
                } else if let Some(text) = group.texts.first() {
                    // multi-line block bodies survive as-is; they cannot
                    // take `--` form
                    if allow_line && self.multiline() && !text.contains('\n') {
                        self.atom(&format!("-- {}", text));
                    } else {
                        self.atom(&format!("/* {} */", escape_comment(text)));
                    }
                }
            }
        }
    }
}

fn escape_comment(text: &str) -> String {
    text.replace("*/", "*\\/")
}
