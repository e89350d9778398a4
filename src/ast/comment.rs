use serde::{Deserialize, Serialize};

/// Where a comment sits relative to its host node's own tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentPosition {
    Before,
    After,
    Inner,
}

/// The delimiter form the comment had in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentForm {
    Block,
    Line,
}

/// A comment annotation attached to an AST node. `texts` holds the raw
/// comment bodies without delimiters, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedComment {
    pub position: CommentPosition,
    pub style: CommentForm,
    pub texts: Vec<String>,
}

impl PositionedComment {
    pub fn new(position: CommentPosition, style: CommentForm, text: impl Into<String>) -> Self {
        PositionedComment {
            position,
            style,
            texts: vec![text.into()],
        }
    }
}

pub type Comments = Vec<PositionedComment>;

/// Append one comment text, merging into the previous entry when position
/// and style line up (stacked `--` lines become one annotation).
pub fn attach_comment(
    comments: &mut Comments,
    position: CommentPosition,
    style: CommentForm,
    text: impl Into<String>,
) {
    if let Some(last) = comments.last_mut() {
        if last.position == position && last.style == style {
            last.texts.push(text.into());
            return;
        }
    }
    comments.push(PositionedComment::new(position, style, text));
}

/// All texts at a given position, in order.
pub fn comment_texts(comments: &Comments, position: CommentPosition) -> Vec<&str> {
    comments
        .iter()
        .filter(|c| c.position == position)
        .flat_map(|c| c.texts.iter().map(|t| t.as_str()))
        .collect()
}
