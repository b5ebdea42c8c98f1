//! Per-state alternative metadata for question rendering.
//!
//! The presentation layer renders a character either as a set of mutually
//! exclusive alternatives (binary: picking one answers the others) or as a
//! single yes/no toggle (unary: the character has exactly one state). That
//! choice depends only on how many sibling states each state has, which is
//! static document structure — computed here once, consumed by the UI.

use crate::normalize::Document;

/// Rendering metadata for one state, produced by [`infer_alternatives`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct AlternativeInfo {
    /// The state id.
    pub state: String,
    /// Id of the character the state belongs to.
    pub character: String,
    /// Number of *other* states in the same character.
    pub siblings: usize,
    /// True when the state is its character's only alternative, rendered
    /// as a standalone yes/no question.
    pub unary: bool,
}

/// Compute per-state alternative metadata, in document order.
pub fn infer_alternatives(doc: &Document) -> Vec<AlternativeInfo> {
    doc.characters
        .iter()
        .flat_map(|character| {
            let siblings = character.states.len().saturating_sub(1);
            character.states.iter().map(move |state| AlternativeInfo {
                state: state.id.clone(),
                character: character.id.clone(),
                siblings,
                unary: siblings == 0,
            })
        })
        .collect()
}
