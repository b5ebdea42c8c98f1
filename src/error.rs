//! Error taxonomy for the identification-key engine.
//!
//! Two failure classes exist and nothing else — the engine performs no I/O,
//! so there are no retries and no transient errors:
//!
//! - [`MalformedDocumentError`]: structural faults detected once during
//!   normalization. Fatal for that document; the caller should not attempt
//!   to use it.
//! - [`TransitionError`]: caller misuse of a transition entry point (a stale
//!   id passed to an answer or dismissal call). Per-call and recoverable —
//!   the failed call leaves the session untouched.
//!
//! Missing optional data is never an error: absent frequencies default to 1,
//! absent localized fields stay empty, and the `language` field is
//! canonicalized regardless of its wire shape.

use thiserror::Error;

/// Structural fault in a key document, detected during normalization.
///
/// Raised at most once per document load. A document that fails
/// normalization must be discarded; none of its derived structures exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedDocumentError {
    /// A taxon id occurs more than once in the tree. The wire format nests
    /// children inside their parent, so a repeated id is how a cycle (or a
    /// shared subtree) manifests after flattening.
    #[error("taxon tree is not a tree: taxon `{taxon}` appears more than once")]
    CyclicTaxa {
        /// The repeated taxon id.
        taxon: String,
    },

    /// Two states in the document share an id. State ids must be unique
    /// document-wide; statements reference them without naming a character.
    #[error("duplicate state id `{state}` (second occurrence in character `{character}`)")]
    DuplicateState {
        /// The repeated state id.
        state: String,
        /// The character containing the second occurrence.
        character: String,
    },

    /// A statement names a taxon that does not exist in the taxon tree.
    #[error("statement `{statement}` references unknown taxon `{taxon}`")]
    UnknownTaxon {
        /// Id of the offending statement.
        statement: String,
        /// The dangling taxon id.
        taxon: String,
    },

    /// A statement names a character that does not exist in the document.
    #[error("statement `{statement}` references unknown character `{character}`")]
    UnknownCharacter {
        /// Id of the offending statement.
        statement: String,
        /// The dangling character id.
        character: String,
    },

    /// A statement names a state that does not belong to its character.
    #[error("statement `{statement}` references state `{state}` which is not a state of character `{character}`")]
    UnknownState {
        /// Id of the offending statement.
        statement: String,
        /// The dangling or misattached state id.
        state: String,
        /// The character the statement claimed the state belongs to.
        character: String,
    },
}

/// Caller misuse of a transition entry point.
///
/// The session rejects the whole call and mutates nothing, so the caller
/// may simply drop the error and continue with fresh ids.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// An answer referenced a state id unknown to the document.
    #[error("unknown state id `{0}`")]
    UnknownState(String),

    /// A dismissal referenced a taxon id unknown to the document.
    #[error("unknown taxon id `{0}`")]
    UnknownTaxon(String),
}
