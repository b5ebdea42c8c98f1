//! Document normalization — from wire shape to the engine's model.
//!
//! [`normalize`] is the single entry point through which every key document
//! must pass before any other engine operation. It:
//!
//! - flattens the nested taxon forest into a [`TaxonArena`] (rejecting
//!   repeated ids, the wire-format manifestation of a cycle),
//! - verifies that every statement resolves: known taxon, known character,
//!   and a state that actually belongs to that character,
//! - rejects duplicate state ids (statements reference states without
//!   qualification, so ids must be unique document-wide),
//! - defaults missing statement frequencies to 1 (certain) and clamps
//!   out-of-range values into [0, 1],
//! - canonicalizes the `language` field into an ordered list of codes,
//! - builds the per-state frequency index the propagation engine reads.
//!
//! Everything else — missing titles, absent media, empty metadata — is
//! defaulted, never rejected.
//!
//! The resulting [`Document`] is logically immutable: the only mutations
//! after normalization are statement completion
//! ([`complete_statements`](crate::completion::complete_statements)) and
//! subset filtering ([`Document::filter_by_ids`],
//! [`Document::filter_by_names`]), both of which restore every index they
//! touch. Answers and dismissals never live on the document; they form the
//! overlay consumed by [`propagate`](crate::propagate::propagate).

use hashbrown::HashMap;
use serde_json::Value;

use crate::document::{Character, ClassificationRank, KeyDocument, LocalizedText};
use crate::error::MalformedDocumentError;
use crate::taxa::{filter_taxa_by_ids, filter_taxa_by_names, is_part_of_key, TaxonArena};

// ─── Normalized statement ───────────────────────────────────────────────────

/// An evidence record after normalization: frequency resolved, references
/// verified. The wire field `value` is renamed to `state` for clarity.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// Statement id. Synthesized statements follow the pattern
    /// `statement:<stateId>_<taxonId>_0`.
    pub id: String,
    /// The taxon this evidence is about.
    pub taxon: String,
    /// The character the state belongs to.
    pub character: String,
    /// The state id.
    pub state: String,
    /// Proportion of instances of the taxon exhibiting the state, in [0, 1].
    /// 0 and 1 are hard evidence; intermediate values are soft.
    pub frequency: f64,
}

// ─── Normalized document ────────────────────────────────────────────────────

/// A key document after normalization: the engine's working model.
///
/// Construction goes through [`normalize`]; the indices this struct carries
/// are maintained by the crate's own mutating operations and are not
/// externally writable.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Localized key title.
    pub title: LocalizedText,
    /// Localized key description.
    pub description: Option<LocalizedText>,
    /// Link to an external description page.
    pub description_url: Option<String>,
    /// Localized attribution or details for the description.
    pub description_details: Option<LocalizedText>,
    /// Creator references, opaque to the engine.
    pub creators: Vec<Value>,
    /// Contributor references, opaque to the engine.
    pub contributors: Vec<Value>,
    /// Publisher references, opaque to the engine.
    pub publishers: Vec<Value>,
    /// Offered languages as an ordered list of locale codes.
    pub language: Vec<String>,
    /// Ancestor chain of ranks above the key's root taxon.
    pub classification: Vec<ClassificationRank>,
    /// Last modification timestamp, passed through for display.
    pub last_modified: Option<String>,
    /// Media elements, passed through for the presentation layer.
    pub media_elements: Vec<Value>,
    /// The taxon tree.
    pub taxa: TaxonArena,
    /// The characters, in document order.
    pub characters: Vec<Character>,
    /// The evidence statements, document order first, synthesized last.
    pub statements: Vec<Statement>,

    /// state id → (character index, state index within the character).
    state_index: HashMap<String, (usize, usize)>,
    /// state id → taxon id → frequency.
    freq_by_state: HashMap<String, HashMap<String, f64>>,
}

impl Document {
    // ── Index accessors ────────────────────────────────────────────────────

    /// Position of a state: (character index, state index), if it exists.
    pub fn state_position(&self, state_id: &str) -> Option<(usize, usize)> {
        self.state_index.get(state_id).copied()
    }

    /// True when the document contains a state with this id.
    pub fn has_state(&self, state_id: &str) -> bool {
        self.state_index.contains_key(state_id)
    }

    /// The explicit frequency a taxon carries for a state, if any statement
    /// (original or synthesized) links the two. `None` means no evidence.
    pub fn frequency(&self, taxon_id: &str, state_id: &str) -> Option<f64> {
        self.freq_by_state
            .get(state_id)
            .and_then(|by_taxon| by_taxon.get(taxon_id))
            .copied()
    }

    /// All (taxon id → frequency) evidence for one state.
    pub(crate) fn frequencies_for_state(&self, state_id: &str) -> Option<&HashMap<String, f64>> {
        self.freq_by_state.get(state_id)
    }

    /// Rebuild the frequency index from the statement list. Called after
    /// any operation that changes `statements`.
    pub(crate) fn rebuild_statement_index(&mut self) {
        self.freq_by_state.clear();
        for sm in &self.statements {
            self.freq_by_state
                .entry(sm.state.clone())
                .or_default()
                .insert(sm.taxon.clone(), sm.frequency);
        }
    }

    // ── Subset filtering ───────────────────────────────────────────────────

    /// Scope the document to the taxa named by id (plus subtrees and
    /// ancestor chains), pruning statements that reference removed taxa.
    pub fn filter_by_ids<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.taxa = filter_taxa_by_ids(&self.taxa, ids);
        self.prune_dangling_statements();
    }

    /// Scope the document to the taxa named by scientific name, optionally
    /// collapsing to the nearest common ancestor of the matches.
    pub fn filter_by_names<S: AsRef<str>>(&mut self, names: &[S], keep_common_ancestor: bool) {
        self.taxa = filter_taxa_by_names(&self.taxa, names, keep_common_ancestor);
        self.prune_dangling_statements();
    }

    /// Membership test by exact scientific name over the (possibly
    /// filtered) taxon tree.
    pub fn is_part_of_key(&self, scientific_name: &str) -> bool {
        is_part_of_key(&self.taxa, scientific_name)
    }

    fn prune_dangling_statements(&mut self) {
        let taxa = &self.taxa;
        self.statements.retain(|sm| taxa.contains_id(&sm.taxon));
        self.rebuild_statement_index();
    }
}

// ─── Normalization ──────────────────────────────────────────────────────────

/// Normalize a wire-format key document into the engine's model.
///
/// Fails with a [`MalformedDocumentError`] when a statement references an
/// unknown taxon, character or state, when a state id is duplicated, or
/// when the taxon tree repeats an id. All other gaps are defaulted.
pub fn normalize(raw: KeyDocument) -> Result<Document, MalformedDocumentError> {
    let taxa = TaxonArena::from_raw(&raw.taxa)?;

    // State ids must be unique document-wide: statements reference them
    // without naming a character authoritatively.
    let mut state_index: HashMap<String, (usize, usize)> = HashMap::new();
    for (ci, character) in raw.characters.iter().enumerate() {
        for (si, state) in character.states.iter().enumerate() {
            if state_index.insert(state.id.clone(), (ci, si)).is_some() {
                return Err(MalformedDocumentError::DuplicateState {
                    state: state.id.clone(),
                    character: character.id.clone(),
                });
            }
        }
    }

    let character_index: HashMap<&str, usize> = raw
        .characters
        .iter()
        .enumerate()
        .map(|(ci, c)| (c.id.as_str(), ci))
        .collect();

    let mut statements = Vec::with_capacity(raw.statements.len());
    for sm in &raw.statements {
        if !taxa.contains_id(&sm.taxon) {
            return Err(MalformedDocumentError::UnknownTaxon {
                statement: sm.id.clone(),
                taxon: sm.taxon.clone(),
            });
        }
        let Some(&ci) = character_index.get(sm.character.as_str()) else {
            return Err(MalformedDocumentError::UnknownCharacter {
                statement: sm.id.clone(),
                character: sm.character.clone(),
            });
        };
        match state_index.get(sm.value.as_str()) {
            Some(&(state_ci, _)) if state_ci == ci => {}
            _ => {
                return Err(MalformedDocumentError::UnknownState {
                    statement: sm.id.clone(),
                    state: sm.value.clone(),
                    character: sm.character.clone(),
                });
            }
        }
        statements.push(Statement {
            id: sm.id.clone(),
            taxon: sm.taxon.clone(),
            character: sm.character.clone(),
            state: sm.value.clone(),
            // Absent frequency means "always exhibits the state".
            frequency: sm.frequency.unwrap_or(1.0).clamp(0.0, 1.0),
        });
    }
    drop(character_index);

    let mut doc = Document {
        id: raw.id,
        title: raw.title,
        description: raw.description,
        description_url: raw.description_url,
        description_details: raw.description_details,
        creators: raw.creators,
        contributors: raw.contributors,
        publishers: raw.publishers,
        language: raw.language.into_codes(),
        classification: raw.classification,
        last_modified: raw.last_modified,
        media_elements: raw.media_elements,
        taxa,
        characters: raw.characters,
        statements,
        state_index,
        freq_by_state: HashMap::new(),
    };
    doc.rebuild_statement_index();

    log::debug!(
        "normalized key `{}`: {} taxa, {} characters, {} statements",
        doc.id,
        doc.taxa.len(),
        doc.characters.len(),
        doc.statements.len()
    );
    Ok(doc)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
