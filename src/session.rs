//! The transition API: answer, undo, dismiss, reset, filter.
//!
//! A [`Session`] owns the one logical "current document + overlay" pair of
//! an identification run. The overlay is just an answers map and a
//! dismissals set; every transition mutates the overlay and re-runs
//! [`propagate`] once, so the derived view is always the pure function of
//! the current inputs and never drifts.
//!
//! Transitions run to completion before the next one is accepted —
//! `&mut self` serializes them. Multiple answer pairs in one
//! [`Session::give_answers`] call are applied atomically before the single
//! propagation, so intermediate partial states are never observable. A
//! failed transition (stale id) mutates nothing.

use hashbrown::{HashMap, HashSet};

use crate::completion::complete_statements;
use crate::document::KeyDocument;
use crate::error::{MalformedDocumentError, TransitionError};
use crate::normalize::{normalize, Document};
use crate::propagate::{propagate, Evaluation};

/// One identification run over a normalized key document.
#[derive(Clone, Debug)]
pub struct Session {
    document: Document,
    answers: HashMap<String, bool>,
    dismissed: HashSet<String>,
    evaluation: Evaluation,
    /// Result-eligible taxa in the (possibly filtered) document; the UI
    /// shows `taxa_count - relevant_taxa_count` as "excluded".
    taxa_count: usize,
}

impl Session {
    /// Start a session over an already-normalized document. Runs one empty
    /// propagation so the derived view exists before any answer is given.
    pub fn new(document: Document) -> Self {
        let answers = HashMap::new();
        let dismissed = HashSet::new();
        let evaluation = propagate(&document, &answers, &dismissed);
        let taxa_count = evaluation.relevant_taxa_count;
        Session {
            document,
            answers,
            dismissed,
            evaluation,
            taxa_count,
        }
    }

    /// Load a wire-format document: normalize, complete statements, start
    /// the session.
    pub fn load(raw: KeyDocument) -> Result<Self, MalformedDocumentError> {
        let mut document = normalize(raw)?;
        complete_statements(&mut document);
        Ok(Session::new(document))
    }

    // ── Read accessors ─────────────────────────────────────────────────────

    /// The normalized document this session runs over.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The derived view for the current answers and dismissals.
    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    /// Total result-eligible taxa in the (possibly filtered) document.
    pub fn taxa_count(&self) -> usize {
        self.taxa_count
    }

    /// Number of result-eligible taxa still relevant.
    pub fn relevant_taxa_count(&self) -> usize {
        self.evaluation.relevant_taxa_count
    }

    /// The current answer for a state, `None` when unanswered.
    pub fn answer_for(&self, state_id: &str) -> Option<bool> {
        self.answers.get(state_id).copied()
    }

    /// All current answers, keyed by state id.
    pub fn answers(&self) -> &HashMap<String, bool> {
        &self.answers
    }

    /// Whether a taxon is currently dismissed manually.
    pub fn is_dismissed(&self, taxon_id: &str) -> bool {
        self.dismissed.contains(taxon_id)
    }

    // ── Transitions ────────────────────────────────────────────────────────

    /// Apply a batch of answers atomically, then propagate once.
    ///
    /// `Some(value)` answers a state, `None` clears it (the undo path).
    /// Fails with [`TransitionError::UnknownState`] if any id is unknown,
    /// in which case no pair of the batch is applied.
    pub fn give_answers(
        &mut self,
        pairs: &[(&str, Option<bool>)],
    ) -> Result<&Evaluation, TransitionError> {
        for (state_id, _) in pairs {
            if !self.document.has_state(state_id) {
                return Err(TransitionError::UnknownState((*state_id).to_string()));
            }
        }
        for (state_id, value) in pairs {
            match value {
                Some(v) => {
                    self.answers.insert((*state_id).to_string(), *v);
                }
                None => {
                    self.answers.remove(*state_id);
                }
            }
        }
        self.re_evaluate();
        Ok(&self.evaluation)
    }

    /// Flip a taxon's manual dismissal, then propagate.
    ///
    /// Dismissal is independent of answer-derived conflicts: restoring a
    /// taxon whose evidence conflicts with the answers leaves it excluded
    /// by those conflicts.
    pub fn toggle_taxon_dismissed(
        &mut self,
        taxon_id: &str,
    ) -> Result<&Evaluation, TransitionError> {
        if !self.document.taxa.contains_id(taxon_id) {
            return Err(TransitionError::UnknownTaxon(taxon_id.to_string()));
        }
        if !self.dismissed.remove(taxon_id) {
            self.dismissed.insert(taxon_id.to_string());
        }
        self.re_evaluate();
        Ok(&self.evaluation)
    }

    /// Clear every given answer in one transition (one propagation).
    /// Dismissals are untouched.
    pub fn reset_answers(&mut self) -> &Evaluation {
        if !self.answers.is_empty() {
            self.answers.clear();
            self.re_evaluate();
        }
        &self.evaluation
    }

    // ── Subset filtering ───────────────────────────────────────────────────

    /// Scope the session's document to the taxa named by id, then
    /// re-propagate. Answers survive; dismissals of removed taxa become
    /// inert.
    pub fn filter_taxa_by_ids<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.document.filter_by_ids(ids);
        self.refresh_taxa_count();
        self.re_evaluate();
    }

    /// Scope the session's document to the taxa named by scientific name,
    /// optionally collapsing to the nearest common ancestor.
    pub fn filter_taxa_by_names<S: AsRef<str>>(&mut self, names: &[S], keep_common_ancestor: bool) {
        self.document.filter_by_names(names, keep_common_ancestor);
        self.refresh_taxa_count();
        self.re_evaluate();
    }

    // ── Internal ───────────────────────────────────────────────────────────

    fn refresh_taxa_count(&mut self) {
        self.taxa_count = self
            .document
            .taxa
            .iter()
            .filter(|(_, t)| t.is_result)
            .count();
    }

    fn re_evaluate(&mut self) {
        self.evaluation = propagate(&self.document, &self.answers, &self.dismissed);
        log::trace!(
            "session `{}`: {}/{} result taxa relevant",
            self.document.id,
            self.evaluation.relevant_taxa_count,
            self.taxa_count
        );
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
