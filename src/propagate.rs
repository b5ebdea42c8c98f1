//! The relevance propagation engine.
//!
//! `propagate` is a pure function from (document, answers, dismissals) to a
//! derived [`Evaluation`] — recomputed from scratch on every transition, so
//! re-running it on unchanged inputs is idempotent and nothing accumulates
//! across calls.
//!
//! # Algorithm
//!
//! 1. **Conflict scan.** For every answered state and every taxon with an
//!    explicit frequency `f` for it (statement completion has made these
//!    total per character): `true` against `f == 0` or `false` against
//!    `f == 1` is a *hard* conflict; any `0 < f < 1` is a *soft* conflict,
//!    retained for display but never excluding on its own. A taxon with no
//!    evidence for the character is untouched.
//! 2. **Tree propagation.** Bottom-up over the arena: a taxon is relevant
//!    iff it is not dismissed, carries no hard conflict, and is either a
//!    result candidate itself or has at least one relevant child. A
//!    dismissed node is forced irrelevant and contributes nothing to its
//!    parent's OR, but its descendants keep their independently computed
//!    flags — dismissal is local, not inherited.
//! 3. **Results.** The relevant result-eligible taxa, in depth-first
//!    document order; their count is `relevant_taxa_count`.
//! 4. **Character relevance.** A character goes `relevant = false` once all
//!    its states are answered, or once no unanswered state could eliminate
//!    a proper non-empty subset of the surviving result taxa — elimination
//!    is by hard conflict only, so a character whose remaining evidence is
//!    entirely soft cannot discriminate, and with one survivor or fewer
//!    nothing can.
//!
//! Cost is O(taxa × answered states) plus one tree walk, cheap enough to
//! re-run after every single-click answer.

use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use crate::document::Character;
use crate::normalize::Document;
use crate::taxa::TaxonArena;

// ─── Derived state ──────────────────────────────────────────────────────────

/// Which side of the partition a taxon landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Relevance {
    /// Still consistent with every answer given so far.
    Relevant,
    /// Ruled out by a hard conflict, a dismissal, or the exhaustion of its
    /// descendants.
    Irrelevant,
}

impl Relevance {
    /// True for [`Relevance::Relevant`].
    pub fn is_relevant(self) -> bool {
        matches!(self, Relevance::Relevant)
    }
}

/// Severity of a recorded conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    /// Certain contradiction: the taxon cannot coexist with the answer.
    Hard,
    /// Frequency-weighted tension: the taxon only sometimes matches the
    /// answer. Retained for display, never excluding on its own.
    Soft,
}

/// One answered state a taxon is in tension with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conflict {
    /// The character the conflicting state belongs to.
    pub character: String,
    /// The conflicting state id.
    pub state: String,
    /// The taxon's recorded frequency for that state.
    pub frequency: f64,
    /// The answer that produced the tension.
    pub answer: bool,
    /// Hard or soft.
    pub kind: ConflictKind,
}

/// Derived per-taxon state, indexed like the document's taxon arena.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxonAssessment {
    /// Relevant / irrelevant partition side.
    pub relevance: Relevance,
    /// Whether the taxon is manually dismissed (independent of, and
    /// composable with, answer-derived conflicts).
    pub dismissed: bool,
    /// Every answered state this taxon is in tension with, recomputed from
    /// empty on each propagation.
    pub conflicts: Vec<Conflict>,
}

impl TaxonAssessment {
    /// True when the taxon remains a candidate.
    pub fn is_relevant(&self) -> bool {
        self.relevance.is_relevant()
    }

    /// True when at least one recorded conflict is hard.
    pub fn has_hard_conflict(&self) -> bool {
        self.conflicts.iter().any(|c| c.kind == ConflictKind::Hard)
    }
}

/// Derived per-character state, indexed like the document's character list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CharacterAssessment {
    /// True once any state of the character has an answer.
    pub answered: bool,
    /// False once answering the character can no longer change the
    /// remaining taxon set.
    pub relevant: bool,
    /// Current answer per state, in state order (`None` = unanswered).
    pub state_answers: Vec<Option<bool>>,
}

/// The full derived view of one (document, answers, dismissals) triple.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    /// Per-taxon assessments, parallel to the taxon arena.
    pub taxa: Vec<TaxonAssessment>,
    /// Per-character assessments, parallel to the character list.
    pub characters: Vec<CharacterAssessment>,
    /// Number of relevant result-eligible taxa (each counted once at its
    /// natural tree rank).
    pub relevant_taxa_count: usize,
    /// Arena indices of the relevant result-eligible taxa, in depth-first
    /// document order.
    pub results: Vec<usize>,
}

// ─── Propagation ────────────────────────────────────────────────────────────

/// Recompute the full derived view for the given answer and dismissal
/// overlay.
///
/// Pure and total: no mutation of the document, bounded by the finite tree
/// and statement list, and idempotent — identical inputs produce an
/// identical [`Evaluation`].
pub fn propagate(
    doc: &Document,
    answers: &HashMap<String, bool>,
    dismissals: &HashSet<String>,
) -> Evaluation {
    let taxon_count = doc.taxa.len();

    // Step 1: conflict scan, in document order for deterministic output.
    let mut conflicts: Vec<Vec<Conflict>> = vec![Vec::new(); taxon_count];
    for character in &doc.characters {
        for state in &character.states {
            let Some(&answer) = answers.get(&state.id) else {
                continue;
            };
            let Some(freqs) = doc.frequencies_for_state(&state.id) else {
                continue;
            };
            for (ti, taxon) in doc.taxa.iter() {
                let Some(&f) = freqs.get(taxon.id.as_str()) else {
                    continue; // no evidence, no conflict
                };
                let kind = if (answer && f == 0.0) || (!answer && f == 1.0) {
                    ConflictKind::Hard
                } else if f > 0.0 && f < 1.0 {
                    ConflictKind::Soft
                } else {
                    continue; // evidence agrees with the answer
                };
                conflicts[ti].push(Conflict {
                    character: character.id.clone(),
                    state: state.id.clone(),
                    frequency: f,
                    answer,
                    kind,
                });
            }
        }
    }
    let hard: Vec<bool> = conflicts
        .iter()
        .map(|list| list.iter().any(|c| c.kind == ConflictKind::Hard))
        .collect();

    // Steps 2–3: bottom-up relevance over the tree.
    let mut relevant = vec![false; taxon_count];
    for &root in doc.taxa.roots() {
        assess(&doc.taxa, root, dismissals, &hard, &mut relevant);
    }

    let results: Vec<usize> = (0..taxon_count)
        .filter(|&i| relevant[i] && doc.taxa.get(i).is_result)
        .collect();
    let relevant_taxa_count = results.len();

    // Step 4: character discriminability over the surviving result taxa.
    let survivors: Vec<&str> = results
        .iter()
        .map(|&i| doc.taxa.get(i).id.as_str())
        .collect();
    let characters: Vec<CharacterAssessment> = doc
        .characters
        .iter()
        .map(|character| assess_character(doc, character, answers, &survivors))
        .collect();

    let taxa: Vec<TaxonAssessment> = relevant
        .into_iter()
        .zip(conflicts)
        .enumerate()
        .map(|(i, (is_relevant, conflicts))| TaxonAssessment {
            relevance: if is_relevant {
                Relevance::Relevant
            } else {
                Relevance::Irrelevant
            },
            dismissed: dismissals.contains(doc.taxa.get(i).id.as_str()),
            conflicts,
        })
        .collect();

    log::trace!(
        "propagated key `{}`: {} answers, {} dismissals, {} of {} result taxa relevant",
        doc.id,
        answers.len(),
        dismissals.len(),
        relevant_taxa_count,
        doc.taxa.iter().filter(|(_, t)| t.is_result).count()
    );

    Evaluation {
        taxa,
        characters,
        relevant_taxa_count,
        results,
    }
}

/// Post-order relevance: every child is assessed (no short-circuit — their
/// flags must all be filled in) before the node combines dismissal, its own
/// hard conflicts, result candidacy and the children's OR.
fn assess(
    arena: &TaxonArena,
    idx: usize,
    dismissals: &HashSet<String>,
    hard: &[bool],
    relevant: &mut [bool],
) -> bool {
    let node = arena.get(idx);
    let mut any_child_relevant = false;
    for &child in &node.children {
        let child_relevant = assess(arena, child, dismissals, hard, relevant);
        any_child_relevant = any_child_relevant || child_relevant;
    }
    let is_relevant = !dismissals.contains(node.id.as_str())
        && !hard[idx]
        && (node.is_result || any_child_relevant);
    relevant[idx] = is_relevant;
    is_relevant
}

fn assess_character(
    doc: &Document,
    character: &Character,
    answers: &HashMap<String, bool>,
    survivors: &[&str],
) -> CharacterAssessment {
    let state_answers: Vec<Option<bool>> = character
        .states
        .iter()
        .map(|s| answers.get(&s.id).copied())
        .collect();
    let answered = state_answers.iter().any(Option::is_some);
    let all_answered = !state_answers.is_empty() && state_answers.iter().all(Option::is_some);

    let relevant = !all_answered && discriminates(doc, character, &state_answers, survivors);

    CharacterAssessment {
        answered,
        relevant,
        state_answers,
    }
}

/// Could answering this character still shrink the surviving result set to
/// a proper, non-empty subset? Only hard conflicts eliminate, so only
/// frequencies of exactly 0 or 1 count.
fn discriminates(
    doc: &Document,
    character: &Character,
    state_answers: &[Option<bool>],
    survivors: &[&str],
) -> bool {
    if survivors.len() <= 1 {
        return false;
    }
    for (state, answer) in character.states.iter().zip(state_answers) {
        if answer.is_some() {
            continue; // already answered, cannot newly eliminate
        }
        let Some(freqs) = doc.frequencies_for_state(&state.id) else {
            continue;
        };
        let mut removed_if_true = 0usize;
        let mut removed_if_false = 0usize;
        for &taxon in survivors {
            match freqs.get(taxon) {
                Some(&f) if f == 0.0 => removed_if_true += 1,
                Some(&f) if f == 1.0 => removed_if_false += 1,
                _ => {}
            }
        }
        let proper = |removed: usize| removed > 0 && removed < survivors.len();
        if proper(removed_if_true) || proper(removed_if_false) {
            return true;
        }
    }
    false
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::complete_statements;
    use crate::document::{Character, KeyDocument, RawStatement, RawTaxon, State};
    use crate::normalize::normalize;

    // ── Helpers ──────────────────────────────────────────────────────────

    fn state(id: &str) -> State {
        State {
            id: id.into(),
            ..State::default()
        }
    }

    fn character(id: &str, states: &[&str]) -> Character {
        Character {
            id: id.into(),
            states: states.iter().map(|s| state(s)).collect(),
            ..Character::default()
        }
    }

    fn taxon(id: &str) -> RawTaxon {
        RawTaxon {
            id: id.into(),
            scientific_name: id.into(),
            ..RawTaxon::default()
        }
    }

    fn statement(taxon: &str, char_id: &str, state: &str, f: f64) -> RawStatement {
        RawStatement {
            id: format!("statement:{state}_{taxon}"),
            taxon: taxon.into(),
            character: char_id.into(),
            value: state.into(),
            frequency: Some(f),
        }
    }

    fn build(
        taxa: Vec<RawTaxon>,
        characters: Vec<Character>,
        statements: Vec<RawStatement>,
    ) -> Document {
        let mut doc = normalize(KeyDocument {
            id: "key:test".into(),
            taxa,
            characters,
            statements,
            ..KeyDocument::default()
        })
        .unwrap();
        complete_statements(&mut doc);
        doc
    }

    /// The two-taxon key: T1 always shows S1 (never S2, by completion),
    /// T2 always shows S2 (never S1).
    fn two_taxon_doc() -> Document {
        build(
            vec![taxon("t1"), taxon("t2")],
            vec![character("c1", &["s1", "s2"])],
            vec![statement("t1", "c1", "s1", 1.0), statement("t2", "c1", "s2", 1.0)],
        )
    }

    fn answers(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|&(s, v)| (s.to_string(), v)).collect()
    }

    fn no_dismissals() -> HashSet<String> {
        HashSet::new()
    }

    fn relevance_of<'a>(doc: &Document, eval: &'a Evaluation, id: &str) -> &'a TaxonAssessment {
        &eval.taxa[doc.taxa.index_of(id).unwrap()]
    }

    // ── Core scenarios ────────────────────────────────────────────────────

    #[test]
    fn test_no_answers_everything_relevant() {
        let doc = two_taxon_doc();
        let eval = propagate(&doc, &HashMap::new(), &no_dismissals());
        assert_eq!(eval.relevant_taxa_count, 2);
        assert!(eval.taxa.iter().all(|t| t.is_relevant()));
        assert!(eval.taxa.iter().all(|t| t.conflicts.is_empty()));
    }

    #[test]
    fn test_observed_state_excludes_taxon_lacking_it() {
        let doc = two_taxon_doc();
        let eval = propagate(&doc, &answers(&[("s1", true)]), &no_dismissals());

        // T2 has a synthesized frequency-0 statement for S1: hard conflict.
        let t2 = relevance_of(&doc, &eval, "t2");
        assert_eq!(t2.relevance, Relevance::Irrelevant);
        assert!(t2.has_hard_conflict());

        let t1 = relevance_of(&doc, &eval, "t1");
        assert_eq!(t1.relevance, Relevance::Relevant);
        assert_eq!(eval.relevant_taxa_count, 1);
        assert_eq!(eval.results, vec![doc.taxa.index_of("t1").unwrap()]);
    }

    #[test]
    fn test_absent_state_excludes_taxon_always_showing_it() {
        let doc = two_taxon_doc();
        let eval = propagate(&doc, &answers(&[("s1", false)]), &no_dismissals());

        // T1 always shows S1 (f=1), contradicting its reported absence.
        let t1 = relevance_of(&doc, &eval, "t1");
        assert_eq!(t1.relevance, Relevance::Irrelevant);
        assert!(t1.has_hard_conflict());

        let t2 = relevance_of(&doc, &eval, "t2");
        assert_eq!(t2.relevance, Relevance::Relevant);
        // T2's f=0 for S1 agrees with "absent": no conflict at all.
        assert!(t2.conflicts.is_empty());
        assert_eq!(eval.relevant_taxa_count, 1);
    }

    #[test]
    fn test_dismissing_sole_survivor_empties_results() {
        let doc = two_taxon_doc();
        let dismissed: HashSet<String> = ["t1", "t2"].iter().map(|s| s.to_string()).collect();
        let eval = propagate(&doc, &HashMap::new(), &dismissed);
        assert_eq!(eval.relevant_taxa_count, 0);
        assert!(eval.results.is_empty());
        assert!(eval.taxa.iter().all(|t| t.dismissed));
    }

    // ── Conflict classification ───────────────────────────────────────────

    #[test]
    fn test_soft_conflict_recorded_but_not_excluding() {
        let doc = build(
            vec![taxon("t1"), taxon("t2")],
            vec![character("c1", &["s1", "s2"])],
            vec![
                statement("t1", "c1", "s1", 0.5),
                statement("t2", "c1", "s2", 1.0),
            ],
        );
        let eval = propagate(&doc, &answers(&[("s1", true)]), &no_dismissals());

        let t1 = relevance_of(&doc, &eval, "t1");
        assert_eq!(t1.relevance, Relevance::Relevant);
        assert_eq!(t1.conflicts.len(), 1);
        assert_eq!(t1.conflicts[0].kind, ConflictKind::Soft);
        assert_eq!(t1.conflicts[0].frequency, 0.5);

        // Ties between soft-conflicting and conflict-free taxa are not
        // broken: both sides of the tie stay relevant.
        assert_eq!(eval.relevant_taxa_count, 1); // t2 still excluded by f=0
    }

    #[test]
    fn test_taxon_without_evidence_untouched() {
        let doc = build(
            vec![taxon("t1"), taxon("t2"), taxon("t3")],
            vec![character("c1", &["s1", "s2"])],
            vec![
                statement("t1", "c1", "s1", 1.0),
                statement("t2", "c1", "s2", 1.0),
            ],
        );
        let eval = propagate(&doc, &answers(&[("s1", true)]), &no_dismissals());
        // t3 has no evidence for c1 at all: no conflict, still a candidate.
        let t3 = relevance_of(&doc, &eval, "t3");
        assert_eq!(t3.relevance, Relevance::Relevant);
        assert!(t3.conflicts.is_empty());
    }

    // ── Tree propagation ──────────────────────────────────────────────────

    fn genus_doc() -> Document {
        let genus = RawTaxon {
            id: "genus".into(),
            scientific_name: "Genus".into(),
            children: vec![taxon("sp1"), taxon("sp2")],
            ..RawTaxon::default()
        };
        build(
            vec![genus, taxon("other")],
            vec![character("c1", &["s1", "s2"])],
            vec![
                statement("sp1", "c1", "s1", 1.0),
                statement("sp2", "c1", "s1", 1.0),
                statement("other", "c1", "s2", 1.0),
            ],
        )
    }

    #[test]
    fn test_parent_relevant_while_any_child_survives() {
        let doc = genus_doc();
        // s2 observed: sp1 and sp2 both lose (synthesized f=0 for s2).
        let eval = propagate(&doc, &answers(&[("s2", true)]), &no_dismissals());
        assert_eq!(relevance_of(&doc, &eval, "sp1").relevance, Relevance::Irrelevant);
        assert_eq!(relevance_of(&doc, &eval, "sp2").relevance, Relevance::Irrelevant);
        // All descendants gone and the genus is no result candidate itself.
        assert_eq!(relevance_of(&doc, &eval, "genus").relevance, Relevance::Irrelevant);
        assert_eq!(eval.relevant_taxa_count, 1); // "other"
    }

    #[test]
    fn test_parent_survives_with_one_relevant_child() {
        let mut doc = genus_doc();
        // Give sp2 its own positive evidence for s2 so only sp1 conflicts.
        doc.statements.retain(|sm| !(sm.taxon == "sp2" && sm.state == "s2"));
        doc.statements.push(crate::normalize::Statement {
            id: "statement:extra".into(),
            taxon: "sp2".into(),
            character: "c1".into(),
            state: "s2".into(),
            frequency: 1.0,
        });
        doc.rebuild_statement_index();

        let eval = propagate(&doc, &answers(&[("s2", true)]), &no_dismissals());
        assert_eq!(relevance_of(&doc, &eval, "sp1").relevance, Relevance::Irrelevant);
        assert_eq!(relevance_of(&doc, &eval, "sp2").relevance, Relevance::Relevant);
        assert_eq!(relevance_of(&doc, &eval, "genus").relevance, Relevance::Relevant);
    }

    #[test]
    fn test_dismissal_is_local_not_inherited() {
        let doc = genus_doc();
        let dismissed: HashSet<String> = ["genus".to_string()].into_iter().collect();
        let eval = propagate(&doc, &HashMap::new(), &dismissed);

        // The dismissed subtree root is forced irrelevant…
        let genus = relevance_of(&doc, &eval, "genus");
        assert_eq!(genus.relevance, Relevance::Irrelevant);
        assert!(genus.dismissed);
        // …but its children's own relevance is computed independently.
        assert_eq!(relevance_of(&doc, &eval, "sp1").relevance, Relevance::Relevant);
        assert_eq!(relevance_of(&doc, &eval, "sp2").relevance, Relevance::Relevant);
    }

    // ── Character relevance ───────────────────────────────────────────────

    #[test]
    fn test_character_answered_once_any_state_is() {
        let doc = two_taxon_doc();
        let eval = propagate(&doc, &answers(&[("s1", true)]), &no_dismissals());
        assert!(eval.characters[0].answered);
        assert_eq!(eval.characters[0].state_answers, vec![Some(true), None]);
    }

    #[test]
    fn test_character_irrelevant_once_all_states_answered() {
        let doc = build(
            vec![taxon("t1"), taxon("t2"), taxon("t3")],
            vec![character("c1", &["s1", "s2"])],
            vec![
                statement("t1", "c1", "s1", 0.5),
                statement("t2", "c1", "s2", 0.5),
                statement("t3", "c1", "s1", 0.5),
            ],
        );
        let eval = propagate(
            &doc,
            &answers(&[("s1", true), ("s2", false)]),
            &no_dismissals(),
        );
        assert!(!eval.characters[0].relevant);
    }

    #[test]
    fn test_character_discriminating_while_survivors_differ() {
        let doc = build(
            vec![taxon("t1"), taxon("t2"), taxon("t3")],
            vec![
                character("c1", &["s1", "s2"]),
                character("c2", &["s3", "s4"]),
            ],
            vec![
                statement("t1", "c1", "s1", 1.0),
                statement("t2", "c1", "s2", 1.0),
                statement("t3", "c1", "s2", 1.0),
                statement("t2", "c2", "s3", 1.0),
                statement("t3", "c2", "s4", 1.0),
            ],
        );
        let eval = propagate(&doc, &HashMap::new(), &no_dismissals());
        assert!(eval.characters[0].relevant);
        assert!(eval.characters[1].relevant);
    }

    #[test]
    fn test_character_irrelevant_when_survivors_identical() {
        // After observing s1, only t1 and t2 survive; both would answer c2
        // identically (both always show s3), so c2 cannot discriminate.
        let doc = build(
            vec![taxon("t1"), taxon("t2"), taxon("t3")],
            vec![
                character("c1", &["s1", "s2"]),
                character("c2", &["s3", "s4"]),
            ],
            vec![
                statement("t1", "c1", "s1", 1.0),
                statement("t2", "c1", "s1", 1.0),
                statement("t3", "c1", "s2", 1.0),
                statement("t1", "c2", "s3", 1.0),
                statement("t2", "c2", "s3", 1.0),
                statement("t3", "c2", "s4", 1.0),
            ],
        );
        let eval = propagate(&doc, &answers(&[("s1", true)]), &no_dismissals());
        assert_eq!(eval.relevant_taxa_count, 2);
        assert!(!eval.characters[1].relevant, "c2 cannot split t1 from t2");
        // c1 itself: s2 could still be answered, but eliminating with it
        // would remove both survivors at once — not a proper subset.
        assert!(!eval.characters[0].relevant);
    }

    #[test]
    fn test_soft_only_character_cannot_discriminate() {
        let doc = build(
            vec![taxon("t1"), taxon("t2")],
            vec![character("c1", &["s1", "s2"])],
            vec![
                statement("t1", "c1", "s1", 0.7),
                statement("t1", "c1", "s2", 0.3),
                statement("t2", "c1", "s1", 0.2),
                statement("t2", "c1", "s2", 0.8),
            ],
        );
        let eval = propagate(&doc, &HashMap::new(), &no_dismissals());
        // All evidence is soft; no answer can eliminate anything.
        assert!(!eval.characters[0].relevant);
    }

    #[test]
    fn test_characters_irrelevant_with_single_survivor() {
        let doc = two_taxon_doc();
        let dismissed: HashSet<String> = ["t2".to_string()].into_iter().collect();
        let eval = propagate(&doc, &HashMap::new(), &dismissed);
        assert_eq!(eval.relevant_taxa_count, 1);
        assert!(!eval.characters[0].relevant);
    }

    // ── Purity ────────────────────────────────────────────────────────────

    #[test]
    fn test_propagation_is_idempotent() {
        let doc = two_taxon_doc();
        let a = answers(&[("s1", true)]);
        let d = no_dismissals();
        let first = propagate(&doc, &a, &d);
        let second = propagate(&doc, &a, &d);
        assert_eq!(first, second);
        // No accumulation: conflicts recomputed from empty, not appended.
        let t2 = relevance_of(&doc, &second, "t2");
        assert_eq!(t2.conflicts.len(), 1);
    }

    #[test]
    fn test_monotonicity_under_added_answers() {
        let doc = genus_doc();
        let d = no_dismissals();
        let before = propagate(&doc, &HashMap::new(), &d).relevant_taxa_count;
        let after = propagate(&doc, &answers(&[("s2", true)]), &d).relevant_taxa_count;
        assert!(after <= before, "answers never grow the candidate set");
    }
}
