//! Statement completion — synthesizing the missing negative evidence.
//!
//! Observational data is sparse: a producer records the states a taxon
//! *does* show and rarely writes out the zeros. For matching, though,
//! "known for this character but never shows this state" must be explicit,
//! otherwise "no evidence of X" and "evidence of never-X" are
//! indistinguishable.
//!
//! For every character, any taxon that carries at least one statement for
//! the character is *known* for it. For every state of that character, any
//! known taxon lacking a statement for that specific state gets a
//! synthesized frequency-0 statement. Synthesized ids follow the pattern
//! `statement:<stateId>_<taxonId>_0`.
//!
//! The pass is idempotent: synthesized statements count toward the
//! per-state coverage, so a second run finds no gaps.

use hashbrown::HashSet;

use crate::normalize::{Document, Statement};

/// Synthesize the implicit frequency-0 statements so that every taxon with
/// any evidence for a character has an explicit frequency for each of that
/// character's states.
///
/// Appends to `doc.statements` (original statements keep their positions)
/// and refreshes the frequency index. No other field changes.
pub fn complete_statements(doc: &mut Document) {
    let mut synthesized: Vec<Statement> = Vec::new();

    for character in &doc.characters {
        // Taxa known for this character, in first-statement order so the
        // synthesized list is deterministic.
        let mut taxa_with_character: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for sm in &doc.statements {
            if sm.character == character.id && seen.insert(sm.taxon.as_str()) {
                taxa_with_character.push(sm.taxon.as_str());
            }
        }

        for state in &character.states {
            // State ids are document-unique, so matching on the state alone
            // is equivalent to matching on (character, state).
            let taxa_with_state: HashSet<&str> = doc
                .statements
                .iter()
                .filter(|sm| sm.state == state.id)
                .map(|sm| sm.taxon.as_str())
                .collect();

            for &taxon in &taxa_with_character {
                if !taxa_with_state.contains(taxon) {
                    synthesized.push(Statement {
                        id: format!("statement:{}_{}_0", state.id, taxon),
                        taxon: taxon.to_string(),
                        character: character.id.clone(),
                        state: state.id.clone(),
                        frequency: 0.0,
                    });
                }
            }
        }
    }

    if !synthesized.is_empty() {
        log::debug!(
            "completed key `{}`: {} synthesized frequency-0 statements",
            doc.id,
            synthesized.len()
        );
        doc.statements.extend(synthesized);
        doc.rebuild_statement_index();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
