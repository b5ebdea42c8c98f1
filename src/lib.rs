//! # clavis-core
//!
//! Engine for interactive biological identification keys.
//!
//! A key document pairs a taxonomy (a strict tree of taxa) with observable
//! traits (characters, each offering mutually exclusive states) and evidence
//! statements (taxon × state, weighted by a frequency in [0, 1]). The user
//! answers true/false questions about states; after every answer, undo or
//! manual dismissal the engine recomputes which taxa remain consistent and
//! which questions are still worth asking.
//!
//! The crate is the inference core only. Rendering, localization pickup,
//! navigation, document fetching and media resolution are the embedding
//! application's business: it consumes the derived
//! [`Evaluation`](propagate::Evaluation) and feeds user actions back in.
//!
//! ## The pipeline
//!
//! ```text
//! wire JSON → KeyDocument → normalize → complete_statements ┐
//!                                                           ▼
//!                 answers/dismissals overlay ──────→ propagate → Evaluation
//!                        ▲                                          │
//!                        └────────── Session transitions ◄──────────┘
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`document`] | [`KeyDocument`](document::KeyDocument), [`LocalizedText`](document::LocalizedText) | Wire shape; duck-typed fields normalized at the boundary |
//! | [`normalize`] | [`Document`](normalize::Document) | Validation, taxon arena, frequency defaulting, indices |
//! | [`taxa`] | [`TaxonArena`](taxa::TaxonArena) | Arena tree, subset filters, membership test |
//! | [`completion`] | — | Synthesizes the implicit frequency-0 statements |
//! | [`alternatives`] | [`AlternativeInfo`](alternatives::AlternativeInfo) | Per-state sibling metadata for question rendering |
//! | [`propagate`] | [`Evaluation`](propagate::Evaluation), [`Conflict`](propagate::Conflict) | The relevance inference engine |
//! | [`session`] | [`Session`](session::Session) | Answer / undo / dismiss / reset / filter transitions |
//! | [`error`] | [`MalformedDocumentError`](error::MalformedDocumentError), [`TransitionError`](error::TransitionError) | Error taxonomy |
//!
//! ## Example
//!
//! ```
//! use clavis_core::document::KeyDocument;
//! use clavis_core::session::Session;
//!
//! let doc = KeyDocument::from_json(r#"{
//!     "id": "key:example",
//!     "title": "Two beetles",
//!     "language": "en",
//!     "taxa": [
//!         {"id": "t1", "scientificName": "Carabus coriaceus"},
//!         {"id": "t2", "scientificName": "Cicindela campestris"}
//!     ],
//!     "characters": [{
//!         "id": "c1",
//!         "title": "Elytra colour",
//!         "states": [
//!             {"id": "s1", "title": "Black"},
//!             {"id": "s2", "title": "Green"}
//!         ]
//!     }],
//!     "statements": [
//!         {"id": "m1", "taxon": "t1", "character": "c1", "value": "s1"},
//!         {"id": "m2", "taxon": "t2", "character": "c1", "value": "s2"}
//!     ]
//! }"#)?;
//!
//! let mut session = Session::load(doc)?;
//! assert_eq!(session.relevant_taxa_count(), 2);
//!
//! // Observing black elytra rules out the green species.
//! session.give_answers(&[("s1", Some(true))])?;
//! assert_eq!(session.relevant_taxa_count(), 1);
//!
//! let survivor = session.evaluation().results[0];
//! assert_eq!(
//!     session.document().taxa.get(survivor).scientific_name,
//!     "Carabus coriaceus"
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Evidence semantics
//!
//! A frequency of 1 means the taxon always exhibits the state, 0 means
//! never; both are hard evidence that can exclude. Intermediate values are
//! soft: they are surfaced as conflicts for display but never rule a taxon
//! out on their own. "No statement at all" means no evidence — the taxon is
//! untouched by answers about that character. Statement completion
//! ([`completion::complete_statements`]) is what keeps "never shows X"
//! distinct from "nothing known": any taxon with evidence for a character
//! gets explicit frequency-0 statements for the states it lacks.

#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod alternatives;
pub mod completion;
pub mod document;
pub mod error;
pub mod normalize;
pub mod propagate;
pub mod session;
pub mod taxa;
