//! Wire shape of a key document.
//!
//! A key document arrives as already-parsed structured data (typically JSON
//! fetched by the host application). The shapes here mirror that wire format
//! field for field, with two duck-typed fields normalized once at this
//! boundary instead of checked ad hoc at every use site:
//!
//! - `title`, `description` and friends are either a bare string or a
//!   `{lang: text}` map — [`LocalizedText`].
//! - `language` is either a single locale code or a list — [`LanguageSet`].
//!
//! Everything optional is defaulted rather than rejected. Structural
//! validation (dangling statement references, repeated taxon ids) happens
//! later, in [`normalize`](crate::normalize::normalize) — deserialization
//! itself only fails on JSON that is not a document at all.
//!
//! Media attachments and agent references (creators, publishers,
//! contributors) carry no engine semantics; they pass through as opaque
//! [`serde_json::Value`]s for the presentation layer to resolve.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Localized text ─────────────────────────────────────────────────────────

/// A display string in one or more languages.
///
/// The wire format writes either `"Winged insects"` or
/// `{"en": "Winged insects", "nb": "Vingede insekter"}`. Both deserialize
/// into this enum; [`LocalizedText::get`] resolves a concrete language and
/// [`LocalizedText::any`] picks something displayable when the caller has
/// no preference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    /// A single string with no language attribution.
    Plain(String),
    /// Per-language variants keyed by locale code.
    ByLanguage(HashMap<String, String>),
}

impl LocalizedText {
    /// Resolve the text for a specific locale code.
    ///
    /// A [`LocalizedText::Plain`] value matches every language.
    pub fn get(&self, language: &str) -> Option<&str> {
        match self {
            LocalizedText::Plain(text) => Some(text.as_str()),
            LocalizedText::ByLanguage(map) => map.get(language).map(String::as_str),
        }
    }

    /// Any displayable variant, for callers without a language preference.
    pub fn any(&self) -> Option<&str> {
        match self {
            LocalizedText::Plain(text) => Some(text.as_str()),
            LocalizedText::ByLanguage(map) => map.values().next().map(String::as_str),
        }
    }

    /// True when no text is present in any language.
    pub fn is_empty(&self) -> bool {
        match self {
            LocalizedText::Plain(text) => text.is_empty(),
            LocalizedText::ByLanguage(map) => map.is_empty(),
        }
    }
}

impl Default for LocalizedText {
    fn default() -> Self {
        LocalizedText::Plain(String::new())
    }
}

// ─── Language set ───────────────────────────────────────────────────────────

/// The `language` field of a document: one locale code or several.
///
/// The wire format writes `"en"` for monolingual keys and `["en", "nb"]`
/// for multilingual ones; some producers emit a one-element list for a
/// monolingual key. [`LanguageSet::into_codes`] collapses all three shapes
/// into one canonical ordered list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LanguageSet {
    /// A single locale code.
    One(String),
    /// An ordered list of locale codes.
    Many(Vec<String>),
}

impl LanguageSet {
    /// Canonical form: an ordered list of locale codes, possibly empty.
    pub fn into_codes(self) -> Vec<String> {
        match self {
            LanguageSet::One(code) => vec![code],
            LanguageSet::Many(codes) => codes,
        }
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        LanguageSet::Many(Vec::new())
    }
}

// ─── Document members ───────────────────────────────────────────────────────

/// One rank of the classification chain above the key's root taxon.
///
/// Producers write the scientific name with a capitalized key
/// (`ScientificName`), matching upstream taxonomy services; any further
/// per-rank attributes ride along untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRank {
    /// Scientific name of this rank.
    #[serde(rename = "ScientificName", alias = "scientificName", default)]
    pub scientific_name: String,
    /// Remaining per-rank attributes, passed through for display.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A taxon as written on the wire: a node whose parent exclusively owns it
/// through the nested `children` array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTaxon {
    /// Document-unique taxon id.
    pub id: String,
    /// Scientific (latin) name.
    pub scientific_name: String,
    /// Localized vernacular name.
    pub vernacular_name: Option<LocalizedText>,
    /// Media reference, resolved by the presentation layer.
    pub media: Option<Value>,
    /// Long-form description.
    pub description: Option<LocalizedText>,
    /// Link to an external description page.
    pub description_url: Option<String>,
    /// Whether this taxon is a determination target. When absent, leaves
    /// default to `true` and inner nodes to `false` during normalization.
    pub is_result: Option<bool>,
    /// Link to another key that continues the determination.
    pub external_reference: Option<Value>,
    /// Child taxa, exclusively owned by this node.
    pub children: Vec<RawTaxon>,
}

/// An observable trait posed as a question, with its alternative states.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Character {
    /// Document-unique character id.
    pub id: String,
    /// Localized question title.
    pub title: LocalizedText,
    /// Long-form description of what to observe.
    pub description: Option<LocalizedText>,
    /// Link to an external description page.
    pub description_url: Option<String>,
    /// Media reference, resolved by the presentation layer.
    pub media: Option<Value>,
    /// The mutually exclusive alternatives, in display order.
    pub states: Vec<State>,
}

/// One possible answer value for a character.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct State {
    /// Document-unique state id.
    pub id: String,
    /// Localized alternative title.
    pub title: LocalizedText,
    /// Media reference, resolved by the presentation layer.
    pub media: Option<Value>,
    /// Long-form description.
    pub description: Option<LocalizedText>,
    /// Link to an external description page.
    pub description_url: Option<String>,
    /// Localized attribution or details for the description.
    pub description_details: Option<LocalizedText>,
}

/// An evidence record on the wire: taxon × state with an optional frequency.
///
/// `value` names the state; the state id alone identifies the character,
/// but the wire format spells the character out as well and normalization
/// verifies the two agree. A missing frequency means "always" and defaults
/// to 1 during normalization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStatement {
    /// Statement id.
    pub id: String,
    /// The taxon this evidence is about.
    pub taxon: String,
    /// The character the referenced state belongs to.
    pub character: String,
    /// The state id.
    pub value: String,
    /// Proportion of instances of the taxon exhibiting the state, in [0, 1].
    pub frequency: Option<f64>,
}

// ─── Key document ───────────────────────────────────────────────────────────

/// The root aggregate as it arrives from storage.
///
/// All fields are optional on the wire and defaulted here; see
/// [`normalize`](crate::normalize::normalize) for the structural invariants
/// enforced afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyDocument {
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
    /// Offered languages; one code or a list on the wire.
    pub language: LanguageSet,
    /// Ancestor chain of ranks above the key's root taxon.
    pub classification: Vec<ClassificationRank>,
    /// Last modification timestamp, passed through for display.
    pub last_modified: Option<String>,
    /// The taxon tree.
    pub taxa: Vec<RawTaxon>,
    /// The characters (questions).
    pub characters: Vec<Character>,
    /// The evidence statements.
    pub statements: Vec<RawStatement>,
    /// Media elements referenced by taxa, characters and states.
    pub media_elements: Vec<Value>,
}

impl KeyDocument {
    /// Deserialize a key document from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_text_accepts_bare_string() {
        let text: LocalizedText = serde_json::from_str("\"Wings present\"").unwrap();
        assert_eq!(text.get("en"), Some("Wings present"));
        assert_eq!(text.get("nb"), Some("Wings present"));
    }

    #[test]
    fn test_localized_text_accepts_language_map() {
        let text: LocalizedText =
            serde_json::from_str(r#"{"en": "Wings", "nb": "Vinger"}"#).unwrap();
        assert_eq!(text.get("en"), Some("Wings"));
        assert_eq!(text.get("nb"), Some("Vinger"));
        assert_eq!(text.get("de"), None);
        assert!(text.any().is_some());
    }

    #[test]
    fn test_language_set_shapes_collapse_to_codes() {
        let one: LanguageSet = serde_json::from_str("\"en\"").unwrap();
        let many: LanguageSet = serde_json::from_str(r#"["en", "nb"]"#).unwrap();
        let single_list: LanguageSet = serde_json::from_str(r#"["en"]"#).unwrap();

        assert_eq!(one.into_codes(), vec!["en".to_string()]);
        assert_eq!(many.into_codes(), vec!["en".to_string(), "nb".to_string()]);
        assert_eq!(single_list.into_codes(), vec!["en".to_string()]);
    }

    #[test]
    fn test_key_document_defaults_missing_fields() {
        let doc = KeyDocument::from_json(r#"{"id": "key:1", "title": "Test key"}"#).unwrap();
        assert_eq!(doc.id, "key:1");
        assert_eq!(doc.title.any(), Some("Test key"));
        assert!(doc.taxa.is_empty());
        assert!(doc.characters.is_empty());
        assert!(doc.statements.is_empty());
        assert!(doc.language.into_codes().is_empty());
    }

    #[test]
    fn test_statement_missing_frequency_is_none() {
        let sm: RawStatement = serde_json::from_str(
            r#"{"id": "statement:1", "taxon": "taxon:1", "character": "character:1", "value": "state:1"}"#,
        )
        .unwrap();
        assert_eq!(sm.frequency, None);
    }

    #[test]
    fn test_classification_rank_capitalized_key() {
        let rank: ClassificationRank =
            serde_json::from_str(r#"{"ScientificName": "Insecta", "Rank": "class"}"#).unwrap();
        assert_eq!(rank.scientific_name, "Insecta");
        assert!(rank.extra.contains_key("Rank"));
    }

    #[test]
    fn test_nested_taxa_deserialize() {
        let taxon: RawTaxon = serde_json::from_str(
            r#"{
                "id": "taxon:1",
                "scientificName": "Carabidae",
                "children": [
                    {"id": "taxon:2", "scientificName": "Carabus", "isResult": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(taxon.children.len(), 1);
        assert_eq!(taxon.children[0].is_result, Some(true));
        assert_eq!(taxon.is_result, None);
    }
}
