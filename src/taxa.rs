//! Arena representation of the taxon tree, plus subset filters.
//!
//! The wire format nests children inside their parent, which is fine for
//! transport but awkward for an engine that needs ancestor traversal and
//! wholesale re-evaluation. The arena flattens the tree into a `Vec` in
//! depth-first document order, addresses nodes by index, and keeps a parent
//! table built once at construction — no back-pointers inside nodes, so
//! there is no cyclic-reference bookkeeping.
//!
//! Invariants:
//! - Node indices are depth-first document order; iterating `0..len()`
//!   visits parents before their children.
//! - Every child index in [`Taxon::children`] is a valid node, and the
//!   parent table is its exact inverse.
//! - Taxon ids are unique; a repeated id in the wire form is rejected as
//!   [`MalformedDocumentError::CyclicTaxa`].
//!
//! The filters ([`filter_taxa_by_ids`], [`filter_taxa_by_names`]) prune the
//! tree to a caller-supplied subset while preserving these invariants: the
//! named taxa keep their subtrees, their ancestor chains survive even when
//! the ancestors carry no direct evidence, and no child is ever orphaned.

use hashbrown::{HashMap, HashSet};
use serde_json::Value;

use crate::document::{LocalizedText, RawTaxon};
use crate::error::MalformedDocumentError;

// ─── Taxon node ─────────────────────────────────────────────────────────────

/// A taxon node inside the arena.
///
/// Identical to the wire shape except that `children` holds arena indices
/// and `is_result` has been resolved (absent on the wire defaults to `true`
/// for leaves, `false` for inner ranks).
#[derive(Clone, Debug, PartialEq)]
pub struct Taxon {
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
    /// Whether this taxon is a determination target.
    pub is_result: bool,
    /// Link to another key that continues the determination.
    pub external_reference: Option<Value>,
    /// Arena indices of this node's children, exclusively owned.
    pub children: Vec<usize>,
}

impl Taxon {
    /// True when this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// ─── Arena ──────────────────────────────────────────────────────────────────

/// The taxon tree as an arena of nodes addressed by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaxonArena {
    nodes: Vec<Taxon>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
    parent: Vec<Option<usize>>,
}

impl TaxonArena {
    /// Flatten a wire-format taxon forest into an arena.
    ///
    /// Fails with [`MalformedDocumentError::CyclicTaxa`] when a taxon id
    /// occurs more than once — the nested wire form cannot express a true
    /// cycle, so a repeated id is how one manifests.
    pub fn from_raw(raw: &[RawTaxon]) -> Result<Self, MalformedDocumentError> {
        let mut arena = TaxonArena::default();
        for taxon in raw {
            let root = arena.add(taxon, None)?;
            arena.roots.push(root);
        }
        Ok(arena)
    }

    fn add(&mut self, raw: &RawTaxon, parent: Option<usize>) -> Result<usize, MalformedDocumentError> {
        if self.index.contains_key(&raw.id) {
            return Err(MalformedDocumentError::CyclicTaxa {
                taxon: raw.id.clone(),
            });
        }
        let idx = self.nodes.len();
        self.nodes.push(Taxon {
            id: raw.id.clone(),
            scientific_name: raw.scientific_name.clone(),
            vernacular_name: raw.vernacular_name.clone(),
            media: raw.media.clone(),
            description: raw.description.clone(),
            description_url: raw.description_url.clone(),
            is_result: raw.is_result.unwrap_or(raw.children.is_empty()),
            external_reference: raw.external_reference.clone(),
            children: Vec::with_capacity(raw.children.len()),
        });
        self.index.insert(raw.id.clone(), idx);
        self.parent.push(parent);

        for child in &raw.children {
            let child_idx = self.add(child, Some(idx))?;
            self.nodes[idx].children.push(child_idx);
        }
        Ok(idx)
    }

    // ── Read accessors ─────────────────────────────────────────────────────

    /// Number of taxa in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds no taxa.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at `idx`. Panics on an out-of-range index; indices obtained
    /// from this arena are always valid.
    pub fn get(&self, idx: usize) -> &Taxon {
        &self.nodes[idx]
    }

    /// Arena index of a taxon id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// True when the arena contains a taxon with this id.
    pub fn contains_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Indices of the root taxa, in document order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Iterate all nodes with their indices, in depth-first document order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Taxon)> {
        self.nodes.iter().enumerate()
    }

    /// Parent index of a node, `None` for roots.
    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.parent[idx]
    }

    /// Ancestor chain of a node, nearest ancestor first.
    pub fn ancestors_of(&self, idx: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = self.parent[idx];
        while let Some(p) = cursor {
            chain.push(p);
            cursor = self.parent[p];
        }
        chain
    }

    // ── Pruning ────────────────────────────────────────────────────────────

    /// Copy the subset of this arena reachable from `new_roots` through
    /// nodes in `keep`, preserving document order.
    fn retain(&self, keep: &HashSet<usize>, new_roots: &[usize]) -> TaxonArena {
        let mut pruned = TaxonArena::default();
        for &root in new_roots {
            if keep.contains(&root) {
                let idx = pruned.copy_subtree(self, root, keep, None);
                pruned.roots.push(idx);
            }
        }
        pruned
    }

    fn copy_subtree(
        &mut self,
        source: &TaxonArena,
        node: usize,
        keep: &HashSet<usize>,
        parent: Option<usize>,
    ) -> usize {
        let idx = self.nodes.len();
        let mut copy = source.nodes[node].clone();
        copy.children = Vec::new();
        self.index.insert(copy.id.clone(), idx);
        self.nodes.push(copy);
        self.parent.push(parent);

        for &child in &source.nodes[node].children {
            if keep.contains(&child) {
                let child_idx = self.copy_subtree(source, child, keep, Some(idx));
                self.nodes[idx].children.push(child_idx);
            }
        }
        idx
    }

    /// Expand a set of matched nodes to the full keep set: the matches,
    /// their entire subtrees, and their ancestor chains.
    fn closure(&self, matched: &HashSet<usize>) -> HashSet<usize> {
        let mut keep = HashSet::new();
        for &m in matched {
            self.mark_subtree(m, &mut keep);
            for ancestor in self.ancestors_of(m) {
                keep.insert(ancestor);
            }
        }
        keep
    }

    fn mark_subtree(&self, node: usize, keep: &mut HashSet<usize>) {
        if keep.insert(node) {
            for &child in &self.nodes[node].children {
                self.mark_subtree(child, keep);
            }
        }
    }

    /// Deepest node that lies on the root path of every matched node, if
    /// the matches share one.
    fn nearest_common_ancestor(&self, matched: &HashSet<usize>) -> Option<usize> {
        let mut paths = matched.iter().map(|&m| {
            let mut path = self.ancestors_of(m);
            path.reverse();
            path.push(m);
            path
        });
        let mut prefix = paths.next()?;
        for path in paths {
            let shared = prefix
                .iter()
                .zip(path.iter())
                .take_while(|(a, b)| a == b)
                .count();
            prefix.truncate(shared);
            if prefix.is_empty() {
                return None;
            }
        }
        prefix.last().copied()
    }
}

// ─── Subset filters ─────────────────────────────────────────────────────────

/// Prune the tree to the taxa named by id, for embedding a key scoped to a
/// caller-supplied subset of species.
///
/// Named taxa keep their subtrees (selecting a genus keeps its species) and
/// their ancestor chains stay in place even when an ancestor carries no
/// direct evidence. Unknown ids are ignored; an id list matching nothing
/// yields an empty tree.
pub fn filter_taxa_by_ids<S: AsRef<str>>(arena: &TaxonArena, ids: &[S]) -> TaxonArena {
    let matched: HashSet<usize> = ids
        .iter()
        .filter_map(|id| arena.index_of(id.as_ref()))
        .collect();
    let keep = arena.closure(&matched);
    arena.retain(&keep, arena.roots())
}

/// Prune the tree to the taxa whose scientific name matches, optionally
/// collapsing the result to the nearest common ancestor of the matches.
///
/// With `keep_common_ancestor` set and all matches sharing an ancestor, the
/// pruned tree is re-rooted at that ancestor and the ranks above it are
/// dropped; otherwise the original roots are kept, as in
/// [`filter_taxa_by_ids`].
pub fn filter_taxa_by_names<S: AsRef<str>>(
    arena: &TaxonArena,
    names: &[S],
    keep_common_ancestor: bool,
) -> TaxonArena {
    let wanted: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
    let matched: HashSet<usize> = arena
        .iter()
        .filter(|(_, taxon)| wanted.contains(taxon.scientific_name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    let keep = arena.closure(&matched);

    if keep_common_ancestor {
        if let Some(nca) = arena.nearest_common_ancestor(&matched) {
            return arena.retain(&keep, &[nca]);
        }
    }
    arena.retain(&keep, arena.roots())
}

/// Recursive membership test by exact scientific-name match, over the
/// (possibly filtered) tree.
pub fn is_part_of_key(arena: &TaxonArena, scientific_name: &str) -> bool {
    arena
        .iter()
        .any(|(_, taxon)| taxon.scientific_name == scientific_name)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
