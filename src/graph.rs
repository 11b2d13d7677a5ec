//! The attributed graph: one node per atom, one edge per bond, each carrying
//! its feature record.

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::debug;

use crate::features::{atom_feature, bond_feature, AtomFeatures, BondFeatures};
use crate::molecule::Molecule;
use crate::toolkit::{Toolkit, ToolkitError};
use crate::ABSENT_MARKER;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error("Atom at position {position} carries index {index}")]
    AtomIndex { position: usize, index: usize },
    #[error("Bond {bond} refers to atom {atom}, which does not exist")]
    BondEndpoint { bond: usize, atom: usize },
}

/// Node order is insertion order. At most one edge joins any pair of nodes.
#[derive(Debug, Clone, Default)]
pub struct AttributedGraph {
    graph: UnGraph<AtomFeatures, BondFeatures>,
}

impl AttributedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The attributed form of the sentinel: a single default node.
    pub fn sentinel() -> Self {
        let mut graph = Self::new();
        graph.add_node(AtomFeatures::default());
        graph
    }

    pub fn add_node(&mut self, features: AtomFeatures) -> usize {
        self.graph.add_node(features).index()
    }

    /// Join `a` and `b`, replacing the features if they are already joined.
    ///
    /// Both nodes must already exist.
    pub fn add_edge(&mut self, a: usize, b: usize, features: BondFeatures) -> usize {
        let (a, b) = (NodeIndex::new(a), NodeIndex::new(b));
        match self.graph.find_edge(a, b) {
            Some(edge) => {
                self.graph[edge] = features;
                edge.index()
            }
            None => self.graph.add_edge(a, b, features).index(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, index: usize) -> Option<&AtomFeatures> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    pub fn edge(&self, index: usize) -> Option<(usize, usize, &BondFeatures)> {
        let edge = EdgeIndex::new(index);
        let (a, b) = self.graph.edge_endpoints(edge)?;
        Some((a.index(), b.index(), &self.graph[edge]))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &AtomFeatures> {
        self.graph.node_weights()
    }

    /// Edges in insertion order as `(u, v, features)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &BondFeatures)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index(), edge.weight()))
    }
}

/// Build the attributed graph of a perceived molecule.
///
/// Atom `i` must carry index `i`, and every bond endpoint must name an atom.
pub fn molecule_to_attributed(molecule: &Molecule) -> Result<AttributedGraph, GraphError> {
    let mut graph = AttributedGraph::new();
    for (position, atom) in molecule.atoms().iter().enumerate() {
        if atom.index != position {
            return Err(GraphError::AtomIndex {
                position,
                index: atom.index,
            });
        }
        graph.add_node(atom_feature(atom));
    }

    let atom_count = molecule.atom_count();
    for (k, bond) in molecule.bonds().iter().enumerate() {
        for atom in [bond.begin, bond.end] {
            if atom >= atom_count {
                return Err(GraphError::BondEndpoint { bond: k, atom });
            }
        }
        graph.add_edge(bond.begin, bond.end, bond_feature(bond));
    }

    Ok(graph)
}

/// `Ok(None)` for the absent marker and for strings the toolkit rejects.
pub fn smiles_to_attributed(
    toolkit: &impl Toolkit,
    smiles: &str,
) -> Result<Option<AttributedGraph>, GraphError> {
    if smiles == ABSENT_MARKER {
        debug!("no structure given");
        return Ok(None);
    }
    match toolkit.parse(smiles)? {
        Some(molecule) => molecule_to_attributed(&molecule).map(Some),
        None => {
            debug!("toolkit rejected '{smiles}'");
            Ok(None)
        }
    }
}
