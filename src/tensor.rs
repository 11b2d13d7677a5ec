//! The numeric-tensor graph consumed by ML code.
//!
//! `x` has one row per node, `edge_index` is `2 x 2E` with every bond
//! emitted as (i, j) and then (j, i), and `edge_attr` repeats the bond row
//! for both directions.

use ndarray::Array2;
use tracing::debug;

use crate::features::{ATOM_FEATURE_COUNT, BOND_FEATURE_COUNT};
use crate::graph::{molecule_to_attributed, AttributedGraph, GraphError};
use crate::molecule::Molecule;
use crate::sentinel::{is_sentinel, sentinel_tensors};
use crate::toolkit::Toolkit;
use crate::ABSENT_MARKER;

#[derive(Debug, Clone, PartialEq)]
pub struct TensorGraph {
    pub x: Array2<f32>,
    pub edge_index: Array2<i64>,
    pub edge_attr: Array2<f32>,
    /// Provenance only. `"None"` when there is no source string.
    pub smiles: String,
    /// Provenance only.
    pub mol: Option<Molecule>,
}

impl TensorGraph {
    pub fn sentinel() -> Self {
        let (x, edge_index, edge_attr) = sentinel_tensors();
        Self {
            x,
            edge_index,
            edge_attr,
            smiles: ABSENT_MARKER.to_string(),
            mol: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.x, &self.edge_index, &self.edge_attr)
    }

    /// Encode an attributed graph. A graph without nodes or without edges
    /// becomes the sentinel.
    pub fn from_attributed(graph: &AttributedGraph, smiles: &str, mol: Option<Molecule>) -> Self {
        if graph.node_count() == 0 || graph.edge_count() == 0 {
            debug!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "degenerate graph, using sentinel"
            );
            return Self::sentinel();
        }

        let mut x = Array2::<f32>::zeros((graph.node_count(), ATOM_FEATURE_COUNT));
        for (i, node) in graph.nodes().enumerate() {
            for (j, value) in node.to_vector().into_iter().enumerate() {
                x[[i, j]] = value;
            }
        }

        let directed = 2 * graph.edge_count();
        let mut edge_index = Array2::<i64>::zeros((2, directed));
        let mut edge_attr = Array2::<f32>::zeros((directed, BOND_FEATURE_COUNT));
        for (k, (u, v, bond)) in graph.edges().enumerate() {
            let row = bond.to_vector();
            for (col, (from, to)) in [(u, v), (v, u)].into_iter().enumerate() {
                let column = 2 * k + col;
                edge_index[[0, column]] = from as i64;
                edge_index[[1, column]] = to as i64;
                for (j, &value) in row.iter().enumerate() {
                    edge_attr[[column, j]] = value;
                }
            }
        }

        Self {
            x,
            edge_index,
            edge_attr,
            smiles: smiles.to_string(),
            mol,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    /// Directed edge count, twice the bond count.
    pub fn num_edges(&self) -> usize {
        self.edge_index.ncols()
    }
}

/// Structure string straight to tensors.
///
/// The absent marker, rejected strings and bond-less molecules all give the
/// sentinel. Only toolkit failures are errors.
pub fn smiles_to_tensor(toolkit: &impl Toolkit, smiles: &str) -> Result<TensorGraph, GraphError> {
    if smiles == ABSENT_MARKER {
        return Ok(TensorGraph::sentinel());
    }
    let Some(molecule) = toolkit.parse(smiles)? else {
        debug!("toolkit rejected '{smiles}', using sentinel");
        return Ok(TensorGraph::sentinel());
    };
    let graph = molecule_to_attributed(&molecule)?;
    Ok(TensorGraph::from_attributed(&graph, smiles, Some(molecule)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::BondFeatures;
    use crate::SmilesToolkit;

    #[test]
    fn test_ethanol_tensor() {
        let tensor = smiles_to_tensor(&SmilesToolkit, "CCO").unwrap();
        assert_eq!(tensor.x.dim(), (3, 10));
        assert_eq!(tensor.edge_index.dim(), (2, 4));
        assert_eq!(tensor.edge_attr.dim(), (4, 5));
        assert_eq!(tensor.smiles, "CCO");
        assert!(tensor.mol.is_some());
        assert!(!tensor.is_sentinel());

        assert_eq!(tensor.edge_index.row(0).to_vec(), [0, 1, 1, 2]);
        assert_eq!(tensor.edge_index.row(1).to_vec(), [1, 0, 2, 1]);
        for k in 0..2 {
            assert_eq!(tensor.edge_attr.row(2 * k), tensor.edge_attr.row(2 * k + 1));
        }
        assert_eq!(tensor.edge_attr.row(0).to_vec(), [1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(tensor.x[[2, 0]], 8.0);
    }

    #[test]
    fn test_degenerate_inputs_give_sentinel() {
        for smiles in ["None", "invalid_garbage_string", "C", "C.C", "[Na+].[Cl-]"] {
            let tensor = smiles_to_tensor(&SmilesToolkit, smiles).unwrap();
            assert!(tensor.is_sentinel(), "{smiles}");
            assert_eq!(tensor, TensorGraph::sentinel());
        }
    }

    #[test]
    fn test_structures_the_toolkit_refuses_give_sentinel() {
        for smiles in ["C(C)(C)(C)(C)C", "O(C)(C)C", "c1cccc1", "c1ccnc1"] {
            assert!(smiles_to_tensor(&SmilesToolkit, smiles).unwrap().is_sentinel(), "{smiles}");
        }
    }

    #[test]
    fn test_heavy_element_structures() {
        let structures = [
            ("CC[Pb](CC)(CC)CC", 82.0),
            ("C[V]C", 23.0),
            ("O=[Mo](=O)=O", 42.0),
        ];
        for (smiles, atomic_num) in structures {
            let tensor = smiles_to_tensor(&SmilesToolkit, smiles).unwrap();
            assert!(!tensor.is_sentinel(), "{smiles}");
            assert!(tensor.x.column(0).iter().any(|&z| z == atomic_num), "{smiles}");
        }
    }

    #[test]
    fn test_kekule_and_aromatic_thiophene_agree() {
        for smiles in ["C1=CSC=C1", "c1ccsc1"] {
            let tensor = smiles_to_tensor(&SmilesToolkit, smiles).unwrap();
            assert_eq!(tensor.x.column(8).to_vec(), [1.0; 5], "{smiles}");
            assert!(tensor.edge_attr.column(3).iter().all(|&v| v == 1.0), "{smiles}");
        }
    }

    #[test]
    fn test_sentinel_is_reproducible() {
        let a = TensorGraph::sentinel();
        let b = TensorGraph::from_attributed(&AttributedGraph::sentinel(), "x", None);
        assert_eq!(a, b);
        assert_eq!(a.x.row(0).to_vec(), [0., 0., 0., 0., 0., 0., 0., 0., 2., 2.]);
        assert_eq!(a.edge_index.column(0).to_vec(), [0, 0]);
        assert_eq!(a.edge_attr.row(0).to_vec(), [0., 0., 2., 2., 2.]);
        assert_eq!(a.smiles, "None");
        assert!(a.mol.is_none());
    }

    #[test]
    fn test_empty_graph_is_sentinel() {
        let tensor = TensorGraph::from_attributed(&AttributedGraph::new(), "", None);
        assert!(tensor.is_sentinel());
    }

    #[test]
    fn test_edge_without_features_is_encoded() {
        let mut graph = AttributedGraph::sentinel();
        graph.add_node(Default::default());
        graph.add_edge(0, 1, BondFeatures::default());
        let tensor = TensorGraph::from_attributed(&graph, "", None);
        assert_eq!(tensor.num_nodes(), 2);
        assert_eq!(tensor.num_edges(), 2);
        assert!(!tensor.is_sentinel());
    }

    #[test]
    fn test_benzene_tensor() {
        let tensor = smiles_to_tensor(&SmilesToolkit, "c1ccccc1").unwrap();
        assert_eq!(tensor.num_nodes(), 6);
        assert_eq!(tensor.num_edges(), 12);
        for row in tensor.edge_attr.rows() {
            assert_eq!(row.to_vec(), [0.0, 0.0, 1.0, 1.0, 1.0]);
        }
    }
}
