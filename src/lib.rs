use tracing::metadata::LevelFilter;

mod element;
pub use element::*;

mod parse;
pub use parse::*;

mod perceive;
pub use perceive::*;

pub mod molecule;
pub use molecule::{Atom, Bond, BondStereo, BondType, Hybridization, Molecule};

pub mod toolkit;
pub use toolkit::{SmilesToolkit, Toolkit, ToolkitError};

pub mod features;
pub use features::{atom_feature, bond_feature, AtomFeatures, BondFeatures};

pub mod graph;
pub use graph::{molecule_to_attributed, smiles_to_attributed, AttributedGraph, GraphError};

pub mod sentinel;

pub mod tensor;
pub use tensor::{smiles_to_tensor, TensorGraph};

pub mod graphml;
pub use graphml::GraphmlError;

pub mod loader;
pub use loader::{
    load_graph_dir, load_graph_dir_with, load_graph_file, scan_graph_dir, LoaderError, LoaderOptions,
};

pub mod batch;

/// The literal structure string that stands for "no structure available".
pub const ABSENT_MARKER: &str = "None";

/// An atom exactly as written in a SMILES string, before perception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmilesAtom {
    pub element: Element,
    /// Written in lowercase (`c`, `[nH]`).
    pub aromatic: bool,
    /// Written inside `[...]`. Bracket atoms never get implicit hydrogens.
    pub bracket: bool,
    /// Hydrogen count from a bracket atom (`[NH3+]` has 3).
    pub explicit_h: u32,
    pub charge: i32,
}

impl SmilesAtom {
    pub fn organic(element: Element, aromatic: bool) -> Self {
        Self {
            element,
            aromatic,
            bracket: false,
            explicit_h: 0,
            charge: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SmilesBondOrder {
    /// No bond symbol was written; single, or aromatic between two aromatic ring atoms.
    #[default]
    Implicit,
    Single,
    Double,
    Triple,
    Aromatic,
}

/// Direction of a `/` or `\` single bond, read from the first written atom to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondDirection {
    Up,
    Down,
}

impl BondDirection {
    pub fn flipped(self) -> Self {
        match self {
            BondDirection::Up => BondDirection::Down,
            BondDirection::Down => BondDirection::Up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmilesBond {
    pub order: SmilesBondOrder,
    pub direction: Option<BondDirection>,
}

/// The graph produced by the SMILES reader. Edge source is the atom written first.
pub type MoleculeGraph = petgraph::graph::UnGraph<SmilesAtom, SmilesBond>;

/// Install a `tracing` subscriber printing events up to `level`
/// (`"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"` or `"off"`).
///
/// Calling this again after a subscriber is installed does nothing.
pub fn init_logging(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .try_init();
}
