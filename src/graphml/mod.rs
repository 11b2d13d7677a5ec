//! GraphML persistence of [`AttributedGraph`](crate::AttributedGraph)s.
//!
//! Every feature field is stored as a `<data>` entry under its field name.
//! Booleans are written `True`/`False`, bond types by name, everything else
//! as a decimal integer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod reader;
mod writer;
mod xml;

pub use reader::{read_graphml, read_graphml_file};
pub use writer::{write_graphml, write_graphml_file};

#[derive(Debug, Error)]
pub enum GraphmlError {
    #[error("Could not access '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed XML: {0}")]
    Xml(String),
    #[error("Expected a <{expected}> element, found <{found}>")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },
    #[error("The document has no <graph> element")]
    MissingGraph,
    #[error("A <{element}> element has no '{attribute}' attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Long,
    Boolean,
    Text,
}

impl FieldKind {
    pub(crate) fn attr_type(self) -> &'static str {
        match self {
            FieldKind::Long => "long",
            FieldKind::Boolean => "boolean",
            FieldKind::Text => "string",
        }
    }
}

pub(crate) const NODE_FIELDS: [(&str, FieldKind); 10] = [
    ("atomic_num", FieldKind::Long),
    ("degree", FieldKind::Long),
    ("num_implicit_h", FieldKind::Long),
    ("explicit_valence", FieldKind::Long),
    ("implicit_valence", FieldKind::Long),
    ("total_valence", FieldKind::Long),
    ("num_radical_e", FieldKind::Long),
    ("hybridization", FieldKind::Long),
    ("is_aromatic", FieldKind::Boolean),
    ("in_ring", FieldKind::Boolean),
];

pub(crate) const EDGE_FIELDS: [(&str, FieldKind); 5] = [
    ("bond_type", FieldKind::Text),
    ("stereo", FieldKind::Long),
    ("is_conjugated", FieldKind::Boolean),
    ("is_aromatic", FieldKind::Boolean),
    ("in_ring", FieldKind::Boolean),
];

pub(crate) fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
