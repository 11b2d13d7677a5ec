//! The chemistry toolkit boundary.
//!
//! Graph construction only needs one capability from a toolkit: turn a
//! structure string into a perceived [`Molecule`], or report that it cannot.

use thiserror::Error;
use tracing::debug;

use crate::molecule::Molecule;
use crate::{parse_smiles, perceive};

/// A failure inside the toolkit itself, as opposed to a rejected input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolkitError {
    #[error("Toolkit failure while parsing '{smiles}': {message}")]
    Internal { smiles: String, message: String },
}

pub trait Toolkit {
    /// `Ok(None)` means the string is not a structure this toolkit accepts.
    fn parse(&self, smiles: &str) -> Result<Option<Molecule>, ToolkitError>;
}

/// SMILES reading plus perception, all in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesToolkit;

impl Toolkit for SmilesToolkit {
    fn parse(&self, smiles: &str) -> Result<Option<Molecule>, ToolkitError> {
        let graph = match parse_smiles(smiles) {
            Ok(graph) => graph,
            Err(err) => {
                debug!("rejected '{smiles}': {err}");
                return Ok(None);
            }
        };

        match perceive(&graph) {
            Ok(molecule) => Ok(Some(molecule)),
            Err(err) => {
                debug!("rejected '{smiles}': {err}");
                Ok(None)
            }
        }
    }
}

impl<T: Toolkit + ?Sized> Toolkit for &T {
    fn parse(&self, smiles: &str) -> Result<Option<Molecule>, ToolkitError> {
        (**self).parse(smiles)
    }
}
