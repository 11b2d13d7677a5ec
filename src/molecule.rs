//! The parsed structure handed across the toolkit boundary.
//!
//! A [`Molecule`] is a flat list of perceived atoms and bonds. Atom `i` sits
//! at position `i` and carries `index == i`; bond endpoints refer to those
//! indices. Everything the feature extractors read is precomputed here.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::Element;

/// Orbital hybridization. Codes outside the known table are kept as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hybridization {
    #[default]
    Unspecified,
    S,
    SP,
    SP2,
    SP3,
    SP3D,
    SP3D2,
    Other,
    Unlisted(u32),
}

impl Hybridization {
    /// Integer category used in feature vectors.
    pub fn code(self) -> u32 {
        match self {
            Hybridization::Unspecified => 0,
            Hybridization::S => 1,
            Hybridization::SP => 2,
            Hybridization::SP2 => 3,
            Hybridization::SP3 => 4,
            Hybridization::SP3D => 5,
            Hybridization::SP3D2 => 6,
            Hybridization::Other => 7,
            Hybridization::Unlisted(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Hybridization::Unspecified,
            1 => Hybridization::S,
            2 => Hybridization::SP,
            3 => Hybridization::SP2,
            4 => Hybridization::SP3,
            5 => Hybridization::SP3D,
            6 => Hybridization::SP3D2,
            7 => Hybridization::Other,
            code => Hybridization::Unlisted(code),
        }
    }
}

/// Bond type by name. Names this crate does not perceive, such as `DATIVE`,
/// are kept as read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BondType {
    #[default]
    Unspecified,
    Single,
    Double,
    Triple,
    Aromatic,
    Unlisted(String),
}

impl BondType {
    pub fn name(&self) -> &str {
        match self {
            BondType::Unspecified => "UNSPECIFIED",
            BondType::Single => "SINGLE",
            BondType::Double => "DOUBLE",
            BondType::Triple => "TRIPLE",
            BondType::Aromatic => "AROMATIC",
            BondType::Unlisted(name) => name,
        }
    }

    /// Accepts the bare name and the `BondType.SINGLE` form. An empty name is
    /// `Unspecified`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let name = name.rsplit('.').next().unwrap_or(name);
        match name {
            "" | "UNSPECIFIED" => BondType::Unspecified,
            "SINGLE" => BondType::Single,
            "DOUBLE" => BondType::Double,
            "TRIPLE" => BondType::Triple,
            "AROMATIC" => BondType::Aromatic,
            other => BondType::Unlisted(other.to_string()),
        }
    }

    pub fn is_single(&self) -> bool {
        *self == BondType::Single
    }
}

impl Display for BondType {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    None,
    Any,
    Z,
    E,
    Cis,
    Trans,
    Unlisted(u32),
}

impl BondStereo {
    pub fn code(self) -> u32 {
        match self {
            BondStereo::None => 0,
            BondStereo::Any => 1,
            BondStereo::Z => 2,
            BondStereo::E => 3,
            BondStereo::Cis => 4,
            BondStereo::Trans => 5,
            BondStereo::Unlisted(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => BondStereo::None,
            1 => BondStereo::Any,
            2 => BondStereo::Z,
            3 => BondStereo::E,
            4 => BondStereo::Cis,
            5 => BondStereo::Trans,
            code => BondStereo::Unlisted(code),
        }
    }
}

/// A perceived atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub index: usize,
    pub element: Element,
    pub formal_charge: i32,
    pub degree: u32,
    pub num_implicit_hs: u32,
    /// Hydrogens written inside a bracket atom.
    pub num_explicit_hs: u32,
    pub explicit_valence: u32,
    pub implicit_valence: u32,
    pub num_radical_electrons: u32,
    pub hybridization: Hybridization,
    pub is_aromatic: bool,
    pub is_in_ring: bool,
}

impl Atom {
    pub fn atomic_num(&self) -> u32 {
        self.element.atomic_num() as u32
    }

    pub fn total_valence(&self) -> u32 {
        self.explicit_valence + self.implicit_valence
    }
}

/// A perceived bond between atoms `begin` and `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub index: usize,
    pub begin: usize,
    pub end: usize,
    pub bond_type: BondType,
    pub stereo: BondStereo,
    pub is_conjugated: bool,
    pub is_aromatic: bool,
    pub is_in_ring: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for code in 0..12 {
            assert_eq!(Hybridization::from_code(code).code(), code);
            assert_eq!(BondStereo::from_code(code).code(), code);
        }
        assert_eq!(Hybridization::from_code(3), Hybridization::SP2);
        assert_eq!(Hybridization::from_code(8), Hybridization::Unlisted(8));
        assert_eq!(BondStereo::from_code(6), BondStereo::Unlisted(6));
    }

    #[test]
    fn test_bond_type_names() {
        assert_eq!(BondType::from_name("SINGLE"), BondType::Single);
        assert_eq!(BondType::from_name("BondType.AROMATIC"), BondType::Aromatic);
        assert_eq!(BondType::from_name(""), BondType::Unspecified);
        assert_eq!(BondType::Double.to_string(), "DOUBLE");

        let dative = BondType::from_name("DATIVE");
        assert_eq!(dative, BondType::Unlisted("DATIVE".to_string()));
        assert_eq!(dative.name(), "DATIVE");
        assert!(!dative.is_single());
    }
}
