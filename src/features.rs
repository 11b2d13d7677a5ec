//! Per-atom and per-bond feature records.
//!
//! The field order of [`AtomFeatures`] and [`BondFeatures`] is the column
//! order of the tensor encoding and of nothing else: GraphML stores the
//! fields by name.

use crate::molecule::{Atom, Bond, BondStereo, BondType, Hybridization};

pub const ATOM_FEATURE_COUNT: usize = 10;
pub const BOND_FEATURE_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtomFeatures {
    pub atomic_num: u32,
    pub degree: u32,
    pub num_implicit_h: u32,
    pub explicit_valence: u32,
    pub implicit_valence: u32,
    pub total_valence: u32,
    pub num_radical_e: u32,
    pub hybridization: Hybridization,
    pub is_aromatic: bool,
    pub in_ring: bool,
}

impl AtomFeatures {
    pub fn to_vector(&self) -> [f32; ATOM_FEATURE_COUNT] {
        [
            self.atomic_num as f32,
            self.degree as f32,
            self.num_implicit_h as f32,
            self.explicit_valence as f32,
            self.implicit_valence as f32,
            self.total_valence as f32,
            self.num_radical_e as f32,
            self.hybridization.code() as f32,
            flag(self.is_aromatic),
            flag(self.in_ring),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BondFeatures {
    pub bond_type: BondType,
    pub stereo: BondStereo,
    pub is_conjugated: bool,
    pub is_aromatic: bool,
    pub in_ring: bool,
}

impl BondFeatures {
    /// The bond type column only distinguishes single bonds from the rest,
    /// unlisted types included.
    pub fn to_vector(&self) -> [f32; BOND_FEATURE_COUNT] {
        [
            flag(self.bond_type.is_single()),
            self.stereo.code() as f32,
            flag(self.is_conjugated),
            flag(self.is_aromatic),
            flag(self.in_ring),
        ]
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

pub fn atom_feature(atom: &Atom) -> AtomFeatures {
    AtomFeatures {
        atomic_num: atom.atomic_num(),
        degree: atom.degree,
        num_implicit_h: atom.num_implicit_hs,
        explicit_valence: atom.explicit_valence,
        implicit_valence: atom.implicit_valence,
        total_valence: atom.total_valence(),
        num_radical_e: atom.num_radical_electrons,
        hybridization: atom.hybridization,
        is_aromatic: atom.is_aromatic,
        in_ring: atom.is_in_ring,
    }
}

pub fn bond_feature(bond: &Bond) -> BondFeatures {
    BondFeatures {
        bond_type: bond.bond_type.clone(),
        stereo: bond.stereo,
        is_conjugated: bond.is_conjugated,
        is_aromatic: bond.is_aromatic,
        in_ring: bond.is_in_ring,
    }
}
