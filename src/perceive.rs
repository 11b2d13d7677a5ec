//! Chemical perception over a freshly parsed [`MoleculeGraph`].
//!
//! Turns the atoms and bonds as written into [`Molecule`] records: ring
//! membership, kekulization, aromaticity, valences, radicals, conjugation,
//! hybridization and double bond stereo.

use std::collections::VecDeque;

use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::trace;

use crate::molecule::{Atom, Bond, BondStereo, BondType, Hybridization, Molecule};
use crate::{BondDirection, Element, MoleculeGraph, SmilesAtom, SmilesBond, SmilesBondOrder};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PerceptionError {
    #[error("Aromatic atom {0} is not part of a ring")]
    NonRingAromaticAtom(usize),
    #[error("The aromatic system containing atom {0} has no Kekulé form")]
    Kekulization(usize),
    #[error("Atom {atom} has valence {valence}, above the {allowed} its element allows")]
    Valence { atom: usize, valence: u32, allowed: u32 },
}

const MIN_RING_SIZE: usize = 5;
const MAX_RING_SIZE: usize = 7;

/// A bond as written, with its endpoints in writing order.
struct WrittenBond {
    begin: usize,
    end: usize,
    bond: SmilesBond,
}

/// A simple cycle: atoms in walking order, and `bonds[k]` joins `atoms[k]`
/// to the next atom.
struct Ring {
    atoms: Vec<usize>,
    bonds: Vec<usize>,
}

/// Perceive every property the feature extractors need.
pub fn perceive(graph: &MoleculeGraph) -> Result<Molecule, PerceptionError> {
    let atoms: Vec<SmilesAtom> = graph.node_weights().copied().collect();
    let bonds: Vec<WrittenBond> = graph
        .edge_references()
        .map(|edge| WrittenBond {
            begin: edge.source().index(),
            end: edge.target().index(),
            bond: *edge.weight(),
        })
        .collect();

    // (neighbor, bond index) per atom
    let mut adjacency = vec![Vec::new(); atoms.len()];
    for (k, bond) in bonds.iter().enumerate() {
        adjacency[bond.begin].push((bond.end, k));
        adjacency[bond.end].push((bond.begin, k));
    }

    let bond_in_ring = ring_bonds(&adjacency, &bonds);
    let mut atom_in_ring = vec![false; atoms.len()];
    for (k, bond) in bonds.iter().enumerate() {
        if bond_in_ring[k] {
            atom_in_ring[bond.begin] = true;
            atom_in_ring[bond.end] = true;
        }
    }

    let mut aromatic: Vec<bool> = atoms.iter().map(|atom| atom.aromatic).collect();
    if let Some(i) = (0..atoms.len()).find(|&i| aromatic[i] && !atom_in_ring[i]) {
        return Err(PerceptionError::NonRingAromaticAtom(i));
    }

    // Ring bonds between lowercase atoms, and `:` ring bonds.
    let delocalized: Vec<bool> = bonds
        .iter()
        .enumerate()
        .map(|(k, b)| {
            bond_in_ring[k]
                && match b.bond.order {
                    SmilesBondOrder::Implicit => aromatic[b.begin] && aromatic[b.end],
                    SmilesBondOrder::Aromatic => true,
                    _ => false,
                }
        })
        .collect();
    let orders = kekulize(&atoms, &adjacency, &bonds, &delocalized)?;

    let mut bond_types: Vec<BondType> = (0..bonds.len())
        .map(|k| match orders[k] {
            _ if delocalized[k] => BondType::Aromatic,
            2 => BondType::Double,
            3 => BondType::Triple,
            _ => BondType::Single,
        })
        .collect();

    let degree: Vec<u32> = adjacency.iter().map(|n| n.len() as u32).collect();

    let mut explicit_valence = Vec::with_capacity(atoms.len());
    for (i, atom) in atoms.iter().enumerate() {
        let bonded: u32 = adjacency[i].iter().map(|&(_, k)| orders[k]).sum();
        let valence = atom.explicit_h + bonded;
        check_valence(i, atom, valence)?;
        explicit_valence.push(valence);
    }
    let implicit_valence: Vec<u32> = (0..atoms.len())
        .map(|i| implicit_valence(&atoms[i], explicit_valence[i]))
        .collect();
    let total_hs: Vec<u32> = (0..atoms.len())
        .map(|i| atoms[i].explicit_h + implicit_valence[i])
        .collect();

    let pi_system = PiSystem {
        atoms: &atoms,
        adjacency: &adjacency,
        orders: &orders,
        total_hs: &total_hs,
        atom_in_ring: &atom_in_ring,
    };
    for ring in small_rings(&adjacency, &bond_in_ring) {
        let done = ring.atoms.iter().all(|&a| aromatic[a])
            && ring.bonds.iter().all(|&k| bond_types[k] == BondType::Aromatic);
        if done || !pi_system.is_aromatic(&ring) {
            continue;
        }
        for &a in &ring.atoms {
            aromatic[a] = true;
        }
        for &k in &ring.bonds {
            bond_types[k] = BondType::Aromatic;
        }
    }

    let radicals: Vec<u32> = (0..atoms.len())
        .map(|i| {
            if atoms[i].bracket {
                radical_electrons(&atoms[i], degree[i], explicit_valence[i])
            } else {
                0
            }
        })
        .collect();

    let electrons = ElectronCounts {
        atoms: &atoms,
        degree: &degree,
        total_hs,
        total_valence: (0..atoms.len())
            .map(|i| explicit_valence[i] + implicit_valence[i])
            .collect(),
        radicals: &radicals,
    };

    let conjugated = assign_conjugation(&electrons, &adjacency, &bond_types);

    let mut molecule = Molecule::default();
    for (i, atom) in atoms.iter().enumerate() {
        let has_conjugated = adjacency[i].iter().any(|&(_, k)| conjugated[k]);
        molecule.atoms.push(Atom {
            index: i,
            element: atom.element,
            formal_charge: atom.charge,
            degree: degree[i],
            num_implicit_hs: implicit_valence[i],
            num_explicit_hs: atom.explicit_h,
            explicit_valence: explicit_valence[i],
            implicit_valence: implicit_valence[i],
            num_radical_electrons: radicals[i],
            hybridization: electrons.hybridization(i, has_conjugated),
            is_aromatic: aromatic[i],
            is_in_ring: atom_in_ring[i],
        });
    }

    for (k, b) in bonds.iter().enumerate() {
        let stereo = if bond_types[k] == BondType::Double && !bond_in_ring[k] {
            double_bond_stereo(b, k, &adjacency, &bonds)
        } else {
            BondStereo::None
        };
        molecule.bonds.push(Bond {
            index: k,
            begin: b.begin,
            end: b.end,
            bond_type: bond_types[k].clone(),
            stereo,
            is_conjugated: conjugated[k],
            is_aromatic: bond_types[k] == BondType::Aromatic,
            is_in_ring: bond_in_ring[k],
        });
    }

    trace!(
        atoms = molecule.atom_count(),
        bonds = molecule.bond_count(),
        "perceived molecule"
    );
    Ok(molecule)
}

/// A bond is in a ring when its endpoints stay connected without it.
fn ring_bonds(adjacency: &[Vec<(usize, usize)>], bonds: &[WrittenBond]) -> Vec<bool> {
    bonds
        .iter()
        .enumerate()
        .map(|(k, bond)| {
            let mut seen = vec![false; adjacency.len()];
            let mut queue = VecDeque::from([bond.begin]);
            seen[bond.begin] = true;
            while let Some(atom) = queue.pop_front() {
                for &(next, edge) in &adjacency[atom] {
                    if edge == k || seen[next] {
                        continue;
                    }
                    if next == bond.end {
                        return true;
                    }
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
            false
        })
        .collect()
}

/// Every simple cycle of five to seven ring bonds, each reported once.
fn small_rings(adjacency: &[Vec<(usize, usize)>], bond_in_ring: &[bool]) -> Vec<Ring> {
    let mut rings = Vec::new();
    for start in 0..adjacency.len() {
        let mut atoms = vec![start];
        let mut bonds = Vec::new();
        extend_ring(adjacency, bond_in_ring, &mut atoms, &mut bonds, &mut rings);
    }
    rings
}

fn extend_ring(
    adjacency: &[Vec<(usize, usize)>],
    bond_in_ring: &[bool],
    atoms: &mut Vec<usize>,
    bonds: &mut Vec<usize>,
    rings: &mut Vec<Ring>,
) {
    let start = atoms[0];
    let last = atoms[atoms.len() - 1];
    for &(next, edge) in &adjacency[last] {
        if !bond_in_ring[edge] {
            continue;
        }
        if next == start {
            // The lowest atom starts the walk and the direction is fixed by
            // comparing its two ring neighbors.
            if atoms.len() >= MIN_RING_SIZE && atoms[1] < atoms[atoms.len() - 1] {
                let mut ring_bonds = bonds.clone();
                ring_bonds.push(edge);
                rings.push(Ring {
                    atoms: atoms.clone(),
                    bonds: ring_bonds,
                });
            }
            continue;
        }
        if atoms.len() == MAX_RING_SIZE || next < start || atoms.contains(&next) {
            continue;
        }
        atoms.push(next);
        bonds.push(edge);
        extend_ring(adjacency, bond_in_ring, atoms, bonds, rings);
        atoms.pop();
        bonds.pop();
    }
}

fn written_order(order: SmilesBondOrder) -> u32 {
    match order {
        SmilesBondOrder::Double => 2,
        SmilesBondOrder::Triple => 3,
        SmilesBondOrder::Implicit | SmilesBondOrder::Single | SmilesBondOrder::Aromatic => 1,
    }
}

/// Whether an aromatic atom must take one double bond in the Kekulé form,
/// given the valence `used` by its single bonds and hydrogens.
fn needs_double(atom: &SmilesAtom, used: u32) -> bool {
    let used = used as i32;
    let Some(target) = atom
        .element
        .default_valences()
        .iter()
        .map(|&v| v as i32 + atom.charge)
        .filter(|&v| v > 0)
        .find(|&v| v >= used)
    else {
        return false;
    };

    let gap = target - used;
    if atom.bracket {
        gap == 1 || (gap == 2 && atom.explicit_h == 0 && atom.charge != 0)
    } else {
        // Implicit hydrogens fill whatever the double bond leaves.
        gap >= 1
    }
}

/// Kekulé bond orders: the written order of every localized bond, and a
/// perfect matching of double bonds over the delocalized ones.
fn kekulize(
    atoms: &[SmilesAtom],
    adjacency: &[Vec<(usize, usize)>],
    bonds: &[WrittenBond],
    delocalized: &[bool],
) -> Result<Vec<u32>, PerceptionError> {
    let mut orders: Vec<u32> = bonds.iter().map(|b| written_order(b.bond.order)).collect();

    let needs: Vec<bool> = (0..atoms.len())
        .map(|i| {
            let bonded: u32 = adjacency[i].iter().map(|&(_, k)| orders[k]).sum();
            let used = atoms[i].explicit_h + bonded;
            atoms[i].aromatic
                && adjacency[i].iter().any(|&(_, k)| delocalized[k])
                && needs_double(&atoms[i], used)
        })
        .collect();

    let candidates: Vec<Vec<(usize, usize)>> = (0..atoms.len())
        .map(|i| {
            adjacency[i]
                .iter()
                .copied()
                .filter(|&(next, k)| needs[i] && needs[next] && delocalized[k])
                .collect()
        })
        .collect();

    let mut unmatched = needs.clone();
    let mut doubles = vec![false; bonds.len()];
    for component in components(&candidates, &needs) {
        if component.len() % 2 == 1
            || !match_component(&component, &candidates, &mut unmatched, &mut doubles)
        {
            return Err(PerceptionError::Kekulization(component[0]));
        }
    }

    for (order, double) in orders.iter_mut().zip(doubles) {
        if double {
            *order = 2;
        }
    }
    Ok(orders)
}

/// Connected groups of atoms that need a double bond, lowest atom first.
fn components(candidates: &[Vec<(usize, usize)>], needs: &[bool]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; needs.len()];
    let mut components = Vec::new();
    for start in 0..needs.len() {
        if !needs[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            for &(next, _) in &candidates[atom] {
                if !seen[next] {
                    seen[next] = true;
                    component.push(next);
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Pair up every unmatched atom of `component`, starting from the atom with
/// the fewest free partners.
fn match_component(
    component: &[usize],
    candidates: &[Vec<(usize, usize)>],
    unmatched: &mut [bool],
    doubles: &mut [bool],
) -> bool {
    let Some(atom) = component
        .iter()
        .copied()
        .filter(|&a| unmatched[a])
        .min_by_key(|&a| candidates[a].iter().filter(|&&(n, _)| unmatched[n]).count())
    else {
        return true;
    };

    unmatched[atom] = false;
    for &(next, bond) in &candidates[atom] {
        if !unmatched[next] {
            continue;
        }
        unmatched[next] = false;
        doubles[bond] = true;
        if match_component(component, candidates, unmatched, doubles) {
            return true;
        }
        unmatched[next] = true;
        doubles[bond] = false;
    }
    unmatched[atom] = true;
    false
}

/// Neutral atoms may not exceed their largest normal valence.
fn check_valence(index: usize, atom: &SmilesAtom, valence: u32) -> Result<(), PerceptionError> {
    match atom.element.default_valences().last() {
        Some(&allowed) if atom.charge == 0 && valence > allowed => Err(PerceptionError::Valence {
            atom: index,
            valence,
            allowed,
        }),
        _ => Ok(()),
    }
}

fn is_heteroatom(element: Element) -> bool {
    matches!(element, Element::N | Element::O | Element::S)
}

/// What the Hückel test reads about each atom.
struct PiSystem<'a> {
    atoms: &'a [SmilesAtom],
    adjacency: &'a [Vec<(usize, usize)>],
    orders: &'a [u32],
    total_hs: &'a [u32],
    atom_in_ring: &'a [bool],
}

impl PiSystem<'_> {
    /// A ring is aromatic when every atom joins its pi system and the
    /// electron count is 4n + 2.
    fn is_aromatic(&self, ring: &Ring) -> bool {
        let electrons: Option<u32> = ring
            .atoms
            .iter()
            .map(|&a| self.pi_electrons(a, ring))
            .sum();
        matches!(electrons, Some(n) if n >= 2 && (n - 2) % 4 == 0)
    }

    /// Pi electrons atom `i` gives to `ring`, or `None` if it breaks the
    /// ring's conjugation.
    fn pi_electrons(&self, i: usize, ring: &Ring) -> Option<u32> {
        let atom = &self.atoms[i];
        let mut ring_double = false;
        let mut exocyclic = None;
        for &(next, k) in &self.adjacency[i] {
            match self.orders[k] {
                3 => return None,
                2 if ring.atoms.contains(&next) => ring_double = true,
                2 => exocyclic = Some(next),
                _ => {}
            }
        }
        let has_double = ring_double || exocyclic.is_some();
        let connections = self.adjacency[i].len() as u32 + self.total_hs[i];

        match atom.element {
            Element::C => match atom.charge {
                0 if ring_double => Some(1),
                0 => match exocyclic {
                    // A double bond into a fused ring stays in the pi system.
                    Some(partner) if self.atom_in_ring[partner] => Some(1),
                    Some(partner) if is_heteroatom(self.atoms[partner].element) => Some(0),
                    _ => None,
                },
                -1 => Some(2),
                1 => Some(u32::from(has_double)),
                _ => None,
            },
            Element::N | Element::P | Element::As => match atom.charge {
                0 if has_double => Some(1),
                0 if connections <= 3 => Some(2),
                1 if ring_double => Some(1),
                _ => None,
            },
            Element::O | Element::S | Element::Se | Element::Te => {
                if ring_double {
                    Some(1)
                } else if atom.charge == 0 && connections == 2 {
                    Some(2)
                } else {
                    None
                }
            }
            Element::B => Some(u32::from(has_double)),
            _ => None,
        }
    }
}

/// Hydrogens needed to reach the next default valence. Bracket atoms have
/// none beyond what is written.
fn implicit_valence(atom: &SmilesAtom, explicit: u32) -> u32 {
    if atom.bracket {
        return 0;
    }
    atom.element
        .default_valences()
        .iter()
        .find(|&&v| v >= explicit)
        .map(|&v| v - explicit)
        .unwrap_or(0)
}

fn radical_electrons(atom: &SmilesAtom, degree: u32, total_valence: u32) -> u32 {
    let element = atom.element;
    let n_outer = element.outer_shell_electrons() as i32;
    let charge = atom.charge;
    let total_valence = total_valence as i32;
    let defaults = element.default_valences();

    if defaults.is_empty() {
        if degree > 0 {
            return 0;
        }
        let n_valence = n_outer - charge;
        return if n_valence < 0 { 0 } else { (n_valence % 2) as u32 };
    }

    let base = if element.atomic_num() <= 2 { 2 } else { 8 };
    let mut radicals = base - n_outer - total_valence + charge;
    if radicals < 0 {
        radicals = 0;
        if defaults.len() > 1 {
            if let Some(r) = defaults
                .iter()
                .map(|&v| v as i32 - total_valence + charge)
                .find(|&r| r >= 0)
            {
                radicals = r;
            }
        }
    }

    let from_outer = n_outer - total_valence - charge;
    if from_outer >= 0 && from_outer < radicals {
        radicals = from_outer;
    }
    radicals.max(0) as u32
}

/// Per-atom counts shared by conjugation and hybridization.
struct ElectronCounts<'a> {
    atoms: &'a [SmilesAtom],
    degree: &'a [u32],
    total_hs: Vec<u32>,
    total_valence: Vec<u32>,
    radicals: &'a [u32],
}

impl ElectronCounts<'_> {
    fn total_degree(&self, i: usize) -> i32 {
        (self.degree[i] + self.total_hs[i]) as i32
    }

    fn count_atom_elec(&self, i: usize) -> i32 {
        let atom = &self.atoms[i];
        let defaults = atom.element.default_valences();
        let Some(&default_val) = defaults.first() else {
            return -1;
        };
        if default_val <= 1 {
            return -1;
        }
        let degree = self.total_degree(i);
        if degree > 3 {
            return -1;
        }
        let n_outer = atom.element.outer_shell_electrons() as i32;
        let lone_pairs = (n_outer - default_val as i32 - atom.charge).max(0);
        (default_val as i32 - degree) + lone_pairs - self.radicals[i] as i32
    }

    fn is_conj_candidate(&self, i: usize) -> bool {
        let atom = &self.atoms[i];
        let defaults = atom.element.default_valences();
        let Some(&default_val) = defaults.first() else {
            return false;
        };
        if default_val <= 1 {
            return false;
        }
        if atom.charge == 0 && self.total_valence[i] > default_val {
            return false;
        }
        let n_outer = atom.element.outer_shell_electrons();
        let row_check = atom.element.atomic_num() <= 10
            || (n_outer != 5 && n_outer != 6)
            || (n_outer == 6 && self.total_degree(i) < 2);
        row_check && self.count_atom_elec(i) > 0
    }

    fn hybridization(&self, i: usize, has_conjugated: bool) -> Hybridization {
        let atom = &self.atoms[i];
        let atomic_num = atom.element.atomic_num();
        if atomic_num == 0 {
            return Hybridization::Unspecified;
        }

        let degree = self.total_degree(i);
        let norbs = if atomic_num <= 1 || atomic_num >= 89 {
            degree
        } else {
            let n_outer = atom.element.outer_shell_electrons() as i32;
            let total_valence = self.total_valence[i] as i32;
            let charge = atom.charge;
            let free = n_outer - (total_valence + charge);
            if total_valence + n_outer - charge < 8 {
                let radicals = self.radicals[i] as i32;
                degree + (free - radicals) / 2 + radicals
            } else {
                degree + free / 2
            }
        };

        match norbs {
            i32::MIN..=1 => Hybridization::S,
            2 => Hybridization::SP,
            3 => Hybridization::SP2,
            4 if degree > 3 || !has_conjugated => Hybridization::SP3,
            4 => Hybridization::SP2,
            5 => Hybridization::SP3D,
            6 => Hybridization::SP3D2,
            _ => Hybridization::Other,
        }
    }
}

fn assign_conjugation(
    electrons: &ElectronCounts,
    adjacency: &[Vec<(usize, usize)>],
    bond_types: &[BondType],
) -> Vec<bool> {
    let mut conjugated: Vec<bool> = bond_types
        .iter()
        .map(|t| *t == BondType::Aromatic)
        .collect();

    for (atom, neighbors) in adjacency.iter().enumerate() {
        if !electrons.is_conj_candidate(atom) {
            continue;
        }
        if !(2..=3).contains(&electrons.total_degree(atom)) {
            continue;
        }

        for &(other1, bond1) in neighbors {
            if !matches!(bond_types[bond1], BondType::Double | BondType::Triple) {
                continue;
            }
            if !electrons.is_conj_candidate(other1) {
                continue;
            }
            for &(other2, bond2) in neighbors {
                if bond1 == bond2 || electrons.total_degree(other2) > 3 {
                    continue;
                }
                if electrons.is_conj_candidate(other2) {
                    conjugated[bond1] = true;
                    conjugated[bond2] = true;
                }
            }
        }
    }

    conjugated
}

/// Direction of the first directional single bond on `atom` other than
/// `skip`, read as pointing away from `atom`.
fn direction_from(
    atom: usize,
    skip: usize,
    adjacency: &[Vec<(usize, usize)>],
    bonds: &[WrittenBond],
) -> Option<BondDirection> {
    adjacency[atom].iter().find_map(|&(_, k)| {
        if k == skip {
            return None;
        }
        let bond = &bonds[k];
        let direction = bond.bond.direction?;
        Some(if bond.begin == atom {
            direction
        } else {
            direction.flipped()
        })
    })
}

/// E/Z from `/` and `\` marks. `F/C=C/F` is E and `F/C=C\F` is Z.
fn double_bond_stereo(
    double: &WrittenBond,
    k: usize,
    adjacency: &[Vec<(usize, usize)>],
    bonds: &[WrittenBond],
) -> BondStereo {
    let (Some(left), Some(right)) = (
        direction_from(double.begin, k, adjacency, bonds),
        direction_from(double.end, k, adjacency, bonds),
    ) else {
        return BondStereo::None;
    };

    // `left` points away from the first atom; flip it so both marks are read
    // left to right as written in `X/A=B/Y`.
    if left.flipped() == right {
        BondStereo::E
    } else {
        BondStereo::Z
    }
}
