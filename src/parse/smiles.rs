use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::{BondDirection, Element, MoleculeGraph, SmilesAtom, SmilesBond, SmilesBondOrder};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    EmptyInput,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unknown element '{symbol}' at position {pos}")]
    UnknownElement { pos: usize, symbol: String },
    #[error("unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("invalid charge in bracket atom at position {0}")]
    InvalidCharge(usize),
    #[error("branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("{0} branch(es) opened with '(' were never closed")]
    UnclosedBranch(usize),
    #[error("ring closure {digit} at position {pos} without a current atom")]
    RingClosureNoCurrentAtom { digit: u16, pos: usize },
    #[error("ring closure {digit} at position {pos} bonds an atom to itself")]
    RingClosureSelfBond { digit: u16, pos: usize },
    #[error("ring {0} was opened but never closed")]
    UnclosedRing(u16),
    #[error("conflicting bond symbols on ring closure {0}")]
    RingBondConflict(u16),
    #[error("atoms {0} and {1} are bonded twice")]
    DuplicateBond(usize, usize),
    #[error("bond '{symbol}' at position {pos} is not followed by an atom")]
    DanglingBond { pos: usize, symbol: char },
}

/// A bond symbol waiting for the atom (or ring digit) it belongs to.
#[derive(Debug, Clone, Copy)]
struct PendingBond {
    pos: usize,
    symbol: char,
    order: SmilesBondOrder,
    direction: Option<BondDirection>,
}

impl PendingBond {
    fn from_symbol(symbol: char, pos: usize) -> Option<Self> {
        let (order, direction) = match symbol {
            '-' => (SmilesBondOrder::Single, None),
            '=' => (SmilesBondOrder::Double, None),
            '#' => (SmilesBondOrder::Triple, None),
            ':' => (SmilesBondOrder::Aromatic, None),
            '/' => (SmilesBondOrder::Single, Some(BondDirection::Up)),
            '\\' => (SmilesBondOrder::Single, Some(BondDirection::Down)),
            _ => return None,
        };
        Some(Self {
            pos,
            symbol,
            order,
            direction,
        })
    }

    fn into_bond(self) -> SmilesBond {
        SmilesBond {
            order: self.order,
            direction: self.direction,
        }
    }
}

/// An opened ring closure digit.
#[derive(Debug, Clone, Copy)]
struct RingOpening {
    atom: NodeIndex,
    bond: Option<PendingBond>,
}

/// Parses a SMILES string into a MoleculeGraph.
///
/// Atoms are numbered in the order they are written and bonds in the order
/// they are completed, so the node index of an atom is its position in the
/// string. Ring closure bonds are added when the ring closes.
///
/// Chirality marks and atom classes are read but dropped. Directional
/// single bonds (`/`, `\`) keep their direction so double bond stereo can be
/// derived later.
pub fn parse_smiles(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    if smiles.trim().is_empty() {
        return Err(SmilesError::EmptyInput);
    }

    let mut graph = MoleculeGraph::new_undirected();
    let mut current_atom: Option<NodeIndex> = None;
    let mut pending: Option<PendingBond> = None;
    let mut branch_stack: Vec<NodeIndex> = Vec::new();
    let mut ring_map: BTreeMap<u16, RingOpening> = BTreeMap::new();

    let chars: Vec<char> = smiles.trim().chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                if let Some(p) = pending {
                    return Err(SmilesError::DanglingBond {
                        pos: p.pos,
                        symbol: p.symbol,
                    });
                }
                match current_atom {
                    Some(atom) => branch_stack.push(atom),
                    None => return Err(SmilesError::BranchNoCurrentAtom(i)),
                }
                i += 1;
            }
            ')' => {
                if let Some(p) = pending {
                    return Err(SmilesError::DanglingBond {
                        pos: p.pos,
                        symbol: p.symbol,
                    });
                }
                current_atom = Some(
                    branch_stack
                        .pop()
                        .ok_or(SmilesError::BranchEndNoStart(i))?,
                );
                i += 1;
            }
            '-' | '=' | '#' | ':' | '/' | '\\' => {
                if current_atom.is_none() || pending.is_some() {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: c });
                }
                pending = PendingBond::from_symbol(c, i);
                i += 1;
            }
            '%' => {
                if i + 2 >= chars.len()
                    || !chars[i + 1].is_ascii_digit()
                    || !chars[i + 2].is_ascii_digit()
                {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: c });
                }
                let digit = (chars[i + 1].to_digit(10).unwrap_or(0) * 10
                    + chars[i + 2].to_digit(10).unwrap_or(0)) as u16;
                ring_closure(
                    &mut graph,
                    &mut ring_map,
                    current_atom,
                    pending.take(),
                    digit,
                    i,
                )?;
                i += 3;
            }
            '0'..='9' => {
                let digit = c.to_digit(10).unwrap_or(0) as u16;
                ring_closure(
                    &mut graph,
                    &mut ring_map,
                    current_atom,
                    pending.take(),
                    digit,
                    i,
                )?;
                i += 1;
            }
            '.' => {
                if current_atom.is_none() {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: c });
                }
                if let Some(p) = pending {
                    return Err(SmilesError::DanglingBond {
                        pos: p.pos,
                        symbol: p.symbol,
                    });
                }
                // The next atom starts a disconnected fragment.
                current_atom = None;
                i += 1;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|rel| i + rel)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let atom = parse_bracket_atom(&chars[i + 1..end], i + 1)?;
                let new_atom = graph.add_node(atom);
                attach(&mut graph, current_atom, new_atom, pending.take())?;
                current_atom = Some(new_atom);
                i = end + 1;
            }
            '*' => {
                let new_atom = graph.add_node(SmilesAtom::organic(Element::Dummy, false));
                attach(&mut graph, current_atom, new_atom, pending.take())?;
                current_atom = Some(new_atom);
                i += 1;
            }
            _ => {
                let (atom, width) = parse_organic_atom(&chars, i)?;
                let new_atom = graph.add_node(atom);
                attach(&mut graph, current_atom, new_atom, pending.take())?;
                current_atom = Some(new_atom);
                i += width;
            }
        }
    }

    if let Some(p) = pending {
        return Err(SmilesError::DanglingBond {
            pos: p.pos,
            symbol: p.symbol,
        });
    }
    if !branch_stack.is_empty() {
        return Err(SmilesError::UnclosedBranch(branch_stack.len()));
    }
    if let Some((&digit, _)) = ring_map.iter().next() {
        return Err(SmilesError::UnclosedRing(digit));
    }

    Ok(graph)
}

/// Bond the previous atom (if any) to a newly written one.
fn attach(
    graph: &mut MoleculeGraph,
    prev: Option<NodeIndex>,
    new_atom: NodeIndex,
    pending: Option<PendingBond>,
) -> Result<(), SmilesError> {
    if let Some(prev) = prev {
        let bond = pending.map(PendingBond::into_bond).unwrap_or_default();
        add_bond(graph, prev, new_atom, bond)?;
    }
    Ok(())
}

fn add_bond(
    graph: &mut MoleculeGraph,
    a: NodeIndex,
    b: NodeIndex,
    bond: SmilesBond,
) -> Result<(), SmilesError> {
    if graph.find_edge(a, b).is_some() {
        return Err(SmilesError::DuplicateBond(a.index(), b.index()));
    }
    graph.add_edge(a, b, bond);
    Ok(())
}

fn ring_closure(
    graph: &mut MoleculeGraph,
    ring_map: &mut BTreeMap<u16, RingOpening>,
    current_atom: Option<NodeIndex>,
    bond: Option<PendingBond>,
    digit: u16,
    pos: usize,
) -> Result<(), SmilesError> {
    let current = current_atom.ok_or(SmilesError::RingClosureNoCurrentAtom { digit, pos })?;

    match ring_map.remove(&digit) {
        Some(opening) => {
            if opening.atom == current {
                return Err(SmilesError::RingClosureSelfBond { digit, pos });
            }
            let bond = match (opening.bond, bond) {
                (Some(a), Some(b)) if a.order != b.order => {
                    return Err(SmilesError::RingBondConflict(digit));
                }
                (Some(a), _) => Some(a),
                (None, b) => b,
            };
            // Directions on ring closures are not used for stereo.
            let bond = bond
                .map(|p| SmilesBond {
                    order: p.order,
                    direction: None,
                })
                .unwrap_or_default();
            add_bond(graph, opening.atom, current, bond)
        }
        None => {
            ring_map.insert(
                digit,
                RingOpening {
                    atom: current,
                    bond,
                },
            );
            Ok(())
        }
    }
}

/// Reads an atom outside brackets. Returns the atom and the number of
/// characters consumed.
fn parse_organic_atom(chars: &[char], i: usize) -> Result<(SmilesAtom, usize), SmilesError> {
    let c = chars[i];

    if c.is_ascii_uppercase() {
        // Two-letter symbols first so that "Cl" is not read as "C" followed by "l".
        if let Some(&next) = chars.get(i + 1) {
            if next.is_ascii_lowercase() {
                let candidate: String = [c, next].iter().collect();
                if let Some(element) = Element::from_organic_subset(&candidate) {
                    return Ok((SmilesAtom::organic(element, false), 2));
                }
            }
        }
        let symbol = c.to_string();
        return match Element::from_organic_subset(&symbol) {
            Some(element) => Ok((SmilesAtom::organic(element, false), 1)),
            None => Err(SmilesError::UnknownElement { pos: i, symbol }),
        };
    }

    if c.is_ascii_lowercase() {
        let symbol = c.to_string();
        return match Element::from_aromatic_symbol(&symbol) {
            Some(element) => Ok((SmilesAtom::organic(element, true), 1)),
            None => Err(SmilesError::UnknownElement { pos: i, symbol }),
        };
    }

    Err(SmilesError::UnexpectedChar { pos: i, ch: c })
}

/// Parses the inside of a bracket atom: `[isotope? symbol chirality? hcount? charge? class?]`.
///
/// `offset` is the position of the first character inside the bracket, used
/// for error positions.
fn parse_bracket_atom(content: &[char], offset: usize) -> Result<SmilesAtom, SmilesError> {
    let mut j = 0;

    // Isotope
    while j < content.len() && content[j].is_ascii_digit() {
        j += 1;
    }

    // Element symbol, uppercase (possibly two letters) or aromatic lowercase.
    let start = j;
    let first = *content.get(j).ok_or(SmilesError::UnknownElement {
        pos: offset + j,
        symbol: String::new(),
    })?;
    let (element, aromatic) = if first.is_ascii_uppercase() {
        let two = content
            .get(j + 1)
            .filter(|c| c.is_ascii_lowercase())
            .map(|&second| [first, second].iter().collect::<String>())
            .and_then(|s| Element::from_symbol(&s));
        match two {
            Some(element) => {
                j += 2;
                (element, false)
            }
            None => {
                let symbol = first.to_string();
                let element = Element::from_symbol(&symbol).ok_or(SmilesError::UnknownElement {
                    pos: offset + start,
                    symbol,
                })?;
                j += 1;
                (element, false)
            }
        }
    } else if first.is_ascii_lowercase() {
        let two = content
            .get(j + 1)
            .filter(|c| c.is_ascii_lowercase())
            .map(|&second| [first, second].iter().collect::<String>())
            .and_then(|s| Element::from_aromatic_symbol(&s));
        match two {
            Some(element) => {
                j += 2;
                (element, true)
            }
            None => {
                let symbol = first.to_string();
                let element =
                    Element::from_aromatic_symbol(&symbol).ok_or(SmilesError::UnknownElement {
                        pos: offset + start,
                        symbol,
                    })?;
                j += 1;
                (element, true)
            }
        }
    } else if first == '*' {
        j += 1;
        (Element::Dummy, false)
    } else {
        return Err(SmilesError::UnexpectedChar {
            pos: offset + j,
            ch: first,
        });
    };

    // Chirality: @, @@, or @TH1 / @AL2 / @SP3 / @TB12 / @OH30 style classes.
    if content.get(j) == Some(&'@') {
        j += 1;
        if content.get(j) == Some(&'@') {
            j += 1;
        } else if content.len() > j + 2 && content[j + 2].is_ascii_digit() {
            let class: String = content[j..j + 2].iter().collect();
            if matches!(class.as_str(), "TH" | "AL" | "SP" | "TB" | "OH") {
                j += 2;
                while j < content.len() && content[j].is_ascii_digit() {
                    j += 1;
                }
            }
        }
    }

    // Hydrogen count
    let mut explicit_h = 0;
    if content.get(j) == Some(&'H') {
        j += 1;
        let digits_start = j;
        while j < content.len() && content[j].is_ascii_digit() {
            j += 1;
        }
        explicit_h = if digits_start == j {
            1
        } else {
            content[digits_start..j]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| SmilesError::UnexpectedChar {
                    pos: offset + digits_start,
                    ch: content[digits_start],
                })?
        };
    }

    // Charge
    let mut charge: i32 = 0;
    if let Some(&sign_char) = content.get(j).filter(|c| **c == '+' || **c == '-') {
        let sign = if sign_char == '+' { 1 } else { -1 };
        let charge_pos = offset + j;
        j += 1;
        let digits_start = j;
        while j < content.len() && content[j].is_ascii_digit() {
            j += 1;
        }
        if digits_start < j {
            let magnitude: i32 = content[digits_start..j]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| SmilesError::InvalidCharge(charge_pos))?;
            charge = sign * magnitude;
        } else {
            // "++" and "--" style repeats
            let mut magnitude = 1;
            while content.get(j) == Some(&sign_char) {
                magnitude += 1;
                j += 1;
            }
            charge = sign * magnitude;
        }
        if content.get(j).is_some_and(|c| *c == '+' || *c == '-') {
            return Err(SmilesError::InvalidCharge(charge_pos));
        }
    }

    // Atom class
    if content.get(j) == Some(&':') {
        j += 1;
        let digits_start = j;
        while j < content.len() && content[j].is_ascii_digit() {
            j += 1;
        }
        if digits_start == j {
            return Err(SmilesError::UnexpectedChar {
                pos: offset + digits_start - 1,
                ch: ':',
            });
        }
    }

    if let Some(&ch) = content.get(j) {
        return Err(SmilesError::UnexpectedChar {
            pos: offset + j,
            ch,
        });
    }

    Ok(SmilesAtom {
        element,
        aromatic,
        bracket: true,
        explicit_h,
        charge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::visit::EdgeRef;

    #[test]
    fn test_parse_ethanol() {
        let molecule = parse_smiles("CCO").expect("Failed to parse SMILES");

        assert_eq!(molecule.node_count(), 3); // 2 Carbons, 1 Oxygen
        assert_eq!(molecule[NodeIndex::new(0)].element, Element::C);
        assert_eq!(molecule[NodeIndex::new(1)].element, Element::C);
        assert_eq!(molecule[NodeIndex::new(2)].element, Element::O);

        let edges: Vec<_> = molecule
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()))
            .collect();
        assert_eq!(edges, vec![(0, 1), (1, 2)]);
        for edge in molecule.edge_references() {
            assert_eq!(edge.weight().order, SmilesBondOrder::Implicit);
        }
    }

    #[test]
    fn test_parse_cyclohexane() {
        let molecule = parse_smiles("C1CCCCC1").expect("Failed to parse SMILES");
        assert_eq!(molecule.node_count(), 6);
        assert_eq!(molecule.edge_count(), 6);

        // Each carbon should have two bonds (since it's a ring)
        for node in molecule.node_indices() {
            let degree = molecule.edges(node).count();
            assert_eq!(degree, 2, "Node {} has degree {}", node.index(), degree);
        }
    }

    #[test]
    fn test_parse_isobutane() {
        let molecule = parse_smiles("CC(C)C").expect("Failed to parse SMILES");
        assert_eq!(molecule.node_count(), 4);
        assert_eq!(molecule.edge_count(), 3);

        let center = NodeIndex::new(1);
        assert_eq!(molecule.edges(center).count(), 3);
    }

    #[test]
    fn test_parse_two_letter_halogens() {
        let molecule = parse_smiles("ClCCBr").expect("Failed to parse SMILES");
        let elements: Vec<_> = molecule.node_weights().map(|a| a.element).collect();
        assert_eq!(elements, vec![Element::Cl, Element::C, Element::C, Element::Br]);
    }

    #[test]
    fn test_parse_explicit_bonds() {
        let molecule = parse_smiles("C=CC#N").expect("Failed to parse SMILES");
        let orders: Vec<_> = molecule.edge_weights().map(|b| b.order).collect();
        assert_eq!(
            orders,
            vec![
                SmilesBondOrder::Double,
                SmilesBondOrder::Implicit,
                SmilesBondOrder::Triple
            ]
        );
    }

    #[test]
    fn test_parse_percent_ring_closure() {
        let molecule = parse_smiles("C%12CCC%12").expect("Failed to parse SMILES");
        assert_eq!(molecule.node_count(), 4);
        assert_eq!(molecule.edge_count(), 4);
        assert!(molecule
            .find_edge(NodeIndex::new(0), NodeIndex::new(3))
            .is_some());
    }

    #[test]
    fn test_ring_bond_symbol_on_either_digit() {
        let opening = parse_smiles("C=1CCCCC1").expect("Failed to parse SMILES");
        let closing = parse_smiles("C1CCCCC=1").expect("Failed to parse SMILES");
        for molecule in [opening, closing] {
            let edge = molecule
                .find_edge(NodeIndex::new(0), NodeIndex::new(5))
                .expect("ring bond");
            assert_eq!(molecule[edge].order, SmilesBondOrder::Double);
        }
    }

    #[test]
    fn test_parse_bracket_atoms() {
        let molecule = parse_smiles("[13CH3][NH3+].[O-2]").expect("Failed to parse SMILES");
        let carbon = &molecule[NodeIndex::new(0)];
        assert_eq!(carbon.element, Element::C);
        assert!(carbon.bracket);
        assert_eq!(carbon.explicit_h, 3);

        let nitrogen = &molecule[NodeIndex::new(1)];
        assert_eq!(nitrogen.explicit_h, 3);
        assert_eq!(nitrogen.charge, 1);

        let oxygen = &molecule[NodeIndex::new(2)];
        assert_eq!(oxygen.charge, -2);
        assert_eq!(molecule.edge_count(), 1);
    }

    #[test]
    fn test_parse_repeated_charge_and_chirality() {
        let molecule = parse_smiles("[Fe++].N[C@@H](C)C(=O)O").expect("Failed to parse SMILES");
        assert_eq!(molecule[NodeIndex::new(0)].charge, 2);
        let chiral = &molecule[NodeIndex::new(2)];
        assert_eq!(chiral.element, Element::C);
        assert_eq!(chiral.explicit_h, 1);
    }

    #[test]
    fn test_parse_aromatic_atoms() {
        let molecule = parse_smiles("c1cc[nH]c1").expect("Failed to parse SMILES");
        assert!(molecule.node_weights().all(|a| a.aromatic));
        assert_eq!(molecule[NodeIndex::new(3)].element, Element::N);
        assert_eq!(molecule[NodeIndex::new(3)].explicit_h, 1);
    }

    #[test]
    fn test_parse_directional_bonds() {
        let molecule = parse_smiles("F/C=C\\F").expect("Failed to parse SMILES");
        let directions: Vec<_> = molecule.edge_weights().map(|b| b.direction).collect();
        assert_eq!(
            directions,
            vec![Some(BondDirection::Up), None, Some(BondDirection::Down)]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_smiles(""), Err(SmilesError::EmptyInput));
        assert_eq!(parse_smiles("C1CC"), Err(SmilesError::UnclosedRing(1)));
        assert_eq!(parse_smiles("CC)"), Err(SmilesError::BranchEndNoStart(2)));
        assert_eq!(parse_smiles("C(C"), Err(SmilesError::UnclosedBranch(1)));
        assert_eq!(parse_smiles("(C)"), Err(SmilesError::BranchNoCurrentAtom(0)));
        assert_eq!(parse_smiles("C[NH"), Err(SmilesError::UnclosedBracket(1)));
        assert_eq!(
            parse_smiles("CC="),
            Err(SmilesError::DanglingBond { pos: 2, symbol: '=' })
        );
        assert_eq!(
            parse_smiles("C11"),
            Err(SmilesError::RingClosureSelfBond { digit: 1, pos: 2 })
        );
        assert_eq!(parse_smiles("C12CC12"), Err(SmilesError::DuplicateBond(0, 3)));
        assert!(matches!(
            parse_smiles("invalid_garbage_string"),
            Err(SmilesError::UnknownElement { .. })
        ));
    }
}
