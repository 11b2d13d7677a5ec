use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use lazy_static::lazy_static;

/// The periodic table, plus the `*` wildcard atom.
///
/// The discriminant is the atomic number. `Dummy` is the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Element {
    Dummy = 0,
    H = 1,
    He = 2,
    Li = 3,
    Be = 4,
    B = 5,
    C = 6,
    N = 7,
    O = 8,
    F = 9,
    Ne = 10,
    Na = 11,
    Mg = 12,
    Al = 13,
    Si = 14,
    P = 15,
    S = 16,
    Cl = 17,
    Ar = 18,
    K = 19,
    Ca = 20,
    Sc = 21,
    Ti = 22,
    V = 23,
    Cr = 24,
    Mn = 25,
    Fe = 26,
    Co = 27,
    Ni = 28,
    Cu = 29,
    Zn = 30,
    Ga = 31,
    Ge = 32,
    As = 33,
    Se = 34,
    Br = 35,
    Kr = 36,
    Rb = 37,
    Sr = 38,
    Y = 39,
    Zr = 40,
    Nb = 41,
    Mo = 42,
    Tc = 43,
    Ru = 44,
    Rh = 45,
    Pd = 46,
    Ag = 47,
    Cd = 48,
    In = 49,
    Sn = 50,
    Sb = 51,
    Te = 52,
    I = 53,
    Xe = 54,
    Cs = 55,
    Ba = 56,
    La = 57,
    Ce = 58,
    Pr = 59,
    Nd = 60,
    Pm = 61,
    Sm = 62,
    Eu = 63,
    Gd = 64,
    Tb = 65,
    Dy = 66,
    Ho = 67,
    Er = 68,
    Tm = 69,
    Yb = 70,
    Lu = 71,
    Hf = 72,
    Ta = 73,
    W = 74,
    Re = 75,
    Os = 76,
    Ir = 77,
    Pt = 78,
    Au = 79,
    Hg = 80,
    Tl = 81,
    Pb = 82,
    Bi = 83,
    Po = 84,
    At = 85,
    Rn = 86,
    Fr = 87,
    Ra = 88,
    Ac = 89,
    Th = 90,
    Pa = 91,
    U = 92,
    Np = 93,
    Pu = 94,
    Am = 95,
    Cm = 96,
    Bk = 97,
    Cf = 98,
    Es = 99,
    Fm = 100,
    Md = 101,
    No = 102,
    Lr = 103,
    Rf = 104,
    Db = 105,
    Sg = 106,
    Bh = 107,
    Hs = 108,
    Mt = 109,
    Ds = 110,
    Rg = 111,
    Cn = 112,
    Nh = 113,
    Fl = 114,
    Mc = 115,
    Lv = 116,
    Ts = 117,
    Og = 118,
}

use Element::*;

/// Every element, indexed by atomic number.
const ALL: [Element; 119] = [
    Dummy, H, He, Li, Be, B, C, N, O, F, Ne, Na, Mg, Al, Si, P,
    S, Cl, Ar, K, Ca, Sc, Ti, V, Cr, Mn, Fe, Co, Ni, Cu, Zn, Ga,
    Ge, As, Se, Br, Kr, Rb, Sr, Y, Zr, Nb, Mo, Tc, Ru, Rh, Pd, Ag,
    Cd, In, Sn, Sb, Te, I, Xe, Cs, Ba, La, Ce, Pr, Nd, Pm, Sm, Eu,
    Gd, Tb, Dy, Ho, Er, Tm, Yb, Lu, Hf, Ta, W, Re, Os, Ir, Pt, Au,
    Hg, Tl, Pb, Bi, Po, At, Rn, Fr, Ra, Ac, Th, Pa, U, Np, Pu, Am,
    Cm, Bk, Cf, Es, Fm, Md, No, Lr, Rf, Db, Sg, Bh, Hs, Mt, Ds, Rg,
    Cn, Nh, Fl, Mc, Lv, Ts, Og,
];

const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al",
    "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co",
    "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb",
    "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe", "Cs",
    "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm",
    "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi",
    "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg",
    "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

const OUTER_SHELL_ELECTRONS: [u8; 119] = [
    0, 1, 2, 1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8, 1,
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 3, 4, 5, 6, 7, 8, 1, 2, 3,
    4, 5, 6, 7, 8, 9, 10, 11, 12, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 3,
    4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 3, 4, 5, 6, 7, 8, 9, 10, 11,
    12, 13, 14, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 3, 4, 5, 6, 7, 8,
];

lazy_static! {
    static ref SYMBOL_TABLE: HashMap<&'static str, Element> =
        ALL.iter().map(|&e| (e.symbol(), e)).collect();
}

impl Element {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOL_TABLE.get(symbol).copied()
    }

    pub fn from_atomic_num(atomic_num: u8) -> Option<Self> {
        ALL.get(atomic_num as usize).copied()
    }

    /// Elements allowed outside brackets. Only these get implicit hydrogens.
    pub fn from_organic_subset(symbol: &str) -> Option<Self> {
        match symbol {
            "B" => Some(B),
            "C" => Some(C),
            "N" => Some(N),
            "O" => Some(O),
            "P" => Some(P),
            "S" => Some(S),
            "F" => Some(F),
            "Cl" => Some(Cl),
            "Br" => Some(Br),
            "I" => Some(I),
            _ => None,
        }
    }

    /// Lowercase aromatic symbols, e.g. `c`, `n`, and inside brackets `se`, `as`.
    pub fn from_aromatic_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "b" => Some(B),
            "c" => Some(C),
            "n" => Some(N),
            "o" => Some(O),
            "p" => Some(P),
            "s" => Some(S),
            "se" => Some(Se),
            "as" => Some(As),
            "te" => Some(Te),
            _ => None,
        }
    }

    pub fn atomic_num(self) -> u8 {
        self as u8
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[self as usize]
    }

    /// Normal valences in increasing order. Empty for metals and noble gases.
    pub fn default_valences(self) -> &'static [u32] {
        match self {
            H => &[1],
            B => &[3],
            C | Si | Ge => &[4],
            N | P | As | Sb => &[3, 5],
            O => &[2],
            S | Se | Te => &[2, 4, 6],
            F | Cl | Br | At => &[1],
            I => &[1, 3, 5, 7],
            _ => &[],
        }
    }

    /// Electrons in the outermost shell, used for lone pair and radical counts.
    pub fn outer_shell_electrons(self) -> u32 {
        OUTER_SHELL_ELECTRONS[self as usize] as u32
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}
