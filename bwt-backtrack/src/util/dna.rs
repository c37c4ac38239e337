use std::fmt;

use serde::{Deserialize, Serialize};

pub const SIGMA: usize = 5; // {0:$, 1:A, 2:C, 3:G, 4:T}

/// Sentinel symbol code terminating the indexed text.
pub const SENTINEL: u8 = 0;

/// A nucleotide in index order (A < C < G < T).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    pub const ALL: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    /// Row of this base in the tally table (0..4).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Symbol code as stored in the BWT (1..=4).
    #[inline]
    pub fn code(self) -> u8 {
        self as u8 + 1
    }

    #[inline]
    pub fn from_index(i: usize) -> Option<Base> {
        Base::ALL.get(i).copied()
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<Base> {
        match code {
            1 => Some(Base::A),
            2 => Some(Base::C),
            3 => Some(Base::G),
            4 => Some(Base::T),
            _ => None,
        }
    }

    /// Case-insensitive ASCII parse. Anything outside ACGT is rejected.
    #[inline]
    pub fn from_ascii(b: u8) -> Option<Base> {
        match b.to_ascii_uppercase() {
            b'A' => Some(Base::A),
            b'C' => Some(Base::C),
            b'G' => Some(Base::G),
            b'T' => Some(Base::T),
            _ => None,
        }
    }

    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii() as char)
    }
}

/// Small bit set over {A,C,G,T}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseSet(u8);

impl BaseSet {
    pub const fn empty() -> Self {
        BaseSet(0)
    }

    pub fn single(b: Base) -> Self {
        BaseSet(1 << b.index())
    }

    #[inline]
    pub fn contains(self, b: Base) -> bool {
        self.0 & (1 << b.index()) != 0
    }

    /// Returns `true` if `b` was not yet present.
    #[inline]
    pub fn insert(&mut self, b: Base) -> bool {
        let fresh = !self.contains(b);
        self.0 |= 1 << b.index();
        fresh
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_full(self) -> bool {
        self.0 & 0b1111 == 0b1111
    }

    /// Bases not yet in the set, in index order.
    pub fn untried(self) -> impl Iterator<Item = Base> {
        Base::ALL.into_iter().filter(move |&b| !self.contains(b))
    }
}

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    match b {
        b'$' => SENTINEL,
        _ => Base::from_ascii(b).map_or(SENTINEL, Base::code),
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    match Base::from_code(a) {
        Some(b) => b.to_ascii(),
        None => b'$',
    }
}

/// Upper-cases and parses a read. Returns the offending position on failure.
pub fn parse_bases(seq: &[u8]) -> Result<Vec<Base>, (usize, u8)> {
    seq.iter()
        .enumerate()
        .map(|(i, &b)| Base::from_ascii(b).ok_or((i, b)))
        .collect()
}

pub fn bases_to_string(seq: &[Base]) -> String {
    seq.iter().map(|b| b.to_ascii() as char).collect()
}
