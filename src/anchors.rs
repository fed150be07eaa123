//! Anchor orientations and pair classification.

use crate::error::{Result, ScoreError};
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;

/// Anchor orientation (e.g. the strand of a CTCF motif).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '+' => Ok(Strand::Plus),
            '-' => Ok(Strand::Minus),
            _ => Err(ScoreError::InvalidOrientation(c.to_string())),
        }
    }

    /// Parse a compact orientation string such as `"+-+"`.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.chars().map(Strand::from_char).collect()
    }
}

impl FromStr for Strand {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Strand::from_char(c),
            _ => Err(ScoreError::InvalidOrientation(s.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

/// Relationship between the orientations of two anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairCategory {
    /// Larger coordinate `+`, smaller coordinate `-`
    Convergent,
    /// Larger coordinate `-`, smaller coordinate `+`
    Divergent,
    /// Both `+`
    TandemPlus,
    /// Both `-`
    TandemMinus,
    /// Every pair regardless of orientation
    All,
}

impl PairCategory {
    /// All categories in storage order.
    pub const ALL: [PairCategory; 5] = [
        PairCategory::Convergent,
        PairCategory::Divergent,
        PairCategory::TandemPlus,
        PairCategory::TandemMinus,
        PairCategory::All,
    ];

    /// Classify a pair by the orientation of its larger and smaller anchor.
    pub fn classify(larger: Strand, smaller: Strand) -> Self {
        match (larger, smaller) {
            (Strand::Plus, Strand::Minus) => PairCategory::Convergent,
            (Strand::Minus, Strand::Plus) => PairCategory::Divergent,
            (Strand::Plus, Strand::Plus) => PairCategory::TandemPlus,
            (Strand::Minus, Strand::Minus) => PairCategory::TandemMinus,
        }
    }

    /// Position of this category in [`PairCategory::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PairCategory::Convergent => 0,
            PairCategory::Divergent => 1,
            PairCategory::TandemPlus => 2,
            PairCategory::TandemMinus => 3,
            PairCategory::All => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PairCategory::Convergent => "+-",
            PairCategory::Divergent => "-+",
            PairCategory::TandemPlus => "++",
            PairCategory::TandemMinus => "--",
            PairCategory::All => "all",
        }
    }
}

impl fmt::Display for PairCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Orientation of every anchor, keyed by anchor coordinate.
///
/// Built from two parallel lists matched by position. A coordinate listed
/// twice must carry the same orientation both times.
#[derive(Debug, Clone, Default)]
pub struct OrientationMap {
    by_anchor: FxHashMap<usize, Strand>,
}

impl OrientationMap {
    pub fn new(anchors: &[usize], orientations: &[Strand]) -> Result<Self> {
        if anchors.len() != orientations.len() {
            return Err(ScoreError::LengthMismatch {
                anchors: anchors.len(),
                orientations: orientations.len(),
            });
        }

        let mut by_anchor = FxHashMap::default();
        by_anchor.reserve(anchors.len());

        for (&anchor, &strand) in anchors.iter().zip(orientations) {
            match by_anchor.insert(anchor, strand) {
                Some(previous) if previous != strand => {
                    return Err(ScoreError::AmbiguousOrientation { anchor });
                }
                _ => {}
            }
        }

        Ok(Self { by_anchor })
    }

    /// Orientation of the anchor at coordinate `anchor`.
    #[inline]
    pub fn get(&self, anchor: usize) -> Option<Strand> {
        self.by_anchor.get(&anchor).copied()
    }

    /// Category of the pair `(a, b)`, ordered by coordinate.
    pub fn categorize(&self, a: usize, b: usize) -> Option<PairCategory> {
        let (smaller, larger) = if a <= b { (a, b) } else { (b, a) };
        Some(PairCategory::classify(self.get(larger)?, self.get(smaller)?))
    }

    pub fn len(&self) -> usize {
        self.by_anchor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }
}
