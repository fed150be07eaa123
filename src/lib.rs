//! chromoscores: feature scoring for chromosome contact maps
//!
//! This library scores structural features of Hi-C style contact matrices:
//! looping peaks, domains, insulating boundaries and flames (stripes).
//!
//! # Features
//!
//! - **Snippet extraction**: bounds-checked windows around anchors, never clamped
//! - **Region masks**: boolean selectors for interior and background regions
//! - **Pileups**: diagonal and distance-binned off-diagonal aggregation, optionally
//!   split by anchor-pair orientation
//! - **Parallel processing**: Uses Rayon for multi-core accumulation
//!
//! # Example
//!
//! ```rust
//! use chromoscores::prelude::*;
//! use ndarray::Array2;
//!
//! let matrix = Array2::from_shape_fn((40, 40), |(i, j)| {
//!     1.0 / (1.0 + (i as f64 - j as f64).abs())
//! });
//!
//! // Aggregate the diagonal around every anchor and score insulation
//! let pile = pileup_diagonal(&matrix, &[10, 20, 30], 17).unwrap();
//! let score = isolation_score(&pile, &IsolationParams::default()).unwrap();
//! assert!(score > 0.0);
//! ```

pub mod anchors;
pub mod config;
pub mod error;
pub mod mask;
pub mod matrix;
pub mod parallel;
pub mod pileup;
pub mod score;
pub mod snippet;

// Re-export commonly used types
pub use anchors::{OrientationMap, PairCategory, Strand};
pub use error::{Result, ScoreError};
pub use matrix::ContactMatrix;
pub use score::Feature;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::anchors::{OrientationMap, PairCategory, Strand};
    pub use crate::config::{DomainParams, FlameParams, IsolationParams, PeakParams, PileupParams};
    pub use crate::error::{Result, ScoreError};
    pub use crate::mask::{Quadrant, RegionMask, ShapeMode};
    pub use crate::matrix::{observed_over_expected, ContactMatrix};
    pub use crate::pileup::{
        pileup_diagonal, pileup_offdiagonal_binned, pileup_offdiagonal_exact_bins,
        pileup_offdiagonal_oriented, BinEdges, OrientedPileup, Pileup,
    };
    pub use crate::score::{
        domain_score, flame_score, isolation_score, peak_score, Feature, PeakScores,
    };
    pub use crate::snippet::{
        extract_diagonal, extract_domain, extract_flame, extract_offdiagonal, extract_peak,
        extract_window, FlameOrientation,
    };
}
