//! Error taxonomy shared by extraction, masking, pileups and scoring.

use std::fmt;
use thiserror::Error;

/// Matrix axis named in bounds errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixAxis {
    Row,
    Col,
}

impl fmt::Display for MatrixAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixAxis::Row => write!(f, "row"),
            MatrixAxis::Col => write!(f, "column"),
        }
    }
}

/// Errors raised while extracting snippets, building masks or scoring.
///
/// Every failure is a deterministic function of the inputs; nothing here
/// is transient or worth retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("{axis} window {start}..{end} reaches outside matrix of size {dim}")]
    OutOfBounds {
        axis: MatrixAxis,
        start: i64,
        end: i64,
        dim: usize,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("max_distance {max_distance} exceeds half of the {size}-bin domain snippet")]
    GeometryOverflow { max_distance: usize, size: usize },

    #[error("Anchor index {index} + {offset} is out of range for {len} anchors")]
    IndexRange {
        index: usize,
        offset: usize,
        len: usize,
    },

    #[error("Invalid shape mode '{0}': expected 'triangle' or 'square'")]
    InvalidShapeMode(String),

    #[error("Division by zero: {region} mean is zero and pseudo count is zero")]
    DivisionByZero { region: &'static str },

    #[error("Region '{region}' selects no cells")]
    EmptyRegion { region: &'static str },

    #[error("Matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid orientation '{0}': expected '+' or '-'")]
    InvalidOrientation(String),

    #[error("Anchor list has {anchors} entries but orientation list has {orientations}")]
    LengthMismatch { anchors: usize, orientations: usize },

    #[error("Anchor {anchor} appears with conflicting orientations")]
    AmbiguousOrientation { anchor: usize },

    #[error("Invalid bins: {0}")]
    InvalidBins(String),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
