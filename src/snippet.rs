//! Snippet extraction.
//!
//! Every function returns a newly allocated matrix and fails with
//! [`ScoreError::OutOfBounds`] instead of clamping when a window would
//! read outside the contact map.
//!
//! Windows follow one centre convention: a window of `size` cells around
//! `center` starts at `center - size / 2`. Even windows are therefore not
//! symmetric about the centre bin.

use crate::error::{MatrixAxis, Result, ScoreError};
use crate::matrix::{square_dim, ContactMatrix};
use ndarray::{s, ArrayBase, Data, Ix2};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Validate a half-open window `[start, start + len)` against an axis of length `dim`.
fn checked_range(start: i64, len: usize, dim: usize, axis: MatrixAxis) -> Result<Range<usize>> {
    let end = start + len as i64;
    if start < 0 || end > dim as i64 {
        return Err(ScoreError::OutOfBounds {
            axis,
            start,
            end,
            dim,
        });
    }
    Ok(start as usize..end as usize)
}

/// Copy the block starting at `(row_start, col_start)` with the given shape.
fn extract_block<S>(
    matrix: &ArrayBase<S, Ix2>,
    row_start: i64,
    col_start: i64,
    shape: (usize, usize),
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = matrix.dim();
    let r = checked_range(row_start, shape.0, rows, MatrixAxis::Row)?;
    let c = checked_range(col_start, shape.1, cols, MatrixAxis::Col)?;
    Ok(matrix.slice(s![r, c]).to_owned())
}

/// Anchor at `anchors[index + offset]`.
pub(crate) fn anchor_at(anchors: &[usize], index: usize, offset: usize) -> Result<usize> {
    index
        .checked_add(offset)
        .and_then(|i| anchors.get(i).copied())
        .ok_or(ScoreError::IndexRange {
            index,
            offset,
            len: anchors.len(),
        })
}

/// Square window of `window_size` cells centred on `(row_center, col_center)`.
pub fn extract_window<S>(
    matrix: &ArrayBase<S, Ix2>,
    row_center: usize,
    col_center: usize,
    window_size: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    if window_size == 0 {
        return Err(ScoreError::InvalidGeometry(
            "window size must be positive".to_string(),
        ));
    }
    let half = (window_size / 2) as i64;
    extract_block(
        matrix,
        row_center as i64 - half,
        col_center as i64 - half,
        (window_size, window_size),
    )
}

/// On-diagonal snippet `[center - half_width, center + half_width)` on both axes.
pub fn extract_diagonal<S>(
    matrix: &ArrayBase<S, Ix2>,
    center: usize,
    half_width: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    if half_width == 0 {
        return Err(ScoreError::InvalidGeometry(
            "half width must be positive".to_string(),
        ));
    }
    extract_window(matrix, center, center, 2 * half_width)
}

/// Off-diagonal snippet around the contact between `row_anchor` and `col_anchor`.
pub fn extract_offdiagonal<S>(
    matrix: &ArrayBase<S, Ix2>,
    row_anchor: usize,
    col_anchor: usize,
    half_width: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    if half_width == 0 {
        return Err(ScoreError::InvalidGeometry(
            "half width must be positive".to_string(),
        ));
    }
    extract_window(matrix, row_anchor, col_anchor, 2 * half_width)
}

/// Peak snippet between `anchors[index]` and `anchors[index + peak_offset]`.
pub fn extract_peak<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
    peak_offset: usize,
    half_width: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    let row = anchor_at(anchors, index, 0)?;
    let col = anchor_at(anchors, index, peak_offset)?;
    extract_offdiagonal(matrix, row, col, half_width)
}

/// Closed block `anchors[index] ..= anchors[index + step]` on both axes.
///
/// `step` is 1 for a single domain and 2 for a pair of adjacent domains.
pub fn extract_span<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
    step: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    if step == 0 {
        return Err(ScoreError::InvalidGeometry(
            "span must cover at least one anchor step".to_string(),
        ));
    }
    let start = anchor_at(anchors, index, 0)?;
    let end = anchor_at(anchors, index, step)?;
    if end < start {
        return Err(ScoreError::InvalidGeometry(format!(
            "anchors must be ascending, got {} before {}",
            start, end
        )));
    }
    let len = end - start + 1;
    extract_block(matrix, start as i64, start as i64, (len, len))
}

/// Domain snippet between two consecutive anchors.
pub fn extract_domain<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    extract_span(matrix, anchors, index, 1)
}

/// Flame direction relative to the contact map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlameOrientation {
    /// Stripe along a column, running down towards the diagonal
    Vertical,
    /// Stripe along a row, running right away from the diagonal
    Horizontal,
}

impl FromStr for FlameOrientation {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(FlameOrientation::Vertical),
            "horizontal" | "h" => Ok(FlameOrientation::Horizontal),
            _ => Err(ScoreError::InvalidGeometry(format!(
                "unknown flame orientation '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for FlameOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlameOrientation::Vertical => write!(f, "vertical"),
            FlameOrientation::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// Flame snippet between `anchors[index]` and `anchors[index + 1]`.
///
/// The flame runs the length of the domain with `edge` bins dropped at
/// both ends, and spans `2 * width` bins across. Vertical flames hang
/// from the closing anchor's column; horizontal flames extend along the
/// opening anchor's row.
pub fn extract_flame<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
    width: usize,
    edge: usize,
    orientation: FlameOrientation,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    if width == 0 {
        return Err(ScoreError::InvalidGeometry(
            "flame width must be positive".to_string(),
        ));
    }
    let start = anchor_at(anchors, index, 0)? as i64;
    let end = anchor_at(anchors, index, 1)? as i64;

    let along = start + edge as i64;
    let along_end = end - edge as i64;
    if along_end <= along {
        return Err(ScoreError::InvalidGeometry(format!(
            "flame between {} and {} is empty after trimming {} edge bins",
            start, end, edge
        )));
    }
    let length = (along_end - along) as usize;
    let w = width as i64;

    match orientation {
        FlameOrientation::Vertical => extract_block(matrix, along, end - w, (length, 2 * width)),
        FlameOrientation::Horizontal => {
            extract_block(matrix, start - w, along, (2 * width, length))
        }
    }
}

/// Centred square window of `window_size` cells from a square matrix.
///
/// Starts at `N / 2 - window_size / 2`; used to crop isolation snippets
/// out of larger pileups.
pub fn extract_centered<S>(matrix: &ArrayBase<S, Ix2>, window_size: usize) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    let n = square_dim(matrix)?;
    extract_window(matrix, n / 2, n / 2, window_size)
}
