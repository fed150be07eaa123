//! Region masks for peak, domain, isolation and flame geometries.
//!
//! Masks depend only on geometry parameters and snippet shape, never on
//! matrix content, so one mask set serves every snippet of that shape.
//! [`MaskCache`] memoizes them per parameter tuple.

use crate::config::{DomainParams, IsolationParams};
use crate::error::{Result, ScoreError};
use crate::snippet::FlameOrientation;
use ndarray::{s, Array2, ArrayBase, Data, Ix2};
use rustc_hash::FxHashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

/// Boolean selection over a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionMask {
    cells: Array2<bool>,
}

impl RegionMask {
    /// Create a mask selecting nothing.
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            cells: Array2::from_elem(shape, false),
        }
    }

    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Select the block `rows x cols`. Ranges are clipped to the mask and
    /// empty or inverted ranges select nothing.
    pub fn fill(&mut self, rows: Range<usize>, cols: Range<usize>) {
        let (nrows, ncols) = self.dim();
        let rows = rows.start.min(nrows)..rows.end.min(nrows);
        let cols = cols.start.min(ncols)..cols.end.min(ncols);
        if rows.is_empty() || cols.is_empty() {
            return;
        }
        self.cells.slice_mut(s![rows, cols]).fill(true);
    }

    /// Keep only cells with `min_offset <= col - row <= max_offset`.
    pub fn clip_band(&mut self, min_offset: i64, max_offset: i64) {
        for ((row, col), cell) in self.cells.indexed_iter_mut() {
            let offset = col as i64 - row as i64;
            if offset < min_offset || offset > max_offset {
                *cell = false;
            }
        }
    }

    /// Cells selected by either mask.
    pub fn union(&self, other: &RegionMask) -> Result<RegionMask> {
        self.check_shape(other.dim())?;
        let mut cells = self.cells.clone();
        cells.zip_mut_with(&other.cells, |a, &b| *a |= b);
        Ok(RegionMask { cells })
    }

    /// Check whether any cell is selected by both masks.
    pub fn overlaps(&self, other: &RegionMask) -> bool {
        self.dim() == other.dim()
            && self
                .cells
                .iter()
                .zip(other.cells.iter())
                .any(|(&a, &b)| a && b)
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of selected cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    pub fn cells(&self) -> &Array2<bool> {
        &self.cells
    }

    /// Numeric 0/1 rendering of the mask.
    pub fn to_weights(&self) -> Array2<f64> {
        self.cells.mapv(|c| if c { 1.0 } else { 0.0 })
    }

    /// Mean of the selected cells of `snippet`.
    ///
    /// `region` names the mask in the error raised when nothing is selected.
    pub fn mean<S>(&self, snippet: &ArrayBase<S, Ix2>, region: &'static str) -> Result<f64>
    where
        S: Data<Elem = f64>,
    {
        self.check_shape(snippet.dim())?;
        let (sum, count) = self
            .cells
            .iter()
            .zip(snippet.iter())
            .filter(|(selected, _)| **selected)
            .fold((0.0, 0usize), |(sum, count), (_, &v)| (sum + v, count + 1));
        if count == 0 {
            return Err(ScoreError::EmptyRegion { region });
        }
        Ok(sum / count as f64)
    }

    fn check_shape(&self, found: (usize, usize)) -> Result<()> {
        if self.dim() != found {
            return Err(ScoreError::ShapeMismatch {
                expected: self.dim(),
                found,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Radial bands shared by peak and flame geometry
// ============================================================================

/// Check that a centre band of half-width `inner` and a background reaching
/// `outer` bins from the middle fit on an axis of length `len`.
fn check_radii(len: usize, inner: usize, outer: usize, what: &str) -> Result<()> {
    let mid = len / 2;
    if inner == 0 {
        return Err(ScoreError::InvalidGeometry(format!(
            "{} half-width must be at least 1",
            what
        )));
    }
    if outer < inner {
        return Err(ScoreError::InvalidGeometry(format!(
            "{} background ({}) must not be smaller than its half-width ({})",
            what, outer, inner
        )));
    }
    if outer > mid || mid + outer >= len {
        return Err(ScoreError::InvalidGeometry(format!(
            "{} background ({}) exceeds the half-extent of a {}-bin snippet",
            what, outer, len
        )));
    }
    Ok(())
}

/// Cells within `inner - 1` of `mid`.
#[inline]
fn centre_range(mid: usize, inner: usize) -> Range<usize> {
    mid + 1 - inner..mid + inner
}

/// Cells at offsets `inner..=outer` from `mid`, before (`sign < 0`) or after it.
#[inline]
fn flank_range(mid: usize, inner: usize, outer: usize, sign: i8) -> Range<usize> {
    if sign < 0 {
        mid - outer..mid + 1 - inner
    } else {
        mid + inner..mid + outer + 1
    }
}

// ============================================================================
// Peak quadrants
// ============================================================================

/// Background corner of a peak snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UpperLeft,
        Quadrant::UpperRight,
        Quadrant::LowerLeft,
        Quadrant::LowerRight,
    ];

    /// Direction of the corner as `(row_sign, col_sign)`; upper and left are negative.
    #[inline]
    pub fn signs(self) -> (i8, i8) {
        match self {
            Quadrant::UpperLeft => (-1, -1),
            Quadrant::UpperRight => (-1, 1),
            Quadrant::LowerLeft => (1, -1),
            Quadrant::LowerRight => (1, 1),
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            Quadrant::UpperLeft => 0,
            Quadrant::UpperRight => 1,
            Quadrant::LowerLeft => 2,
            Quadrant::LowerRight => 3,
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quadrant::UpperLeft => write!(f, "upperLeft"),
            Quadrant::UpperRight => write!(f, "upperRight"),
            Quadrant::LowerLeft => write!(f, "lowerLeft"),
            Quadrant::LowerRight => write!(f, "lowerRight"),
        }
    }
}

/// Interior square plus one background corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadrantMask {
    pub interior: RegionMask,
    pub background: RegionMask,
}

/// Interior and background masks of one quadrant of a `size x size` peak snippet.
pub fn quadrant_mask(
    size: usize,
    peak_half_width: usize,
    background_half_width: usize,
    quadrant: Quadrant,
) -> Result<QuadrantMask> {
    check_radii(size, peak_half_width, background_half_width, "peak")?;
    let mid = size / 2;
    let (row_sign, col_sign) = quadrant.signs();

    let mut interior = RegionMask::new((size, size));
    let centre = centre_range(mid, peak_half_width);
    interior.fill(centre.clone(), centre);

    let mut background = RegionMask::new((size, size));
    background.fill(
        flank_range(mid, peak_half_width, background_half_width, row_sign),
        flank_range(mid, peak_half_width, background_half_width, col_sign),
    );

    Ok(QuadrantMask {
        interior,
        background,
    })
}

/// Interior and all four background corners of a peak snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakMasks {
    pub interior: RegionMask,
    backgrounds: [RegionMask; 4],
}

impl PeakMasks {
    pub fn new(size: usize, peak_half_width: usize, background_half_width: usize) -> Result<Self> {
        let [ul, ur, ll, lr] = Quadrant::ALL
            .map(|q| quadrant_mask(size, peak_half_width, background_half_width, q));
        let ul = ul?;
        Ok(Self {
            interior: ul.interior,
            backgrounds: [ul.background, ur?.background, ll?.background, lr?.background],
        })
    }

    #[inline]
    pub fn background(&self, quadrant: Quadrant) -> &RegionMask {
        &self.backgrounds[quadrant.index()]
    }
}

// ============================================================================
// Domain and isolation sectors
// ============================================================================

/// Within-domain and cross-domain regions of a snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorMasks {
    pub in_domain: RegionMask,
    pub out_domain: RegionMask,
}

/// Sector masks for two adjacent domains concatenated along the diagonal.
///
/// The first domain covers bins `0..first_len` of a `size`-bin snippet and
/// the second the remainder. Each block and the off-block rectangle
/// between them are trimmed by `delta` on every side, then clipped to
/// `diag_offset <= col - row <= max_distance`.
pub fn domain_masks(first_len: usize, size: usize, params: &DomainParams) -> Result<SectorMasks> {
    params.validate()?;
    if first_len > size {
        return Err(ScoreError::InvalidGeometry(format!(
            "first domain ({} bins) is longer than the {}-bin snippet",
            first_len, size
        )));
    }
    if params.max_distance > size / 2 {
        return Err(ScoreError::GeometryOverflow {
            max_distance: params.max_distance,
            size,
        });
    }

    let delta = params.delta;
    let first = delta..first_len.saturating_sub(delta);
    let second = first_len + delta..size.saturating_sub(delta);

    let mut out_domain = RegionMask::new((size, size));
    out_domain.fill(first.clone(), second.clone());

    let mut in_domain = RegionMask::new((size, size));
    in_domain.fill(first.clone(), first);
    in_domain.fill(second.clone(), second);

    let (lo, hi) = (params.diag_offset as i64, params.max_distance as i64);
    out_domain.clip_band(lo, hi);
    in_domain.clip_band(lo, hi);

    Ok(SectorMasks {
        in_domain,
        out_domain,
    })
}

/// Footprint of the isolation sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeMode {
    /// Clip both sectors to `col - row > diag_offset`
    Triangle,
    /// Keep the full blocks
    Square,
}

impl ShapeMode {
    /// Smallest kept distance from the diagonal.
    #[inline]
    pub fn min_offset(self, diag_offset: usize) -> i64 {
        match self {
            ShapeMode::Triangle => diag_offset as i64 + 1,
            ShapeMode::Square => 0,
        }
    }
}

impl FromStr for ShapeMode {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "triangle" => Ok(ShapeMode::Triangle),
            "square" => Ok(ShapeMode::Square),
            _ => Err(ScoreError::InvalidShapeMode(s.to_string())),
        }
    }
}

impl TryFrom<u8> for ShapeMode {
    type Error = ScoreError;

    /// Numeric state flag: 1 for triangle, 0 for square.
    fn try_from(state: u8) -> Result<Self> {
        match state {
            1 => Ok(ShapeMode::Triangle),
            0 => Ok(ShapeMode::Square),
            _ => Err(ScoreError::InvalidShapeMode(state.to_string())),
        }
    }
}

impl fmt::Display for ShapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeMode::Triangle => write!(f, "triangle"),
            ShapeMode::Square => write!(f, "square"),
        }
    }
}

/// Sector masks of an isolation snippet of side `4 * (diag_offset + delta) + 1`.
///
/// `in_domain` holds two `diag_offset`-sized blocks, one inside each
/// domain flanking the central anchor; `out_domain` is the block bridging
/// across the anchor.
pub fn isolation_masks(params: &IsolationParams) -> Result<SectorMasks> {
    params.validate()?;
    let size = params.window_size();
    let mid = size / 2;
    let (d, delta) = (params.diag_offset, params.delta);

    let mut out_domain = RegionMask::new((size, size));
    out_domain.fill(mid - d..mid, mid + 1..mid + d + 1);

    let mut in_domain = RegionMask::new((size, size));
    in_domain.fill(delta..delta + d, d + delta + 1..2 * d + delta + 1);
    in_domain.fill(
        mid + delta..mid + d + delta,
        mid + d + delta + 1..mid + 2 * d + delta + 1,
    );

    let (lo, hi) = (
        params.shape.min_offset(d),
        params.max_distance as i64,
    );
    out_domain.clip_band(lo, hi);
    in_domain.clip_band(lo, hi);

    Ok(SectorMasks {
        in_domain,
        out_domain,
    })
}

// ============================================================================
// Flame bands
// ============================================================================

/// Interior band and the two flanking bands of a flame snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlameMasks {
    pub interior: RegionMask,
    /// Flank before and after the interior along the cross axis
    pub flanks: [RegionMask; 2],
}

/// Bands of a flame snippet of shape `(rows, cols)`.
///
/// The cross axis is the columns for vertical flames and the rows for
/// horizontal ones. Bands run the full length of the other axis.
pub fn flame_masks(
    shape: (usize, usize),
    orientation: FlameOrientation,
    flame_half_thickness: usize,
    background_half_thickness: usize,
) -> Result<FlameMasks> {
    let (rows, cols) = shape;
    let cross = match orientation {
        FlameOrientation::Vertical => cols,
        FlameOrientation::Horizontal => rows,
    };
    check_radii(
        cross,
        flame_half_thickness,
        background_half_thickness,
        "flame",
    )?;
    let mid = cross / 2;

    let band = |range: Range<usize>| {
        let mut mask = RegionMask::new(shape);
        match orientation {
            FlameOrientation::Vertical => mask.fill(0..rows, range),
            FlameOrientation::Horizontal => mask.fill(range, 0..cols),
        }
        mask
    };

    Ok(FlameMasks {
        interior: band(centre_range(mid, flame_half_thickness)),
        flanks: [
            band(flank_range(
                mid,
                flame_half_thickness,
                background_half_thickness,
                -1,
            )),
            band(flank_range(
                mid,
                flame_half_thickness,
                background_half_thickness,
                1,
            )),
        ],
    })
}

// ============================================================================
// Memoization
// ============================================================================

/// Memoizes masks per distinct geometry.
#[derive(Debug, Default)]
pub struct MaskCache {
    peak: FxHashMap<(usize, usize, usize), Arc<PeakMasks>>,
    domain: FxHashMap<(usize, usize, DomainParams), Arc<SectorMasks>>,
    isolation: FxHashMap<(usize, usize, usize, ShapeMode), Arc<SectorMasks>>,
    flame: FxHashMap<((usize, usize), FlameOrientation, usize, usize), Arc<FlameMasks>>,
}

impl MaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(
        &mut self,
        size: usize,
        peak_half_width: usize,
        background_half_width: usize,
    ) -> Result<Arc<PeakMasks>> {
        let key = (size, peak_half_width, background_half_width);
        if let Some(masks) = self.peak.get(&key) {
            return Ok(Arc::clone(masks));
        }
        let masks = Arc::new(PeakMasks::new(size, peak_half_width, background_half_width)?);
        self.peak.insert(key, Arc::clone(&masks));
        Ok(masks)
    }

    pub fn domain(
        &mut self,
        first_len: usize,
        size: usize,
        params: &DomainParams,
    ) -> Result<Arc<SectorMasks>> {
        let key = (first_len, size, *params);
        if let Some(masks) = self.domain.get(&key) {
            return Ok(Arc::clone(masks));
        }
        let masks = Arc::new(domain_masks(first_len, size, params)?);
        self.domain.insert(key, Arc::clone(&masks));
        Ok(masks)
    }

    pub fn isolation(&mut self, params: &IsolationParams) -> Result<Arc<SectorMasks>> {
        let key = (
            params.delta,
            params.diag_offset,
            params.max_distance,
            params.shape,
        );
        if let Some(masks) = self.isolation.get(&key) {
            return Ok(Arc::clone(masks));
        }
        let masks = Arc::new(isolation_masks(params)?);
        self.isolation.insert(key, Arc::clone(&masks));
        Ok(masks)
    }

    pub fn flame(
        &mut self,
        shape: (usize, usize),
        orientation: FlameOrientation,
        flame_half_thickness: usize,
        background_half_thickness: usize,
    ) -> Result<Arc<FlameMasks>> {
        let key = (
            shape,
            orientation,
            flame_half_thickness,
            background_half_thickness,
        );
        if let Some(masks) = self.flame.get(&key) {
            return Ok(Arc::clone(masks));
        }
        let masks = Arc::new(flame_masks(
            shape,
            orientation,
            flame_half_thickness,
            background_half_thickness,
        )?);
        self.flame.insert(key, Arc::clone(&masks));
        Ok(masks)
    }

    /// Number of cached geometries.
    pub fn len(&self) -> usize {
        self.peak.len() + self.domain.len() + self.isolation.len() + self.flame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
