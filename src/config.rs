//! Scoring parameters and global runtime configuration.
//!
//! Each feature type has one parameter struct with named fields and
//! documented defaults. The global parallel switch affects how pileups
//! accumulate without adding overhead to the hot loops.

use crate::error::{Result, ScoreError};
use crate::mask::ShapeMode;
use crate::snippet::FlameOrientation;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag for rayon-backed pileup accumulation.
///
/// Only the threading changes: pileups fold fixed chunks in ascending
/// anchor order and merge them in chunk order either way, so results are
/// bit-identical with the flag on or off.
static PARALLEL: AtomicBool = AtomicBool::new(true);

/// Enable or disable parallel pileup accumulation.
///
/// # Example
///
/// ```
/// use chromoscores::config;
///
/// // Accumulate on the calling thread only
/// config::set_parallel(false);
/// assert!(!config::is_parallel());
/// config::set_parallel(true);
/// ```
#[inline]
pub fn set_parallel(enabled: bool) {
    PARALLEL.store(enabled, Ordering::Release);
}

/// Check if parallel pileup accumulation is enabled.
#[inline]
pub fn is_parallel() -> bool {
    PARALLEL.load(Ordering::Acquire)
}

fn check_pseudo_count(pseudo_count: f64) -> Result<()> {
    if !pseudo_count.is_finite() || pseudo_count < 0.0 {
        return Err(ScoreError::InvalidGeometry(format!(
            "pseudo count must be a finite non-negative number, got {}",
            pseudo_count
        )));
    }
    Ok(())
}

/// Peak score parameters.
///
/// The interior covers cells within `peak_half_width - 1` of the snippet
/// centre; each background corner covers offsets `peak_half_width..=background_half_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    /// Interior half-width (1 selects only the centre cell)
    pub peak_half_width: usize,
    /// Outer reach of the background corners
    pub background_half_width: usize,
    /// Added to both means before the ratio is taken
    pub pseudo_count: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            peak_half_width: 2,
            background_half_width: 4,
            pseudo_count: 1.0,
        }
    }
}

impl PeakParams {
    pub fn new(peak_half_width: usize, background_half_width: usize, pseudo_count: f64) -> Self {
        Self {
            peak_half_width,
            background_half_width,
            pseudo_count,
        }
    }

    /// Check the parameters independent of any snippet size.
    pub fn validate(&self) -> Result<()> {
        if self.peak_half_width == 0 {
            return Err(ScoreError::InvalidGeometry(
                "peak half-width must be at least 1".to_string(),
            ));
        }
        if self.background_half_width < self.peak_half_width {
            return Err(ScoreError::InvalidGeometry(format!(
                "background half-width ({}) must not be smaller than peak half-width ({})",
                self.background_half_width, self.peak_half_width
            )));
        }
        check_pseudo_count(self.pseudo_count)
    }
}

/// Domain (TAD) score parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainParams {
    /// Bins trimmed from every side of each block
    pub delta: usize,
    /// Smallest kept distance from the local diagonal
    pub diag_offset: usize,
    /// Largest kept distance from the local diagonal (inclusive)
    pub max_distance: usize,
}

impl Default for DomainParams {
    fn default() -> Self {
        Self {
            delta: 1,
            diag_offset: 3,
            max_distance: 10,
        }
    }
}

impl DomainParams {
    pub fn new(delta: usize, diag_offset: usize, max_distance: usize) -> Self {
        Self {
            delta,
            diag_offset,
            max_distance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_distance < self.diag_offset {
            return Err(ScoreError::InvalidGeometry(format!(
                "max_distance ({}) is smaller than diag_offset ({})",
                self.max_distance, self.diag_offset
            )));
        }
        Ok(())
    }
}

/// Isolation score parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsolationParams {
    pub delta: usize,
    pub diag_offset: usize,
    pub max_distance: usize,
    pub shape: ShapeMode,
    pub pseudo_count: f64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            delta: 1,
            diag_offset: 3,
            max_distance: 10,
            shape: ShapeMode::Triangle,
            pseudo_count: 1.0,
        }
    }
}

impl IsolationParams {
    pub fn new(
        delta: usize,
        diag_offset: usize,
        max_distance: usize,
        shape: ShapeMode,
        pseudo_count: f64,
    ) -> Self {
        Self {
            delta,
            diag_offset,
            max_distance,
            shape,
            pseudo_count,
        }
    }

    /// Side length of the square snippet the isolation masks cover.
    #[inline]
    pub fn window_size(&self) -> usize {
        4 * (self.diag_offset + self.delta) + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.diag_offset == 0 {
            return Err(ScoreError::InvalidGeometry(
                "isolation diag_offset must be at least 1".to_string(),
            ));
        }
        check_pseudo_count(self.pseudo_count)
    }
}

/// Flame score parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlameParams {
    pub orientation: FlameOrientation,
    /// Interior band half-thickness (1 selects only the middle line)
    pub flame_half_thickness: usize,
    /// Outer reach of the two flanking bands
    pub background_half_thickness: usize,
    pub pseudo_count: f64,
}

impl Default for FlameParams {
    fn default() -> Self {
        Self {
            orientation: FlameOrientation::Vertical,
            flame_half_thickness: 1,
            background_half_thickness: 3,
            pseudo_count: 1.0,
        }
    }
}

impl FlameParams {
    pub fn new(
        orientation: FlameOrientation,
        flame_half_thickness: usize,
        background_half_thickness: usize,
        pseudo_count: f64,
    ) -> Self {
        Self {
            orientation,
            flame_half_thickness,
            background_half_thickness,
            pseudo_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.flame_half_thickness == 0 {
            return Err(ScoreError::InvalidGeometry(
                "flame half-thickness must be at least 1".to_string(),
            ));
        }
        if self.background_half_thickness < self.flame_half_thickness {
            return Err(ScoreError::InvalidGeometry(format!(
                "background half-thickness ({}) must not be smaller than flame half-thickness ({})",
                self.background_half_thickness, self.flame_half_thickness
            )));
        }
        check_pseudo_count(self.pseudo_count)
    }
}

/// Check a pileup window against a contact map of size `dim`.
pub fn check_window_size(window_size: usize, dim: usize) -> Result<()> {
    if window_size == 0 || window_size > dim {
        return Err(ScoreError::InvalidGeometry(format!(
            "window size must be larger than 0 and at most the contact map size ({}), got {}",
            dim, window_size
        )));
    }
    Ok(())
}

/// Parameters of an evenly binned off-diagonal pileup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PileupParams {
    pub window_size: usize,
    /// Number of distance bins between the minimum and maximum distance
    pub bin_count: usize,
}

impl Default for PileupParams {
    fn default() -> Self {
        Self {
            window_size: 10,
            bin_count: 5,
        }
    }
}

impl PileupParams {
    pub fn new(window_size: usize, bin_count: usize) -> Self {
        Self {
            window_size,
            bin_count,
        }
    }

    /// Check the parameters against a matrix of size `dim`.
    pub fn validate(&self, dim: usize) -> Result<()> {
        check_window_size(self.window_size, dim)?;
        if self.bin_count == 0 {
            return Err(ScoreError::InvalidBins(
                "bin count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
