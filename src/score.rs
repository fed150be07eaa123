//! Feature scores.
//!
//! Every score is a ratio of an interior mean to a background mean,
//! optionally stabilized by a pseudo count added to both. A zero
//! denominator is reported as [`ScoreError::DivisionByZero`] rather than
//! producing `inf` or `NaN`.

use crate::config::{DomainParams, FlameParams, IsolationParams, PeakParams};
use crate::error::{Result, ScoreError};
use crate::mask::{
    domain_masks, flame_masks, isolation_masks, FlameMasks, MaskCache, PeakMasks, Quadrant,
    SectorMasks,
};
use crate::matrix::{square_dim, ContactMatrix};
use crate::snippet::{anchor_at, extract_centered, extract_span, FlameOrientation};
use ndarray::{ArrayBase, Data, Ix2};

/// `(pseudo_count + interior) / (pseudo_count + background)`.
#[inline]
fn ratio(interior: f64, background: f64, pseudo_count: f64, region: &'static str) -> Result<f64> {
    let denominator = pseudo_count + background;
    if denominator == 0.0 {
        return Err(ScoreError::DivisionByZero { region });
    }
    Ok((pseudo_count + interior) / denominator)
}

// ============================================================================
// Peaks
// ============================================================================

/// Peak enrichment against each background corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakScores {
    pub upper_left: f64,
    pub upper_right: f64,
    pub lower_left: f64,
    pub lower_right: f64,
}

impl PeakScores {
    pub fn get(&self, quadrant: Quadrant) -> f64 {
        match quadrant {
            Quadrant::UpperLeft => self.upper_left,
            Quadrant::UpperRight => self.upper_right,
            Quadrant::LowerLeft => self.lower_left,
            Quadrant::LowerRight => self.lower_right,
        }
    }

    /// Arithmetic mean of the four corner scores.
    pub fn mean(&self) -> f64 {
        (self.upper_right + self.lower_right + self.upper_left + self.lower_left) / 4.0
    }
}

/// Peak scores of a snippet against prebuilt masks.
pub fn peak_scores_with_masks<S>(
    snippet: &ArrayBase<S, Ix2>,
    masks: &PeakMasks,
    pseudo_count: f64,
) -> Result<PeakScores>
where
    S: Data<Elem = f64>,
{
    let interior = masks.interior.mean(snippet, "peak interior")?;
    let corner = |quadrant| {
        let background = masks.background(quadrant).mean(snippet, "peak background")?;
        ratio(interior, background, pseudo_count, "peak background")
    };

    Ok(PeakScores {
        upper_left: corner(Quadrant::UpperLeft)?,
        upper_right: corner(Quadrant::UpperRight)?,
        lower_left: corner(Quadrant::LowerLeft)?,
        lower_right: corner(Quadrant::LowerRight)?,
    })
}

/// Peak scores against all four background corners of a square snippet.
pub fn peak_scores<S>(snippet: &ArrayBase<S, Ix2>, params: &PeakParams) -> Result<PeakScores>
where
    S: Data<Elem = f64>,
{
    params.validate()?;
    let size = square_dim(snippet)?;
    let masks = PeakMasks::new(size, params.peak_half_width, params.background_half_width)?;
    peak_scores_with_masks(snippet, &masks, params.pseudo_count)
}

/// Peak score against a single background corner.
pub fn peak_quadrant_score<S>(
    snippet: &ArrayBase<S, Ix2>,
    quadrant: Quadrant,
    params: &PeakParams,
) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    Ok(peak_scores(snippet, params)?.get(quadrant))
}

/// Mean of the four corner peak scores.
pub fn peak_score<S>(snippet: &ArrayBase<S, Ix2>, params: &PeakParams) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    Ok(peak_scores(snippet, params)?.mean())
}

// ============================================================================
// Domains and isolation
// ============================================================================

fn sector_ratio<S>(snippet: &ArrayBase<S, Ix2>, masks: &SectorMasks, pseudo_count: f64) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    let inside = masks.in_domain.mean(snippet, "in-domain")?;
    let outside = masks.out_domain.mean(snippet, "out-domain")?;
    ratio(inside, outside, pseudo_count, "out-domain")
}

/// Snippet spanning `anchors[index]..=anchors[index + 2]` with its sector masks.
pub fn domain_sectors<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
    params: &DomainParams,
) -> Result<(SectorMasks, ContactMatrix)>
where
    S: Data<Elem = f64>,
{
    let snippet = extract_span(matrix, anchors, index, 2)?;
    let start = anchor_at(anchors, index, 0)?;
    let first_len = anchor_at(anchors, index, 1)?.saturating_sub(start) + 1;
    let masks = domain_masks(first_len, snippet.nrows(), params)?;
    Ok((masks, snippet))
}

/// Domain score of a two-domain snippet whose first domain covers `first_len` bins.
pub fn domain_score_snippet<S>(
    snippet: &ArrayBase<S, Ix2>,
    first_len: usize,
    params: &DomainParams,
) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    let size = square_dim(snippet)?;
    let masks = domain_masks(first_len, size, params)?;
    sector_ratio(snippet, &masks, 0.0)
}

/// Ratio of within-domain to cross-domain contacts for the two domains
/// starting at `anchors[index]`.
pub fn domain_score<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    index: usize,
    params: &DomainParams,
) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    let (masks, snippet) = domain_sectors(matrix, anchors, index, params)?;
    sector_ratio(&snippet, &masks, 0.0)
}

/// Centred isolation snippet of `matrix` with its sector masks.
pub fn isolation_sectors<S>(
    matrix: &ArrayBase<S, Ix2>,
    params: &IsolationParams,
) -> Result<(SectorMasks, ContactMatrix)>
where
    S: Data<Elem = f64>,
{
    let masks = isolation_masks(params)?;
    let snippet = extract_centered(matrix, params.window_size())?;
    Ok((masks, snippet))
}

/// Isolation score of the anchor at the centre of `snippet`.
///
/// `snippet` may be larger than the isolation window (e.g. a diagonal
/// pileup); the centred window is cropped from it.
pub fn isolation_score<S>(snippet: &ArrayBase<S, Ix2>, params: &IsolationParams) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    let (masks, window) = isolation_sectors(snippet, params)?;
    sector_ratio(&window, &masks, params.pseudo_count)
}

// ============================================================================
// Flames
// ============================================================================

fn flame_ratio<S>(snippet: &ArrayBase<S, Ix2>, masks: &FlameMasks, pseudo_count: f64) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    let interior = masks.interior.mean(snippet, "flame interior")?;
    let before = masks.flanks[0].mean(snippet, "flame background")?;
    let after = masks.flanks[1].mean(snippet, "flame background")?;
    ratio(interior, (before + after) / 2.0, pseudo_count, "flame background")
}

/// Flame enrichment of the middle band against its two flanking bands.
pub fn flame_score<S>(snippet: &ArrayBase<S, Ix2>, params: &FlameParams) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    params.validate()?;
    let masks = flame_masks(
        snippet.dim(),
        params.orientation,
        params.flame_half_thickness,
        params.background_half_thickness,
    )?;
    flame_ratio(snippet, &masks, params.pseudo_count)
}

/// Flame score across the columns of a vertical flame snippet.
pub fn flame_score_vertical<S>(
    snippet: &ArrayBase<S, Ix2>,
    flame_half_thickness: usize,
    background_half_thickness: usize,
    pseudo_count: f64,
) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    flame_score(
        snippet,
        &FlameParams::new(
            FlameOrientation::Vertical,
            flame_half_thickness,
            background_half_thickness,
            pseudo_count,
        ),
    )
}

/// Flame score across the rows of a horizontal flame snippet.
pub fn flame_score_horizontal<S>(
    snippet: &ArrayBase<S, Ix2>,
    flame_half_thickness: usize,
    background_half_thickness: usize,
    pseudo_count: f64,
) -> Result<f64>
where
    S: Data<Elem = f64>,
{
    flame_score(
        snippet,
        &FlameParams::new(
            FlameOrientation::Horizontal,
            flame_half_thickness,
            background_half_thickness,
            pseudo_count,
        ),
    )
}

// ============================================================================
// Dispatch
// ============================================================================

/// A feature type together with its scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feature {
    Peak(PeakParams),
    /// Two adjacent domains; the first covers `first_len` bins of the snippet
    Domain { params: DomainParams, first_len: usize },
    Isolation(IsolationParams),
    Flame(FlameParams),
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Peak(_) => "peak",
            Feature::Domain { .. } => "domain",
            Feature::Isolation(_) => "isolation",
            Feature::Flame(_) => "flame",
        }
    }

    /// Score one snippet.
    pub fn score<S>(&self, snippet: &ArrayBase<S, Ix2>) -> Result<f64>
    where
        S: Data<Elem = f64>,
    {
        match self {
            Feature::Peak(params) => peak_score(snippet, params),
            Feature::Domain { params, first_len } => {
                domain_score_snippet(snippet, *first_len, params)
            }
            Feature::Isolation(params) => isolation_score(snippet, params),
            Feature::Flame(params) => flame_score(snippet, params),
        }
    }

    /// Score many snippets, building each distinct mask geometry once.
    pub fn score_all(&self, snippets: &[ContactMatrix]) -> Result<Vec<f64>> {
        let mut cache = MaskCache::new();
        snippets
            .iter()
            .map(|snippet| self.score_cached(snippet, &mut cache))
            .collect()
    }

    fn score_cached(&self, snippet: &ContactMatrix, cache: &mut MaskCache) -> Result<f64> {
        match self {
            Feature::Peak(params) => {
                params.validate()?;
                let masks = cache.peak(
                    square_dim(snippet)?,
                    params.peak_half_width,
                    params.background_half_width,
                )?;
                Ok(peak_scores_with_masks(snippet, &masks, params.pseudo_count)?.mean())
            }
            Feature::Domain { params, first_len } => {
                let masks = cache.domain(*first_len, square_dim(snippet)?, params)?;
                sector_ratio(snippet, &masks, 0.0)
            }
            Feature::Isolation(params) => {
                let masks = cache.isolation(params)?;
                let window = extract_centered(snippet, params.window_size())?;
                sector_ratio(&window, &masks, params.pseudo_count)
            }
            Feature::Flame(params) => {
                params.validate()?;
                let masks = cache.flame(
                    snippet.dim(),
                    params.orientation,
                    params.flame_half_thickness,
                    params.background_half_thickness,
                )?;
                flame_ratio(snippet, &masks, params.pseudo_count)
            }
        }
    }
}
