//! Pileup aggregation.
//!
//! A pileup is the elementwise sum of many snippets. Diagonal pileups sum
//! windows centred on single anchors; off-diagonal pileups sum windows
//! centred on anchor pairs, grouped by pair distance and optionally by the
//! orientation relationship of the two anchors.
//!
//! Sums are not normalized; [`Pileup::mean`] and [`OrientedPileup::mean`]
//! divide by the number of contributing pairs.

use crate::anchors::{OrientationMap, PairCategory, Strand};
use crate::config::{check_window_size, PileupParams};
use crate::error::{Result, ScoreError};
use crate::matrix::{square_dim, ContactMatrix};
use crate::parallel::{fold_reduce, sum_matrices};
use crate::snippet::extract_window;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Distance bins `[edge[k], edge[k + 1])` over anchor-pair separations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinEdges {
    edges: Vec<i64>,
}

impl BinEdges {
    /// Use explicit, non-decreasing edges.
    pub fn new(edges: Vec<i64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(ScoreError::InvalidBins(format!(
                "need at least two edges, got {}",
                edges.len()
            )));
        }
        if let Some(w) = edges.windows(2).find(|w| w[1] < w[0]) {
            return Err(ScoreError::InvalidBins(format!(
                "edges must be non-decreasing, found {} after {}",
                w[1], w[0]
            )));
        }
        Ok(Self { edges })
    }

    /// `bin_count + 1` edges spaced evenly over `[min_dist, max_dist]`,
    /// each truncated toward zero.
    ///
    /// This is not the numpy `histogram(..., bins=bin_count + 1)` binning
    /// some Python pileup tools use, which yields `bin_count + 2` edges and
    /// stops the last used bin short of `max_dist`; per-bin results differ
    /// from such tools.
    pub fn linear(min_dist: i64, max_dist: i64, bin_count: usize) -> Result<Self> {
        if bin_count == 0 {
            return Err(ScoreError::InvalidBins(
                "bin count must be positive".to_string(),
            ));
        }
        if min_dist >= max_dist {
            return Err(ScoreError::InvalidBins(format!(
                "min distance ({}) must be smaller than max distance ({})",
                min_dist, max_dist
            )));
        }

        let step = (max_dist - min_dist) as f64 / bin_count as f64;
        let mut edges: Vec<i64> = (0..bin_count)
            .map(|k| (min_dist as f64 + k as f64 * step) as i64)
            .collect();
        edges.push(max_dist);

        Self::new(edges)
    }

    pub fn edges(&self) -> &[i64] {
        &self.edges
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.edges.len() - 1
    }

    /// Index of the bin containing `distance`, if any.
    #[inline]
    pub fn bin_of(&self, distance: i64) -> Option<usize> {
        let upper = self.edges.partition_point(|&e| e <= distance);
        if upper == 0 || upper >= self.edges.len() {
            return None;
        }
        Some(upper - 1)
    }

    /// Representative distance of bin `bin`.
    #[inline]
    pub fn midpoint(&self, bin: usize) -> f64 {
        (self.edges[bin] + self.edges[bin + 1]) as f64 / 2.0
    }
}

/// Summed snippets of one distance bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Pileup {
    /// Bin midpoint
    pub distance: f64,
    pub matrix: ContactMatrix,
    /// Number of anchor pairs summed into `matrix`
    pub pairs: usize,
}

impl Pileup {
    /// Per-pair average, or `None` for an empty bin.
    pub fn mean(&self) -> Option<ContactMatrix> {
        (self.pairs > 0).then(|| &self.matrix / self.pairs as f64)
    }
}

/// Summed snippets of one distance bin, split by orientation category.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedPileup {
    pub distance: f64,
    matrices: [ContactMatrix; 5],
    counts: [usize; 5],
}

impl OrientedPileup {
    pub fn matrix(&self, category: PairCategory) -> &ContactMatrix {
        &self.matrices[category.index()]
    }

    pub fn count(&self, category: PairCategory) -> usize {
        self.counts[category.index()]
    }

    /// Per-pair average of one category, or `None` if no pair contributed.
    pub fn mean(&self, category: PairCategory) -> Option<ContactMatrix> {
        let count = self.count(category);
        (count > 0).then(|| self.matrix(category) / count as f64)
    }
}

/// Anchors per chunk when folding anchor-pair rows.
const ROW_CHUNK_SIZE: usize = 8;

/// Copy of `anchors` in ascending order.
///
/// Every pileup folds in this order, so the floating-point sums do not
/// depend on the order the caller lists anchors in.
fn canonical_order(anchors: &[usize]) -> Vec<usize> {
    let mut order = anchors.to_vec();
    order.sort_unstable();
    order
}

/// Sum diagonal windows centred on every anchor.
///
/// The sum is bit-identical for any permutation of `anchors`. Any anchor
/// whose window leaves the matrix fails the whole call.
pub fn pileup_diagonal<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    window_size: usize,
) -> Result<ContactMatrix>
where
    S: Data<Elem = f64> + Sync,
{
    check_window_size(window_size, square_dim(matrix)?)?;
    log::debug!(
        "diagonal pileup: {} anchors, window {}",
        anchors.len(),
        window_size
    );

    let order = canonical_order(anchors);
    sum_matrices(&order, (window_size, window_size), |&anchor| {
        extract_window(matrix, anchor, anchor, window_size)
    })
}

/// Off-diagonal pileups over `params.bin_count` evenly spaced distance bins
/// between `min_dist` and `max_dist`.
pub fn pileup_offdiagonal_binned<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    min_dist: i64,
    max_dist: i64,
    params: &PileupParams,
) -> Result<Vec<Pileup>>
where
    S: Data<Elem = f64> + Sync,
{
    params.validate(square_dim(matrix)?)?;
    let edges = BinEdges::linear(min_dist, max_dist, params.bin_count)?;
    pileup_offdiagonal_exact_bins(matrix, anchors, &edges, params.window_size)
}

/// Off-diagonal pileups over caller-supplied distance bins.
///
/// Every ordered anchor pair `(i, j)` of the full cross product, self
/// pairs included, contributes the window centred on `(i, j)` to the bin
/// containing `j - i`.
pub fn pileup_offdiagonal_exact_bins<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    bin_edges: &BinEdges,
    window_size: usize,
) -> Result<Vec<Pileup>>
where
    S: Data<Elem = f64> + Sync,
{
    check_window_size(window_size, square_dim(matrix)?)?;
    log::debug!(
        "off-diagonal pileup: {} anchors, {} bins, window {}",
        anchors.len(),
        bin_edges.bin_count(),
        window_size
    );

    let sums = accumulate(matrix, anchors, bin_edges, None, window_size)?;
    log::debug!(
        "off-diagonal pileup: {} contributing pairs",
        sums.counts.iter().sum::<usize>()
    );

    Ok(sums
        .matrices
        .into_iter()
        .zip(sums.counts)
        .enumerate()
        .map(|(bin, (matrix, pairs))| {
            log::trace!("bin {}: {} pairs", bin, pairs);
            Pileup {
                distance: bin_edges.midpoint(bin),
                matrix,
                pairs,
            }
        })
        .collect())
}

/// Off-diagonal pileups split by the orientation relationship of each pair.
///
/// Pairs are classified by the orientation of the anchor with the larger
/// coordinate against the one with the smaller coordinate. Orientations
/// are matched to anchors by list position.
pub fn pileup_offdiagonal_oriented<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    orientations: &[Strand],
    bin_edges: &BinEdges,
    window_size: usize,
) -> Result<Vec<OrientedPileup>>
where
    S: Data<Elem = f64> + Sync,
{
    let map = OrientationMap::new(anchors, orientations)?;
    check_window_size(window_size, square_dim(matrix)?)?;
    log::debug!(
        "oriented pileup: {} anchors, {} bins, window {}",
        anchors.len(),
        bin_edges.bin_count(),
        window_size
    );

    let sums = accumulate(matrix, anchors, bin_edges, Some(&map), window_size)?;

    let mut matrices = sums.matrices.into_iter();
    let mut counts = sums.counts.into_iter();
    let mut pileups = Vec::with_capacity(bin_edges.bin_count());

    for bin in 0..bin_edges.bin_count() {
        let bin_matrices: [ContactMatrix; 5] = std::array::from_fn(|_| {
            matrices
                .next()
                .unwrap_or_else(|| Array2::zeros((window_size, window_size)))
        });
        let bin_counts: [usize; 5] = std::array::from_fn(|_| counts.next().unwrap_or(0));
        log::trace!("bin {}: {:?} pairs by category", bin, bin_counts);

        pileups.push(OrientedPileup {
            distance: bin_edges.midpoint(bin),
            matrices: bin_matrices,
            counts: bin_counts,
        });
    }

    Ok(pileups)
}

/// Per-slot sums; slot `bin * width + category` for oriented pileups,
/// slot `bin` otherwise.
struct SlotSums {
    matrices: Vec<ContactMatrix>,
    counts: Vec<usize>,
}

impl SlotSums {
    fn new(slots: usize, window_size: usize) -> Self {
        Self {
            matrices: vec![Array2::zeros((window_size, window_size)); slots],
            counts: vec![0; slots],
        }
    }

    fn add(&mut self, slot: usize, snippet: &ContactMatrix) {
        self.matrices[slot] += snippet;
        self.counts[slot] += 1;
    }

    fn merge(mut self, other: SlotSums) -> Self {
        for (a, b) in self.matrices.iter_mut().zip(&other.matrices) {
            *a += b;
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self
    }
}

/// Fold every binned pair into per-slot sums, one row anchor at a time.
///
/// Pairs are visited row by row in ascending anchor order without being
/// collected first. Only pairs whose distance falls in a bin are extracted.
fn accumulate<S>(
    matrix: &ArrayBase<S, Ix2>,
    anchors: &[usize],
    bin_edges: &BinEdges,
    map: Option<&OrientationMap>,
    window_size: usize,
) -> Result<SlotSums>
where
    S: Data<Elem = f64> + Sync,
{
    let order = canonical_order(anchors);
    let width = if map.is_some() {
        PairCategory::ALL.len()
    } else {
        1
    };
    let all = PairCategory::All.index();

    fold_reduce(
        &order,
        ROW_CHUNK_SIZE,
        || SlotSums::new(bin_edges.bin_count() * width, window_size),
        |mut sums, &row| {
            for &col in &order {
                let Some(bin) = bin_edges.bin_of(col as i64 - row as i64) else {
                    continue;
                };
                let snippet = extract_window(matrix, row, col, window_size)?;
                let base = bin * width;
                match map {
                    Some(map) => {
                        if let Some(category) = map.categorize(row, col) {
                            sums.add(base + category.index(), &snippet);
                        }
                        sums.add(base + all, &snippet);
                    }
                    None => sums.add(base, &snippet),
                }
            }
            Ok(sums)
        },
        SlotSums::merge,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::extract_diagonal;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use serial_test::serial;

    fn test_matrix(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| ((i * 7 + j * 3) % 11) as f64)
    }

    #[test]
    fn test_bin_edges_linear() {
        let edges = BinEdges::linear(0, 10, 3).unwrap();
        assert_eq!(edges.edges(), &[0, 3, 6, 10]);
        assert_eq!(edges.bin_count(), 3);
        assert_eq!(edges.midpoint(0), 1.5);
        assert_eq!(edges.midpoint(2), 8.0);
    }

    #[test]
    fn test_bin_edges_lookup() {
        let edges = BinEdges::new(vec![0, 10, 20, 30]).unwrap();
        assert_eq!(edges.bin_of(-1), None);
        assert_eq!(edges.bin_of(0), Some(0));
        assert_eq!(edges.bin_of(9), Some(0));
        assert_eq!(edges.bin_of(10), Some(1));
        assert_eq!(edges.bin_of(29), Some(2));
        assert_eq!(edges.bin_of(30), None);

        // Repeated edges leave an empty bin
        let edges = BinEdges::new(vec![0, 0, 2]).unwrap();
        assert_eq!(edges.bin_of(0), Some(1));
    }

    #[test]
    fn test_bin_edges_errors() {
        assert!(matches!(
            BinEdges::new(vec![5]),
            Err(ScoreError::InvalidBins(_))
        ));
        assert!(matches!(
            BinEdges::new(vec![0, 10, 5]),
            Err(ScoreError::InvalidBins(_))
        ));
        assert!(BinEdges::linear(10, 10, 2).is_err());
        assert!(BinEdges::linear(0, 10, 0).is_err());
    }

    #[test]
    fn test_pileup_diagonal_sums_windows() {
        let m = test_matrix(30);
        let anchors = [8, 15, 21];
        let pile = pileup_diagonal(&m, &anchors, 6).unwrap();

        let mut expected = Array2::zeros((6, 6));
        for &a in &anchors {
            expected += &extract_diagonal(&m, a, 3).unwrap();
        }
        assert_eq!(pile, expected);
    }

    #[test]
    fn test_pileup_diagonal_odd_window() {
        let m = test_matrix(20);
        let pile = pileup_diagonal(&m, &[10], 5).unwrap();
        assert_eq!(pile.dim(), (5, 5));
        assert_eq!(pile[[2, 2]], m[[10, 10]]);
    }

    /// Non-integer values so that summation order shows up in the result.
    fn random_matrix(n: usize, seed: u64) -> Array2<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        Array2::from_shape_simple_fn((n, n), || rng.gen_range(0.0..1.0) * 1e3)
    }

    fn with_parallel<T>(enabled: bool, f: impl FnOnce() -> T) -> T {
        crate::config::set_parallel(enabled);
        let result = f();
        crate::config::set_parallel(true);
        result
    }

    #[test]
    #[serial]
    fn test_pileup_diagonal_order_invariant() {
        let m = random_matrix(400, 3);
        let mut rng = SmallRng::seed_from_u64(7);
        let mut anchors: Vec<usize> = (0..120).map(|_| rng.gen_range(5..395)).collect();
        let reference = pileup_diagonal(&m, &anchors, 10).unwrap();

        for _ in 0..5 {
            anchors.shuffle(&mut rng);
            assert_eq!(pileup_diagonal(&m, &anchors, 10).unwrap(), reference);
            let sequential = with_parallel(false, || pileup_diagonal(&m, &anchors, 10).unwrap());
            assert_eq!(sequential, reference);
        }
    }

    #[test]
    #[serial]
    fn test_offdiagonal_order_invariant() {
        let m = random_matrix(200, 5);
        let mut anchors: Vec<usize> = (10..190).step_by(7).collect();
        let edges = BinEdges::linear(0, 150, 4).unwrap();
        let reference = pileup_offdiagonal_exact_bins(&m, &anchors, &edges, 8).unwrap();

        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..3 {
            anchors.shuffle(&mut rng);
            assert_eq!(
                pileup_offdiagonal_exact_bins(&m, &anchors, &edges, 8).unwrap(),
                reference
            );
        }
    }

    #[test]
    fn test_pileup_diagonal_fails_fast() {
        let m = test_matrix(30);
        assert!(matches!(
            pileup_diagonal(&m, &[10, 2, 20], 6),
            Err(ScoreError::OutOfBounds { .. })
        ));
        assert!(matches!(
            pileup_diagonal(&m, &[10], 0),
            Err(ScoreError::InvalidGeometry(_))
        ));
        assert!(matches!(
            pileup_diagonal(&m, &[10], 31),
            Err(ScoreError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_pileup_diagonal_empty_anchor_list() {
        let m = test_matrix(30);
        let pile = pileup_diagonal(&m, &[], 4).unwrap();
        assert!(pile.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_offdiagonal_binned() {
        let m = test_matrix(50);
        let anchors = [10, 20, 30];
        let piles = pileup_offdiagonal_binned(&m, &anchors, 0, 30, &PileupParams::new(4, 3)).unwrap();

        assert_eq!(piles.len(), 3);
        assert_eq!(
            piles.iter().map(|p| p.distance).collect::<Vec<_>>(),
            vec![5.0, 15.0, 25.0]
        );
        assert_eq!(
            piles.iter().map(|p| p.pairs).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );

        let window = |r, c| extract_window(&m, r, c, 4).unwrap();
        let self_pairs = window(10, 10) + window(20, 20) + window(30, 30);
        assert_eq!(piles[0].matrix, self_pairs);
        assert_eq!(piles[1].matrix, window(10, 20) + window(20, 30));
        assert_eq!(piles[2].matrix, window(10, 30));
        assert_eq!(piles[2].mean().unwrap(), window(10, 30));
    }

    #[test]
    fn test_offdiagonal_negative_bins_use_lower_triangle() {
        let m = test_matrix(50);
        let edges = BinEdges::new(vec![-10, 0]).unwrap();
        let piles = pileup_offdiagonal_exact_bins(&m, &[10, 20], &edges, 4).unwrap();
        assert_eq!(piles[0].pairs, 1);
        assert_eq!(piles[0].matrix, extract_window(&m, 20, 10, 4).unwrap());
    }

    #[test]
    fn test_offdiagonal_empty_bin() {
        let m = test_matrix(50);
        let edges = BinEdges::new(vec![0, 1, 5, 100]).unwrap();
        let piles = pileup_offdiagonal_exact_bins(&m, &[10, 20], &edges, 4).unwrap();
        assert_eq!(piles[1].pairs, 0);
        assert!(piles[1].mean().is_none());
        assert!(piles[1].matrix.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_offdiagonal_only_binned_pairs_are_extracted() {
        let m = test_matrix(50);
        // Anchor 1 is too close to the edge, but its pairs fall outside the bins
        let edges = BinEdges::new(vec![5, 15]).unwrap();
        let piles = pileup_offdiagonal_exact_bins(&m, &[1, 20, 30], &edges, 6).unwrap();
        assert_eq!(piles[0].pairs, 1);

        // Once a pair with the edge anchor lands in a bin the call fails
        let edges = BinEdges::new(vec![0, 15]).unwrap();
        assert!(matches!(
            pileup_offdiagonal_exact_bins(&m, &[1, 20, 30], &edges, 6),
            Err(ScoreError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_oriented_pileup_categories() {
        let m = test_matrix(50);
        let anchors = [10, 20, 30];
        let strands = Strand::parse_list("+-+").unwrap();
        let edges = BinEdges::new(vec![0, 10, 20, 30]).unwrap();
        let piles = pileup_offdiagonal_oriented(&m, &anchors, &strands, &edges, 4).unwrap();
        let window = |r, c| extract_window(&m, r, c, 4).unwrap();

        // Self pairs are tandem
        assert_eq!(piles[0].count(PairCategory::TandemPlus), 2);
        assert_eq!(piles[0].count(PairCategory::TandemMinus), 1);
        assert_eq!(piles[0].count(PairCategory::All), 3);
        assert_eq!(
            *piles[0].matrix(PairCategory::TandemMinus),
            window(20, 20)
        );

        // (10+, 20-) is divergent, (20-, 30+) convergent
        assert_eq!(piles[1].count(PairCategory::Divergent), 1);
        assert_eq!(piles[1].count(PairCategory::Convergent), 1);
        assert_eq!(*piles[1].matrix(PairCategory::Divergent), window(10, 20));
        assert_eq!(*piles[1].matrix(PairCategory::Convergent), window(20, 30));

        assert_eq!(piles[2].count(PairCategory::TandemPlus), 1);
        assert_eq!(piles[2].count(PairCategory::Convergent), 0);
        assert!(piles[2].mean(PairCategory::Convergent).is_none());
    }

    #[test]
    fn test_oriented_all_is_sum_of_categories() {
        let m = test_matrix(80);
        let anchors = [10, 17, 25, 40, 52, 66];
        let strands = Strand::parse_list("+--++-").unwrap();
        let edges = BinEdges::linear(0, 60, 4).unwrap();
        let piles = pileup_offdiagonal_oriented(&m, &anchors, &strands, &edges, 6).unwrap();
        let plain = pileup_offdiagonal_exact_bins(&m, &anchors, &edges, 6).unwrap();

        for (oriented, unoriented) in piles.iter().zip(&plain) {
            let mut total = Array2::zeros((6, 6));
            let mut count = 0;
            for category in &PairCategory::ALL[..4] {
                total += oriented.matrix(*category);
                count += oriented.count(*category);
            }
            assert_eq!(total, *oriented.matrix(PairCategory::All));
            assert_eq!(count, oriented.count(PairCategory::All));
            assert_eq!(*oriented.matrix(PairCategory::All), unoriented.matrix);
            assert_eq!(count, unoriented.pairs);
        }
    }

    #[test]
    fn test_oriented_validation() {
        let m = test_matrix(50);
        let edges = BinEdges::new(vec![0, 10]).unwrap();
        let strands = Strand::parse_list("+-").unwrap();
        assert!(matches!(
            pileup_offdiagonal_oriented(&m, &[10, 20, 30], &strands, &edges, 4),
            Err(ScoreError::LengthMismatch { .. })
        ));
        assert!(matches!(
            pileup_offdiagonal_oriented(&m, &[10, 10], &strands, &edges, 4),
            Err(ScoreError::AmbiguousOrientation { anchor: 10 })
        ));
    }

    #[test]
    #[serial]
    fn test_offdiagonal_parallel_matches_sequential() {
        let m = random_matrix(300, 11);
        let anchors: Vec<usize> = (20..280).step_by(9).collect();
        let strands: Vec<Strand> = (0..anchors.len())
            .map(|k| if k % 3 == 0 { Strand::Minus } else { Strand::Plus })
            .collect();
        let edges = BinEdges::linear(0, 200, 5).unwrap();

        let parallel = pileup_offdiagonal_exact_bins(&m, &anchors, &edges, 10).unwrap();
        let sequential = with_parallel(false, || {
            pileup_offdiagonal_exact_bins(&m, &anchors, &edges, 10).unwrap()
        });
        assert_eq!(parallel, sequential);

        let parallel = pileup_offdiagonal_oriented(&m, &anchors, &strands, &edges, 10).unwrap();
        let sequential = with_parallel(false, || {
            pileup_offdiagonal_oriented(&m, &anchors, &strands, &edges, 10).unwrap()
        });
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_offdiagonal_binned_params() {
        let m = test_matrix(50);
        assert!(matches!(
            pileup_offdiagonal_binned(&m, &[10, 20], 0, 30, &PileupParams::new(4, 0)),
            Err(ScoreError::InvalidBins(_))
        ));
        assert!(matches!(
            pileup_offdiagonal_binned(&m, &[10, 20], 0, 30, &PileupParams::new(51, 3)),
            Err(ScoreError::InvalidGeometry(_))
        ));
        let piles =
            pileup_offdiagonal_binned(&m, &[10, 20], 0, 30, &PileupParams::default()).unwrap();
        assert_eq!(piles.len(), 5);
        assert_eq!(piles[0].matrix.dim(), (10, 10));
    }
}
