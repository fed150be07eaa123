//! Pileups over randomized contact maps.
//!
//! Sums are folded in ascending anchor order over fixed chunks, so they
//! are bit-identical across anchor permutations and parallel modes.
//!
//! Note: Tests are run serially to avoid global config race conditions.

use chromoscores::config;
use chromoscores::prelude::*;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::seq::index::sample;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serial_test::serial;

/// Symmetric map with distance decay plus noise.
fn random_map(n: usize, seed: u64) -> ContactMatrix {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut m = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let v = 100.0 / (1.0 + (j - i) as f64) * rng.gen_range(0.5..1.5);
            m[[i, j]] = v;
            m[[j, i]] = v;
        }
    }
    m
}

/// Distinct sorted anchors in `lo..hi`.
fn random_anchors(count: usize, lo: usize, hi: usize, seed: u64) -> Vec<usize> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut anchors: Vec<usize> = sample(&mut rng, hi - lo, count)
        .into_iter()
        .map(|i| i + lo)
        .collect();
    anchors.sort_unstable();
    anchors
}

fn random_strands(count: usize, seed: u64) -> Vec<Strand> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            if rng.gen_bool(0.5) {
                Strand::Plus
            } else {
                Strand::Minus
            }
        })
        .collect()
}

fn reset_config() {
    config::set_parallel(true);
}

// =============================================================================
// Parallel vs sequential
// =============================================================================

#[test]
#[serial]
fn test_diagonal_pileup_parallel_matches_sequential() {
    reset_config();
    let matrix = random_map(300, 1);
    let anchors = random_anchors(200, 20, 280, 2);

    let parallel = pileup_diagonal(&matrix, &anchors, 21).unwrap();
    config::set_parallel(false);
    let sequential = pileup_diagonal(&matrix, &anchors, 21).unwrap();
    reset_config();

    assert_eq!(parallel, sequential);
}

#[test]
#[serial]
fn test_offdiagonal_pileup_parallel_matches_sequential() {
    reset_config();
    let matrix = random_map(200, 3);
    let anchors = random_anchors(40, 10, 190, 4);

    let params = PileupParams::new(10, 6);

    let parallel = pileup_offdiagonal_binned(&matrix, &anchors, 0, 150, &params).unwrap();
    config::set_parallel(false);
    let sequential = pileup_offdiagonal_binned(&matrix, &anchors, 0, 150, &params).unwrap();
    reset_config();

    assert_eq!(parallel.len(), 6);
    assert_eq!(parallel, sequential);
}

#[test]
#[serial]
fn test_diagonal_pileup_ignores_anchor_order() {
    reset_config();
    let mut rng = SmallRng::seed_from_u64(12);
    let matrix = Array2::from_shape_simple_fn((400, 400), || rng.gen_range(0.0..1.0) * 1e3);
    let mut anchors: Vec<usize> = (0..120).map(|_| rng.gen_range(5..395)).collect();
    let reference = pileup_diagonal(&matrix, &anchors, 10).unwrap();

    for _ in 0..5 {
        anchors.shuffle(&mut rng);
        assert_eq!(pileup_diagonal(&matrix, &anchors, 10).unwrap(), reference);

        config::set_parallel(false);
        let sequential = pileup_diagonal(&matrix, &anchors, 10).unwrap();
        reset_config();
        assert_eq!(sequential, reference);
    }
}

#[test]
#[serial]
fn test_sequential_pileup_is_reproducible() {
    config::set_parallel(false);
    let matrix = random_map(150, 5);
    let anchors = random_anchors(120, 10, 140, 6);

    let first = pileup_diagonal(&matrix, &anchors, 16).unwrap();
    let second = pileup_diagonal(&matrix, &anchors, 16).unwrap();
    reset_config();

    assert_eq!(first, second);
}

// =============================================================================
// Orientation
// =============================================================================

#[test]
#[serial]
fn test_oriented_all_matches_unoriented() {
    reset_config();
    let matrix = random_map(200, 7);
    let anchors = random_anchors(30, 10, 190, 8);
    let strands = random_strands(anchors.len(), 9);
    let edges = BinEdges::new(vec![0, 25, 60, 120, 180]).unwrap();

    let oriented = pileup_offdiagonal_oriented(&matrix, &anchors, &strands, &edges, 8).unwrap();
    let plain = pileup_offdiagonal_exact_bins(&matrix, &anchors, &edges, 8).unwrap();

    for (o, p) in oriented.iter().zip(&plain) {
        assert_eq!(o.count(PairCategory::All), p.pairs);
        let by_category: usize = [
            PairCategory::Convergent,
            PairCategory::Divergent,
            PairCategory::TandemPlus,
            PairCategory::TandemMinus,
        ]
        .iter()
        .map(|&c| o.count(c))
        .sum();
        assert_eq!(by_category, p.pairs);

        assert_eq!(*o.matrix(PairCategory::All), p.matrix);
    }
}

#[test]
fn test_oriented_three_anchor_categories() {
    let matrix = random_map(50, 10);
    let strands = Strand::parse_list("+-+").unwrap();
    let edges = BinEdges::new(vec![0, 10, 20, 30]).unwrap();

    let piles =
        pileup_offdiagonal_oriented(&matrix, &[10, 20, 30], &strands, &edges, 6).unwrap();

    // Self pairs are tandem
    assert_eq!(piles[0].count(PairCategory::TandemPlus), 2);
    assert_eq!(piles[0].count(PairCategory::TandemMinus), 1);
    // 10(+) with 20(-) diverges, 20(-) with 30(+) converges
    assert_eq!(piles[1].count(PairCategory::Divergent), 1);
    assert_eq!(piles[1].count(PairCategory::Convergent), 1);
    assert_eq!(piles[2].count(PairCategory::TandemPlus), 1);
    assert!(piles[2].mean(PairCategory::Convergent).is_none());
}
