//! Parallel accumulation utilities using Rayon.
//!
//! Pileups are folds over independent contributions. Items are split into
//! fixed-size chunks; each chunk is folded in order into a private
//! accumulator and the partial results are merged in chunk order. The
//! association of every floating-point sum is therefore fixed by the
//! input and the chunk size alone, whether or not the chunks run in
//! parallel.

use crate::config;
use crate::error::Result;
use ndarray::Array2;
use rayon::prelude::*;

/// Minimum number of contributions before enabling parallelization.
/// Below this threshold, sequential accumulation is faster due to
/// thread spawn overhead. Also the chunk size of [`sum_matrices`].
pub const PARALLEL_THRESHOLD: usize = 64;

/// Check whether `len` items split into `chunk_size` chunks should be
/// folded in parallel.
#[inline]
pub fn use_parallel(len: usize, chunk_size: usize) -> bool {
    len > chunk_size && config::is_parallel()
}

/// Fold `items` into an accumulator, chunk by chunk.
///
/// `init` creates an empty accumulator, `fold` adds one item and `merge`
/// combines two partial accumulators. Each chunk of `chunk_size` items is
/// folded from a fresh accumulator; partials are merged left to right.
/// The result does not depend on the parallel switch. The first error
/// aborts the whole fold.
pub fn fold_reduce<T, A, I, F, M>(
    items: &[T],
    chunk_size: usize,
    init: I,
    fold: F,
    merge: M,
) -> Result<A>
where
    T: Sync,
    A: Send,
    I: Fn() -> A + Sync + Send,
    F: Fn(A, &T) -> Result<A> + Sync + Send,
    M: Fn(A, A) -> A,
{
    let chunk_size = chunk_size.max(1);
    let fold_chunk = |chunk: &[T]| chunk.iter().try_fold(init(), |acc, item| fold(acc, item));

    let partials: Vec<A> = if use_parallel(items.len(), chunk_size) {
        items
            .par_chunks(chunk_size)
            .map(fold_chunk)
            .collect::<Result<_>>()?
    } else {
        items
            .chunks(chunk_size)
            .map(fold_chunk)
            .collect::<Result<_>>()?
    };

    Ok(partials.into_iter().reduce(merge).unwrap_or_else(init))
}

/// Sum the matrices produced by `f` for every item.
pub fn sum_matrices<T, F>(items: &[T], shape: (usize, usize), f: F) -> Result<Array2<f64>>
where
    T: Sync,
    F: Fn(&T) -> Result<Array2<f64>> + Sync + Send,
{
    fold_reduce(
        items,
        PARALLEL_THRESHOLD,
        || Array2::zeros(shape),
        |mut acc, item| {
            acc += &f(item)?;
            Ok(acc)
        },
        |mut a, b| {
            a += &b;
            a
        },
    )
}
