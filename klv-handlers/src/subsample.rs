//! Decimation of aligned series.
//!
//! Indices are picked at an even stride over `[0, size)` so that the first
//! and last samples always survive:
//!
//! ```text
//! idx(k) = k * (size - 1) / (count - 1),   k = 0 .. count
//! ```
//!
//! With `size > count` the stride is greater than one, so indices are
//! strictly increasing.

/// Sample indices to keep when reducing `size` samples to `count`.
///
/// - `count >= size` keeps everything.
/// - `count == 0` keeps nothing.
/// - `count == 1` keeps only the first sample.
pub fn subsample_indices(size: usize, count: usize) -> Vec<usize> {
    if count >= size {
        return (0..size).collect();
    }

    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..count).map(|k| k * (size - 1) / (count - 1)).collect(),
    }
}
