// src/batch/former.rs
// Splits an ordered input into contiguous fixed-size batches

/// Split `items` into `ceil(len / batch_size)` contiguous batches in input
/// order; the last batch may be shorter. Empty input yields no batches.
///
/// Callers validate `batch_size >= 1` through `BatchSettings::validate`;
/// a zero here is a programming error.
pub fn form_batches<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    assert!(batch_size >= 1, "batch_size must be at least 1");
    items.chunks(batch_size).map(<[T]>::to_vec).collect()
}
