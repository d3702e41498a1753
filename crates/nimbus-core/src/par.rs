//! Chunked fill with a per-chunk reduction.
//!
//! With the `threading` feature the chunks run on the rayon pool; without it
//! the same closure runs sequentially. Chunks never see each other's output,
//! only the shared read-only tables captured by `fill`.

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Fill `data` in chunks of `chunk_len` elements and fold the per-chunk
/// results with `reduce`, starting from `identity`.
///
/// `fill` receives the chunk index and the mutable chunk.
#[cfg(feature = "threading")]
pub(crate) fn fill_chunks<T, R, F, G>(
    data: &mut [T],
    chunk_len: usize,
    identity: R,
    fill: F,
    reduce: G,
) -> R
where
    T: Send,
    R: Copy + Send + Sync,
    F: Fn(usize, &mut [T]) -> R + Send + Sync,
    G: Fn(R, R) -> R + Send + Sync,
{
    debug_assert!(chunk_len > 0);
    data.par_chunks_mut(chunk_len)
        .enumerate()
        .map(|(i, chunk)| fill(i, chunk))
        .reduce(|| identity, &reduce)
}

#[cfg(not(feature = "threading"))]
pub(crate) fn fill_chunks<T, R, F, G>(
    data: &mut [T],
    chunk_len: usize,
    identity: R,
    fill: F,
    reduce: G,
) -> R
where
    T: Send,
    R: Copy + Send + Sync,
    F: Fn(usize, &mut [T]) -> R + Send + Sync,
    G: Fn(R, R) -> R + Send + Sync,
{
    debug_assert!(chunk_len > 0);
    data.chunks_mut(chunk_len)
        .enumerate()
        .map(|(i, chunk)| fill(i, chunk))
        .fold(identity, &reduce)
}
