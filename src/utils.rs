/// Splits `data` into consecutive mutable chunks delimited by a CSR offsets
/// array (`offsets.len() == n + 1`, `offsets[n] == data.len()`).
///
/// The returned chunks can be handed to a parallel cell sweep so that every
/// sub-cell slot is written by exactly one unit of work.
pub fn chunks_by_offsets_mut<'a, T>(mut data: &'a mut [T], offsets: &[usize]) -> Vec<&'a mut [T]> {
    let mut chunks = Vec::with_capacity(offsets.len().saturating_sub(1));
    for window in offsets.windows(2) {
        let (chunk, rest) = data.split_at_mut(window[1] - window[0]);
        chunks.push(chunk);
        data = rest;
    }
    chunks
}

/// Previous index on a cyclic list.
pub fn cyclic_prev(i: usize, len: usize) -> usize {
    if i == 0 {
        len - 1
    } else {
        i - 1
    }
}

/// Next index on a cyclic list.
pub fn cyclic_next(i: usize, len: usize) -> usize {
    if i + 1 < len {
        i + 1
    } else {
        0
    }
}
