use crate::header::Rank;

/// Elementwise reduction operator over unsigned byte arrays.
/// `Sum`/`Prod` wrap modulo 256 rather than promoting to a wider type: every
/// payload in this crate is a plain `u8` array. `Noop` is the
/// synchronization-only operator used by
/// `Barrier`/`Bcast`'s zero-byte Collect phase, where no payload folding ever
/// happens regardless of which operator is nominally in effect.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operator {
    Max,
    Min,
    Sum,
    Prod,
    Noop,
}

/// Fold `src` into `dst` elementwise under `op`. Both slices must be the
/// same length (the collective machinery only ever calls this with two
/// same-sized working buffers).
#[inline]
pub fn fold_payload(dst: &mut [u8], src: &[u8], op: Operator) {
    debug_assert_eq!(dst.len(), src.len());
    match op {
        Operator::Max => {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = (*d).max(*s);
            }
        }
        Operator::Min => {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = (*d).min(*s);
            }
        }
        Operator::Sum => {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = d.wrapping_add(*s);
            }
        }
        Operator::Prod => {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = d.wrapping_mul(*s);
            }
        }
        Operator::Noop => {}
    }
}

/// All three collectives rotate ranks so `root` becomes logical position 1
/// (1-indexed) and arrange them in a binary heap with fanout 2. These three
/// functions are the only place that arithmetic lives.
#[inline]
fn logical_position(rank: Rank, root: Rank, size: u32) -> i64 {
    let size = size as i64;
    ((size + rank.0 as i64 - root.0 as i64) % size) + 1
}

#[inline]
fn rank_at_logical(position: i64, root: Rank, size: u32) -> Rank {
    let size = size as i64;
    Rank((((position - 1 + root.0 as i64) % size) + size) as u32 % size as u32)
}

/// `None` at the tree root (logical position 1).
pub fn parent_of(rank: Rank, root: Rank, size: u32) -> Option<Rank> {
    let position = logical_position(rank, root, size);
    if position == 1 {
        None
    } else {
        Some(rank_at_logical(position / 2, root, size))
    }
}

/// Up to two children, in fixed order, skipping logical positions beyond
/// `size`.
pub fn children_of(rank: Rank, root: Rank, size: u32) -> Vec<Rank> {
    let position = logical_position(rank, root, size);
    (0..2i64)
        .map(|k| position * 2 + k)
        .filter(|&child| child <= size as i64)
        .map(|child| rank_at_logical(child, root, size))
        .collect()
}
