//! The position module holds the [Position] trait and its implementation for
//! generalized indices.

/// The [Position] trait describes the location of a claim within a fixed-depth
/// binary game tree as a "Generalized Index": `2^{depth} + index_at_depth`.
///
/// Valid positions are generalized indices of at least 1; the root of the tree
/// sits at gindex 1.
pub trait Position {
    /// Returns the depth of the [Position] within the tree.
    fn depth(&self) -> u64;
    /// Returns the index at depth of the [Position] within the tree.
    fn index_at_depth(&self) -> u64;
    /// Returns `true` if the [Position] is the root of the tree.
    fn is_root(&self) -> bool;
    /// Returns the left child [Position] relative to the current [Position].
    fn left(&self) -> Self;
    /// Returns the right child [Position] relative to the current [Position].
    fn right(&self) -> Self;
    /// Returns the parent [Position] relative to the current [Position].
    fn parent(&self) -> Self;
    /// Returns the rightmost [Position] at `max_depth` that commits to the same
    /// trace index as the current [Position].
    fn right_index(&self, max_depth: u64) -> Self;
    /// Returns the trace index that the current [Position] commits to.
    fn trace_index(&self, max_depth: u64) -> u64;
    /// Returns the relative [Position] of an attack or defense move against the
    /// current [Position].
    fn make_move(&self, is_attack: bool) -> Self;
    /// Returns the [Position] of an attack move against the current [Position].
    /// Attacking disputes the first half of the trace range the claim commits to.
    fn attack(&self) -> Self;
    /// Returns the [Position] of a defense move against the current [Position].
    /// Defending asserts that the trace extends beyond the claim's commitment.
    fn defend(&self) -> Self;
}

/// Computes a generalized index from a depth and index at depth.
///
/// ### Takes
/// - `depth`: The depth of the generalized index.
/// - `index_at_depth`: The index at depth of the generalized index.
///
/// ### Returns
/// - `u128`: The generalized index: `2^{depth} + index_at_depth`.
pub fn compute_gindex(depth: u64, index_at_depth: u64) -> u128 {
    2u128.pow(depth as u32) + index_at_depth as u128
}

/// Implementation of the [Position] trait for the [std::u128] primitive type.
impl Position for u128 {
    fn depth(&self) -> u64 {
        127 - self.leading_zeros() as u64
    }

    fn index_at_depth(&self) -> u64 {
        (self - (1 << self.depth())) as u64
    }

    fn is_root(&self) -> bool {
        self.depth() == 0
    }

    fn left(&self) -> Self {
        self << 1
    }

    fn right(&self) -> Self {
        self.left() | 1
    }

    fn parent(&self) -> Self {
        self >> 1
    }

    fn right_index(&self, max_depth: u64) -> Self {
        let remaining = max_depth - self.depth();
        (self << remaining) | ((1 << remaining) - 1)
    }

    fn trace_index(&self, max_depth: u64) -> u64 {
        self.right_index(max_depth).index_at_depth()
    }

    fn make_move(&self, is_attack: bool) -> Self {
        ((!is_attack as u128) | self) << 1
    }

    fn attack(&self) -> Self {
        self.make_move(true)
    }

    fn defend(&self) -> Self {
        self.make_move(false)
    }
}

#[cfg(test)]
mod test {
    use super::{compute_gindex, Position};

    const MAX_DEPTH: u64 = 4;

    /// Static expectations for every position in a depth 4 tree, keyed by
    /// gindex - 1. Columns: depth, index at depth, right index, trace index.
    const EXPECTED_VALUES: &[(u64, u64, u128, u64)] = &[
        (0, 0, 31, 15),
        (1, 0, 23, 7),
        (1, 1, 31, 15),
        (2, 0, 19, 3),
        (2, 1, 23, 7),
        (2, 2, 27, 11),
        (2, 3, 31, 15),
        (3, 0, 17, 1),
        (3, 1, 19, 3),
        (3, 2, 21, 5),
        (3, 3, 23, 7),
        (3, 4, 25, 9),
        (3, 5, 27, 11),
        (3, 6, 29, 13),
        (3, 7, 31, 15),
        (4, 0, 16, 0),
        (4, 1, 17, 1),
        (4, 2, 18, 2),
        (4, 3, 19, 3),
        (4, 4, 20, 4),
        (4, 5, 21, 5),
        (4, 6, 22, 6),
        (4, 7, 23, 7),
        (4, 8, 24, 8),
        (4, 9, 25, 9),
        (4, 10, 26, 10),
        (4, 11, 27, 11),
        (4, 12, 28, 12),
        (4, 13, 29, 13),
        (4, 14, 30, 14),
        (4, 15, 31, 15),
    ];

    #[test]
    fn position_correctness_static() {
        for (p, (depth, index_at_depth, right_index, trace_index)) in
            EXPECTED_VALUES.iter().enumerate()
        {
            let pos = (p + 1) as u128;
            assert_eq!(pos.depth(), *depth);
            assert_eq!(pos.index_at_depth(), *index_at_depth);
            let r = pos.right_index(MAX_DEPTH);
            assert_eq!(r, *right_index);
            assert_eq!(r.index_at_depth(), *trace_index);
            assert_eq!(pos.trace_index(MAX_DEPTH), *trace_index);
        }
    }

    #[test]
    fn gindex_round_trip() {
        for gindex in 1u128..1024 {
            assert_eq!(compute_gindex(gindex.depth(), gindex.index_at_depth()), gindex);
        }
    }

    #[test]
    fn only_the_first_gindex_is_root() {
        assert!(1u128.is_root());
        for gindex in 2u128..(1 << (MAX_DEPTH + 1)) {
            assert!(!gindex.is_root());
        }
    }

    #[test]
    fn child_positions_relative_to_parent() {
        for gindex in 1u128..(1 << MAX_DEPTH) {
            assert_eq!(gindex.left(), gindex << 1);
            assert_eq!(gindex.right(), (gindex << 1) | 1);
            assert_eq!(gindex.left().parent(), gindex);
            assert_eq!(gindex.right().parent(), gindex);
            assert_eq!(gindex.left().depth(), gindex.depth() + 1);
        }
    }

    #[test]
    fn move_targets() {
        for gindex in 1u128..(1 << MAX_DEPTH) {
            assert_eq!(gindex.attack(), gindex.make_move(true));
            assert_eq!(gindex.defend(), gindex.make_move(false));
            assert_eq!(gindex.attack(), gindex.left());
            assert_eq!(gindex.defend(), (gindex | 1) << 1);
            assert_eq!(gindex.attack().parent(), gindex);
            assert_eq!(gindex.attack().depth(), gindex.depth() + 1);
            assert_eq!(gindex.defend().depth(), gindex.depth() + 1);
        }
    }

    #[test]
    fn attack_narrows_toward_disagreement() {
        // An attack commits to a strictly earlier trace index than the claim it counters.
        for gindex in 1u128..(1 << MAX_DEPTH) {
            assert!(gindex.attack().trace_index(MAX_DEPTH) < gindex.trace_index(MAX_DEPTH));
        }
    }

    #[test]
    fn defend_extends_agreement() {
        // Defending a left child claim commits to a strictly later trace index.
        for gindex in (2u128..(1 << MAX_DEPTH)).step_by(2) {
            assert!(gindex.defend().trace_index(MAX_DEPTH) > gindex.trace_index(MAX_DEPTH));
        }
    }

    #[test]
    fn leaf_positions_commit_to_themselves() {
        for index in 0..(1 << MAX_DEPTH) {
            let pos = compute_gindex(MAX_DEPTH, index);
            assert_eq!(pos.right_index(MAX_DEPTH), pos);
            assert_eq!(pos.trace_index(MAX_DEPTH), index);
        }
    }
}
