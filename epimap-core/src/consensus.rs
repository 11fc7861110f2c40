//! Majority-rule consensus over an aligned matrix
//!
//! Ties are broken by first appearance: residues are tallied in the order
//! they are met scanning the column top to bottom, and a later residue only
//! wins with a strictly higher count. The output is therefore a pure
//! function of the matrix, independent of any hashing.

use crate::coords::{ungap, CoordinateMap};
use crate::types::{AlignedMatrix, GAP};

/// Per-column majority residue; all-gap columns yield the gap symbol
pub fn build_consensus(matrix: &AlignedMatrix) -> Vec<u8> {
    (0..matrix.len())
        .map(|col| column_majority(matrix.column(col)))
        .collect()
}

fn column_majority(column: impl Iterator<Item = u8>) -> u8 {
    // Small alphabet, so a linear tally keeps first-seen order for free
    let mut tally: Vec<(u8, usize)> = Vec::new();
    for residue in column.filter(|&r| r != GAP) {
        match tally.iter_mut().find(|(r, _)| *r == residue) {
            Some((_, count)) => *count += 1,
            None => tally.push((residue, 1)),
        }
    }

    let mut best: Option<(u8, usize)> = None;
    for (residue, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((residue, count));
        }
    }
    best.map_or(GAP, |(residue, _)| residue)
}

/// Ungapped consensus string and its coordinate map back into the alignment
pub fn ungapped_consensus(consensus: &[u8]) -> (String, CoordinateMap) {
    ungap(consensus)
}

/// Column-wise full-conservation predicate.
///
/// A column is conserved when no row has a gap there and every row carries
/// the same residue.
pub fn conserved_columns(matrix: &AlignedMatrix) -> Vec<bool> {
    (0..matrix.len())
        .map(|col| {
            let mut residues = matrix.column(col);
            match residues.next() {
                Some(first) if first != GAP => residues.all(|r| r == first),
                _ => false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&str]) -> AlignedMatrix {
        AlignedMatrix::from_strings(rows).unwrap()
    }

    #[test]
    fn test_majority_per_column() {
        let m = matrix(&["MKVL", "MKIL", "MRIL"]);
        assert_eq!(build_consensus(&m), b"MKIL".to_vec());
    }

    #[test]
    fn test_gaps_do_not_vote() {
        let m = matrix(&["M-V", "--V", "-A-"]);
        assert_eq!(build_consensus(&m), b"MAV".to_vec());
    }

    #[test]
    fn test_all_gap_column() {
        let m = matrix(&["M-K", "M-K"]);
        let consensus = build_consensus(&m);
        assert_eq!(consensus[1], GAP);
        assert!(!conserved_columns(&m)[1]);
    }

    #[test]
    fn test_tie_broken_by_first_seen() {
        // Column 0: A then C, one each; column 1: C, A, A, C
        let m = matrix(&["AC", "CA", "-A", "-C"]);
        assert_eq!(build_consensus(&m), b"AC".to_vec());

        // Reversing row order flips the winner
        let m = matrix(&["-C", "-A", "CA", "AC"]);
        assert_eq!(build_consensus(&m), b"CC".to_vec());
    }

    #[test]
    fn test_higher_count_beats_first_seen() {
        let m = matrix(&["W", "Y", "Y"]);
        assert_eq!(build_consensus(&m), b"Y".to_vec());
    }

    #[test]
    fn test_consensus_is_deterministic() {
        let m = matrix(&["ACDE-FG", "CADEFG-", "ACEDFGG", "CAEDF-G"]);
        let first = build_consensus(&m);
        for _ in 0..50 {
            assert_eq!(build_consensus(&m), first);
        }
    }

    #[test]
    fn test_conserved_columns() {
        let m = matrix(&["MKV-L", "MRV-L", "MKVAL"]);
        assert_eq!(conserved_columns(&m), vec![true, false, true, false, true]);
    }

    #[test]
    fn test_partial_gap_column_not_conserved() {
        let m = matrix(&["A", "-", "A"]);
        assert_eq!(conserved_columns(&m), vec![false]);
    }

    #[test]
    fn test_ungapped_consensus_map() {
        let (ungapped, map) = ungapped_consensus(b"M-K-V");
        assert_eq!(ungapped, "MKV");
        assert_eq!(map.as_slice(), &[1, 3, 5]);
    }
}
