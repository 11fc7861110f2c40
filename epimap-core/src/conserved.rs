//! Runs of fully conserved alignment columns

use crate::types::ConservedRegion;

/// Maximal runs of `true` at least `min_length` long, in 1-based columns
pub fn find_conserved_runs(is_conserved: &[bool], min_length: usize) -> Vec<ConservedRegion> {
    let mut regions = Vec::new();
    let mut i = 0;
    while i < is_conserved.len() {
        if !is_conserved[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < is_conserved.len() && is_conserved[i] {
            i += 1;
        }
        let length = i - start;
        if length >= min_length.max(1) {
            regions.push(ConservedRegion::new(start + 1, length));
        }
    }
    regions
}

/// Without an alignment the whole sequence counts as one conserved region
pub fn whole_sequence_region(length: usize, min_length: usize) -> Vec<ConservedRegion> {
    if length > 0 && length >= min_length {
        vec![ConservedRegion::new(1, length)]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_respect_minimum() {
        let flags = [true, true, false, true, true, true, false, true];
        let regions = find_conserved_runs(&flags, 2);
        assert_eq!(
            regions,
            vec![ConservedRegion::new(1, 2), ConservedRegion::new(4, 3)]
        );
    }

    #[test]
    fn test_run_reaching_the_end() {
        let regions = find_conserved_runs(&[false, true, true, true], 3);
        assert_eq!(regions, vec![ConservedRegion::new(2, 3)]);
        assert_eq!(regions[0].end(), 4);
    }

    #[test]
    fn test_no_runs() {
        assert!(find_conserved_runs(&[], 1).is_empty());
        assert!(find_conserved_runs(&[false; 5], 1).is_empty());
        assert!(find_conserved_runs(&[true, false, true], 2).is_empty());
    }

    #[test]
    fn test_regions_ordered_and_disjoint() {
        let flags: Vec<bool> = (0..100).map(|i| i % 7 != 0).collect();
        let regions = find_conserved_runs(&flags, 3);
        for pair in regions.windows(2) {
            assert!(pair[0].end() < pair[1].aln_start);
        }
        assert!(regions.iter().all(|r| r.aln_length >= 3));
    }

    #[test]
    fn test_whole_sequence_region() {
        assert_eq!(whole_sequence_region(120, 100), vec![ConservedRegion::new(1, 120)]);
        assert!(whole_sequence_region(120, 150).is_empty());
        assert!(whole_sequence_region(0, 0).is_empty());
    }
}
