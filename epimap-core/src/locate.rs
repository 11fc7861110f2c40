//! Peptide placement on the ungapped consensus

/// 1-based closed interval of a peptide within the consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeptideLocation {
    pub start: usize,
    pub end: usize,
    /// The peptide also occurs elsewhere; `start` is the first occurrence
    pub ambiguous: bool,
}

/// Locate `peptide` in `consensus` by first exact match.
///
/// Short or low-complexity peptides can match several places; only the first
/// is reported and the location is flagged as ambiguous.
pub fn locate_peptide(consensus: &str, peptide: &str) -> Option<PeptideLocation> {
    if peptide.is_empty() {
        return None;
    }
    let offset = consensus.find(peptide)?;
    // Overlapping repeats count too, so search from the next byte
    let ambiguous = consensus[offset + 1..].contains(peptide);
    Some(PeptideLocation {
        start: offset + 1,
        end: offset + peptide.len(),
        ambiguous,
    })
}
