//! Mapping between aligned (gapped) and ungapped sequence coordinates
//!
//! All positions exposed here are 1-based, matching how residues are numbered
//! in the published and predicted epitope tables.

use serde::{Deserialize, Serialize};

use crate::types::GAP;

/// Ungapped index → aligned column lookup.
///
/// Entry `k - 1` holds the aligned column of the `k`-th residue. Entries are
/// strictly increasing and never exceed the aligned length they were built
/// from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateMap(Vec<usize>);

impl CoordinateMap {
    /// Number of ungapped residues covered by the map
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }

    /// Aligned column of the `k`-th ungapped residue
    pub fn aligned_position(&self, k: usize) -> Option<usize> {
        k.checked_sub(1).and_then(|i| self.0.get(i).copied())
    }

    /// Ungapped residue number at an aligned column, `None` on a gap column
    pub fn ungapped_position(&self, column: usize) -> Option<usize> {
        self.0.binary_search(&column).ok().map(|i| i + 1)
    }

    /// Translate an ungapped closed interval into aligned columns
    pub fn aligned_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start > end {
            return None;
        }
        Some((self.aligned_position(start)?, self.aligned_position(end)?))
    }
}

/// Strip gaps from a sequence and record where each residue came from
pub fn ungap(sequence: &[u8]) -> (String, CoordinateMap) {
    let mut ungapped = String::with_capacity(sequence.len());
    let mut map = Vec::with_capacity(sequence.len());
    for (i, &residue) in sequence.iter().enumerate() {
        if residue != GAP {
            ungapped.push(residue as char);
            map.push(i + 1);
        }
    }
    (ungapped, CoordinateMap(map))
}
