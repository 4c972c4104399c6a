//! Id remapping helpers used alongside subgraph extraction.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::types::{Result, StrataError, VertexId, MISSING_ID};

/// Index of each `query` id within `parent_ids`, or `-1` when absent.
///
/// Duplicate parent ids resolve to their first position. Sorted parents are
/// searched by bisection, unsorted ones through a hash index.
pub fn map_parent_id_to_subgraph_id(parent_ids: &[VertexId], query: &[VertexId]) -> Vec<i64> {
    if parent_ids.windows(2).all(|w| w[0] <= w[1]) {
        query
            .par_iter()
            .map(|id| {
                let pos = parent_ids.partition_point(|p| p < id);
                match parent_ids.get(pos) {
                    Some(found) if found == id => pos as i64,
                    _ => MISSING_ID,
                }
            })
            .collect()
    } else {
        let mut index: FxHashMap<VertexId, i64> = FxHashMap::default();
        for (i, &id) in parent_ids.iter().enumerate() {
            index.entry(id).or_insert(i as i64);
        }
        query
            .par_iter()
            .map(|id| index.get(id).copied().unwrap_or(MISSING_ID))
            .collect()
    }
}

/// Repeats `ids[i]` `offsets[i + 1] - offsets[i]` times.
///
/// `offsets` starts at 0, is non-decreasing and holds one more entry than
/// `ids`.
pub fn expand_ids(ids: &[VertexId], offsets: &[u64]) -> Result<Vec<VertexId>> {
    if offsets.len() != ids.len() + 1 {
        return Err(StrataError::Precondition(format!(
            "{} offsets for {} ids, expected {}",
            offsets.len(),
            ids.len(),
            ids.len() + 1
        )));
    }
    if offsets[0] != 0 || offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(StrataError::Precondition(
            "offsets must start at 0 and be non-decreasing".into(),
        ));
    }
    let mut out = Vec::with_capacity(offsets[ids.len()] as usize);
    for (i, &id) in ids.iter().enumerate() {
        let run = (offsets[i + 1] - offsets[i]) as usize;
        out.extend(std::iter::repeat(id).take(run));
    }
    Ok(out)
}
