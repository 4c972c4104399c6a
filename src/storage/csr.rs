//! Compressed sparse row adjacency arrays.
//!
//! A [`Csr`] stores one direction of a graph: row `v` spans
//! `indices[indptr[v]..indptr[v + 1]]`, and `edge_ids` carries the original
//! edge identifier at each position.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::types::{EdgeId, Result, StrataError, VertexId};

/// Row-compressed adjacency with per-position edge ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Csr {
    indptr: Vec<u64>,
    indices: Vec<VertexId>,
    edge_ids: Vec<EdgeId>,
    sorted: bool,
}

/// Parallel `src`/`dst`/`id` arrays describing a set of edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeArray {
    /// Source vertex of each edge.
    pub src: Vec<VertexId>,
    /// Destination vertex of each edge.
    pub dst: Vec<VertexId>,
    /// Edge id of each edge.
    pub id: Vec<EdgeId>,
}

impl EdgeArray {
    /// Number of edges held.
    pub fn len(&self) -> usize {
        self.id.len()
    }

    /// Returns true when no edges are held.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    pub(crate) fn push(&mut self, src: VertexId, dst: VertexId, id: EdgeId) {
        self.src.push(src);
        self.dst.push(dst);
        self.id.push(id);
    }
}

impl Csr {
    /// Adopts the given arrays after validating their shape.
    ///
    /// `indptr` must start at 0, be non-decreasing and end at `indices.len()`;
    /// `edge_ids` must have the same length as `indices`, and every neighbor
    /// must be a valid row id.
    pub fn new(indptr: Vec<u64>, indices: Vec<VertexId>, edge_ids: Vec<EdgeId>) -> Result<Self> {
        validate_arrays(&indptr, &indices, &edge_ids)?;
        let sorted = rows_sorted(&indptr, &indices);
        Ok(Self {
            indptr,
            indices,
            edge_ids,
            sorted,
        })
    }

    /// Buckets COO edges by their `rows` endpoint.
    ///
    /// Edge ids default to the COO position `0..E`. Within a row, edges keep
    /// their COO order.
    pub fn from_coo(
        num_vertices: u64,
        rows: &[VertexId],
        cols: &[VertexId],
        edge_ids: Option<&[EdgeId]>,
    ) -> Result<Self> {
        if rows.len() != cols.len() {
            return Err(StrataError::Construction(format!(
                "COO length mismatch: {} sources vs {} destinations",
                rows.len(),
                cols.len()
            )));
        }
        if let Some(ids) = edge_ids {
            if ids.len() != rows.len() {
                return Err(StrataError::Construction(format!(
                    "COO edge id count {} does not match edge count {}",
                    ids.len(),
                    rows.len()
                )));
            }
        }
        let n = usize::try_from(num_vertices)
            .map_err(|_| StrataError::Construction("vertex count exceeds usize".into()))?;
        for (&r, &c) in rows.iter().zip(cols) {
            if r >= num_vertices || c >= num_vertices {
                return Err(StrataError::Construction(format!(
                    "edge ({r}, {c}) references a vertex outside 0..{num_vertices}"
                )));
            }
        }

        Ok(bucket(n, rows, cols, |pos| match edge_ids {
            Some(given) => given[pos],
            None => pos as EdgeId,
        }))
    }

    /// Number of rows.
    pub fn num_vertices(&self) -> u64 {
        (self.indptr.len() - 1) as u64
    }

    /// Number of stored edges.
    pub fn num_edges(&self) -> u64 {
        self.indices.len() as u64
    }

    /// Row offsets.
    pub fn indptr(&self) -> &[u64] {
        &self.indptr
    }

    /// Neighbor ids, row by row.
    pub fn indices(&self) -> &[VertexId] {
        &self.indices
    }

    /// Edge ids aligned with [`Csr::indices`].
    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    /// Whether every row's indices are ascending.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Neighbors and edge ids of row `v`. The caller checks `v` is in range.
    pub fn row(&self, v: VertexId) -> (&[VertexId], &[EdgeId]) {
        let start = self.indptr[v as usize] as usize;
        let end = self.indptr[v as usize + 1] as usize;
        (&self.indices[start..end], &self.edge_ids[start..end])
    }

    /// Length of row `v`.
    pub fn degree(&self, v: VertexId) -> u64 {
        self.indptr[v as usize + 1] - self.indptr[v as usize]
    }

    /// Edge ids in row `row` whose neighbor equals `col`.
    pub fn find(&self, row: VertexId, col: VertexId) -> Vec<EdgeId> {
        let (cols, ids) = self.row(row);
        if self.sorted {
            let lo = cols.partition_point(|&c| c < col);
            let hi = cols.partition_point(|&c| c <= col);
            ids[lo..hi].to_vec()
        } else {
            cols.iter()
                .zip(ids)
                .filter(|(&c, _)| c == col)
                .map(|(_, &id)| id)
                .collect()
        }
    }

    /// True when some row holds the same neighbor twice.
    pub fn has_duplicate(&self) -> bool {
        let mut seen = FxHashSet::default();
        for v in 0..self.num_vertices() {
            seen.clear();
            let (cols, _) = self.row(v);
            for &c in cols {
                if !seen.insert(c) {
                    return true;
                }
            }
        }
        false
    }

    /// Sorts every row ascending, permuting edge ids in lock-step. Idempotent.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let mut pairs: Vec<(VertexId, EdgeId)> = Vec::new();
        for v in 0..self.indptr.len() - 1 {
            let start = self.indptr[v] as usize;
            let end = self.indptr[v + 1] as usize;
            pairs.clear();
            pairs.extend(
                self.indices[start..end]
                    .iter()
                    .copied()
                    .zip(self.edge_ids[start..end].iter().copied()),
            );
            pairs.sort_unstable();
            for (offset, (c, id)) in pairs.iter().enumerate() {
                self.indices[start + offset] = *c;
                self.edge_ids[start + offset] = *id;
            }
        }
        self.sorted = true;
        debug!(edges = self.indices.len(), "graph.csr.sorted");
    }

    /// Builds the opposite direction. Edge ids travel with their edges.
    pub fn transpose(&self) -> Csr {
        let (rows, cols, ids) = self.to_coo();
        bucket(self.indptr.len() - 1, &cols, &rows, |pos| ids[pos])
    }

    /// Expands to `(row, col, edge_id)` triples in row-major order.
    pub fn to_coo(&self) -> (Vec<VertexId>, Vec<VertexId>, Vec<EdgeId>) {
        let mut rows = Vec::with_capacity(self.indices.len());
        for v in 0..self.num_vertices() {
            let deg = self.degree(v) as usize;
            rows.extend(std::iter::repeat(v).take(deg));
        }
        (rows, self.indices.clone(), self.edge_ids.clone())
    }

    /// Induced sub-CSR on `vids`, keeping only neighbors inside the set.
    ///
    /// Local ids follow the order of `vids`. Returns the sub-CSR with fresh
    /// sequential edge ids and the parent edge id of each kept edge.
    pub fn vertex_subgraph(&self, vids: &[VertexId]) -> Result<(Csr, Vec<EdgeId>)> {
        let mut local: FxHashMap<VertexId, u64> = FxHashMap::default();
        for (i, &v) in vids.iter().enumerate() {
            if v >= self.num_vertices() {
                return Err(StrataError::Query(format!(
                    "vertex {v} out of range 0..{}",
                    self.num_vertices()
                )));
            }
            if local.insert(v, i as u64).is_some() {
                return Err(StrataError::Precondition(format!(
                    "vertex {v} listed twice in subgraph selection"
                )));
            }
        }
        let mut indptr = Vec::with_capacity(vids.len() + 1);
        indptr.push(0u64);
        let mut indices = Vec::new();
        let mut induced = Vec::new();
        for &v in vids {
            let (cols, ids) = self.row(v);
            for (&c, &id) in cols.iter().zip(ids) {
                if let Some(&lc) = local.get(&c) {
                    indices.push(lc);
                    induced.push(id);
                }
            }
            indptr.push(indices.len() as u64);
        }
        let edge_ids = (0..indices.len() as u64).collect();
        let sorted = rows_sorted(&indptr, &indices);
        Ok((
            Csr {
                indptr,
                indices,
                edge_ids,
                sorted,
            },
            induced,
        ))
    }
}

/// Counting-sort `rows`/`cols` into CSR form. Inputs must already be in range.
fn bucket(
    n: usize,
    rows: &[VertexId],
    cols: &[VertexId],
    edge_id_at: impl Fn(usize) -> EdgeId,
) -> Csr {
    let mut indptr = vec![0u64; n + 1];
    for &r in rows {
        indptr[r as usize + 1] += 1;
    }
    for i in 0..n {
        indptr[i + 1] += indptr[i];
    }
    let mut cursor: Vec<u64> = indptr[..n].to_vec();
    let mut indices = vec![0; rows.len()];
    let mut ids = vec![0; rows.len()];
    for (pos, (&r, &c)) in rows.iter().zip(cols).enumerate() {
        let slot = cursor[r as usize] as usize;
        cursor[r as usize] += 1;
        indices[slot] = c;
        ids[slot] = edge_id_at(pos);
    }
    let sorted = rows_sorted(&indptr, &indices);
    Csr {
        indptr,
        indices,
        edge_ids: ids,
        sorted,
    }
}

fn validate_arrays(indptr: &[u64], indices: &[VertexId], edge_ids: &[EdgeId]) -> Result<()> {
    if indptr.is_empty() {
        return Err(StrataError::Construction(
            "indptr must hold at least one entry".into(),
        ));
    }
    if indptr[0] != 0 {
        return Err(StrataError::Construction(format!(
            "indptr must start at 0, found {}",
            indptr[0]
        )));
    }
    if indices.len() != edge_ids.len() {
        return Err(StrataError::Construction(format!(
            "indices length {} does not match edge_ids length {}",
            indices.len(),
            edge_ids.len()
        )));
    }
    if let Some(pos) = indptr.windows(2).position(|w| w[0] > w[1]) {
        return Err(StrataError::Construction(format!(
            "indptr decreases at row {pos}"
        )));
    }
    let last = indptr[indptr.len() - 1];
    if last != indices.len() as u64 {
        return Err(StrataError::Construction(format!(
            "indptr ends at {last} but {} indices were supplied",
            indices.len()
        )));
    }
    let num_vertices = (indptr.len() - 1) as u64;
    if let Some(bad) = indices.iter().find(|&&c| c >= num_vertices) {
        return Err(StrataError::Construction(format!(
            "neighbor {bad} outside 0..{num_vertices}"
        )));
    }
    Ok(())
}

fn rows_sorted(indptr: &[u64], indices: &[VertexId]) -> bool {
    indptr.windows(2).all(|w| {
        let row = &indices[w[0] as usize..w[1] as usize];
        row.windows(2).all(|p| p[0] <= p[1])
    })
}
