use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use thiserror::Error;
use tracing::debug;

use crate::storage::ImmutableGraph;
use crate::types::{StrataError, VertexId};

/// Where and how to read an edge list.
#[derive(Debug, Clone)]
pub struct EdgeListConfig {
    /// CSV file with a header row.
    pub path: PathBuf,
    /// Column holding source vertex ids.
    pub src_column: String,
    /// Column holding destination vertex ids.
    pub dst_column: String,
    /// Vertex count; defaults to the largest id plus one.
    pub num_vertices: Option<u64>,
}

impl EdgeListConfig {
    /// Reads `src`/`dst` columns from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            src_column: "src".into(),
            dst_column: "dst".into(),
            num_vertices: None,
        }
    }
}

/// Edges loaded from CSV, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeList {
    /// Vertex count.
    pub num_vertices: u64,
    /// Source of edge `i`.
    pub src: Vec<VertexId>,
    /// Destination of edge `i`.
    pub dst: Vec<VertexId>,
}

impl EdgeList {
    /// Builds an immutable graph; edge `i` keeps id `i`.
    pub fn to_graph(&self) -> Result<ImmutableGraph, CliError> {
        Ok(ImmutableGraph::from_coo(
            self.num_vertices,
            &self.src,
            &self.dst,
            None,
        )?)
    }
}

/// Error type for CLI input and output.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing or writing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Graph or transport error.
    #[error(transparent)]
    Graph(#[from] StrataError),
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

/// Reads an edge list from CSV.
pub fn load_edge_list(cfg: &EdgeListConfig) -> Result<EdgeList, CliError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(&cfg.path)?;
    let headers = reader.headers()?.clone();
    let src_index = find_column(&headers, &cfg.src_column)?;
    let dst_index = find_column(&headers, &cfg.dst_column)?;

    let mut edges = EdgeList::default();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        edges
            .src
            .push(parse_id(&record, src_index, &cfg.src_column, row)?);
        edges
            .dst
            .push(parse_id(&record, dst_index, &cfg.dst_column, row)?);
    }

    let needed = match edges.src.iter().chain(&edges.dst).max() {
        Some(&max) => max.checked_add(1).ok_or_else(|| {
            CliError::Message(format!("vertex id {max} leaves no room for a vertex count"))
        })?,
        None => 0,
    };
    edges.num_vertices = match cfg.num_vertices {
        Some(n) if n < needed => {
            return Err(CliError::Message(format!(
                "edge list references vertex {} but only {n} vertices were requested",
                needed - 1
            )))
        }
        Some(n) => n,
        None => needed,
    };
    debug!(
        path = %cfg.path.display(),
        vertices = edges.num_vertices,
        edges = edges.src.len(),
        "cli.edge_list.loaded"
    );
    Ok(edges)
}

/// Writes `(src, dst)` pairs as a `src,dst` CSV.
pub fn write_edge_list(path: &Path, src: &[VertexId], dst: &[VertexId]) -> Result<u64, CliError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(["src", "dst"])?;
    for (s, d) in src.iter().zip(dst) {
        writer.write_record([s.to_string(), d.to_string()])?;
    }
    writer.flush()?;
    Ok(src.len() as u64)
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::Message(format!("column '{name}' not found")))
}

fn parse_id(record: &StringRecord, idx: usize, name: &str, row: usize) -> Result<VertexId, CliError> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Message(format!("row {row}: missing value for column '{name}'")))?;
    raw.parse().map_err(|_| {
        CliError::Message(format!(
            "row {row}: column '{name}' holds '{raw}', expected a vertex id"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("edges.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_edges_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "src,dst\n0,1\n2, 1\n1,3\n");
        let edges = load_edge_list(&EdgeListConfig::new(path)).unwrap();
        assert_eq!(edges.num_vertices, 4);
        assert_eq!(edges.src, vec![0, 2, 1]);
        assert_eq!(edges.dst, vec![1, 1, 3]);
        let g = edges.to_graph().unwrap();
        assert_eq!(g.num_edges(), 3);
        assert_eq!(g.edge_id(2, 1).unwrap(), vec![1]);
    }

    #[test]
    fn custom_columns_and_vertex_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "from,weight,to\n0,0.5,1\n");
        let mut cfg = EdgeListConfig::new(path);
        cfg.src_column = "from".into();
        cfg.dst_column = "TO".into();
        cfg.num_vertices = Some(10);
        let edges = load_edge_list(&cfg).unwrap();
        assert_eq!(edges.num_vertices, 10);
        assert_eq!((edges.src[0], edges.dst[0]), (0, 1));

        cfg.num_vertices = Some(1);
        assert!(load_edge_list(&cfg).is_err());
    }

    #[test]
    fn rejects_largest_vertex_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, &format!("src,dst\n0,{}\n", u64::MAX));
        let err = load_edge_list(&EdgeListConfig::new(path)).unwrap_err();
        assert!(matches!(err, CliError::Message(_)));
    }

    #[test]
    fn rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "src,dst\n0,x\n");
        let err = load_edge_list(&EdgeListConfig::new(path)).unwrap_err();
        assert!(err.to_string().contains("expected a vertex id"));

        let path = write(&dir, "a,b\n0,1\n");
        let err = load_edge_list(&EdgeListConfig::new(path)).unwrap_err();
        assert!(err.to_string().contains("column 'src' not found"));
    }

    #[test]
    fn written_list_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert_eq!(write_edge_list(&path, &[3, 0], &[1, 2]).unwrap(), 2);
        let edges = load_edge_list(&EdgeListConfig::new(&path)).unwrap();
        assert_eq!(edges.src, vec![3, 0]);
        assert_eq!(edges.dst, vec![1, 2]);
    }
}
