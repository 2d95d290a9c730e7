//! Plain-text edge list loading
//!
//! One `src dst` pair per line, separated by whitespace or a comma.
//! `#` starts a comment. An optional `nodes N` line fixes the node count,
//! otherwise it is one past the largest id seen.

use std::path::Path;

use super::Graph;
use crate::error::{GatError, Result};

impl Graph {
    /// Parse an edge list from text
    pub fn from_edge_list_str(text: &str) -> Result<Self> {
        let mut declared_nodes: Option<usize> = None;
        let mut edges: Vec<(usize, usize)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();

            match fields.as_slice() {
                ["nodes", n] => {
                    if declared_nodes.is_some() {
                        return Err(parse_error(line_no, "duplicate `nodes` header"));
                    }
                    declared_nodes = Some(parse_id(n, line_no)?);
                }
                [s, d] => edges.push((parse_id(s, line_no)?, parse_id(d, line_no)?)),
                _ => {
                    return Err(parse_error(
                        line_no,
                        format!("expected `src dst`, got `{line}`"),
                    ))
                }
            }
        }

        let inferred = edges.iter().map(|&(s, d)| s.max(d) + 1).max().unwrap_or(0);
        let num_nodes = declared_nodes.unwrap_or(inferred);

        Graph::new(num_nodes, &edges)
    }

    /// Load an edge list file
    pub fn load_edge_list(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_edge_list_str(&text)
    }
}

/// Ids and counts must leave room for `id + 1`
fn parse_id(field: &str, line: usize) -> Result<usize> {
    let id: usize = field
        .parse()
        .map_err(|_| parse_error(line, format!("`{field}` is not a node id")))?;
    if id.checked_add(1).is_none() {
        return Err(parse_error(line, format!("node id `{field}` is too large")));
    }
    Ok(id)
}

fn parse_error(line: usize, message: impl Into<String>) -> GatError {
    GatError::Parse {
        line,
        message: message.into(),
    }
}
