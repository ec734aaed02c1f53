//! Precomputed export hierarchy
//!
//! Exports store only a 1-based parent index. [`ExportGraph`] inverts those
//! links once so whole-tree walks do not rescan the export table per node.

use crate::error::{FormatError, FormatResult};
use crate::view::RecordArray;

use super::records::Export;

/// Parent and child links of every export in a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportGraph {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl ExportGraph {
    /// Build the graph from an export table.
    ///
    /// Fails with `CorruptTable` when an export is its own parent, names a
    /// parent beyond the table, or sits on a parent cycle.
    pub fn build(exports: RecordArray<'_, Export>) -> FormatResult<Self> {
        let count = exports.len();
        let mut parents = Vec::with_capacity(count);
        let mut children = vec![Vec::new(); count];
        let mut roots = Vec::new();

        for (index, export) in exports.iter().enumerate() {
            let parent = export?.parent_index();
            match parent {
                None => roots.push(index),
                Some(p) if p == index => {
                    return Err(FormatError::corrupt(
                        "exports",
                        format!("export {index} is its own parent"),
                    ));
                }
                Some(p) if p >= count => {
                    return Err(FormatError::corrupt(
                        "exports",
                        format!("export {index} has parent {p} beyond {count} exports"),
                    ));
                }
                Some(p) => children[p].push(index),
            }
            parents.push(parent);
        }

        let graph = Self {
            parents,
            children,
            roots,
        };

        // Every node has at most one parent, so anything not reachable from
        // a root lies on a cycle.
        let mut reached = vec![false; count];
        for (node, _) in graph.depth_first() {
            reached[node] = true;
        }
        if let Some(node) = reached.iter().position(|r| !r) {
            return Err(FormatError::corrupt(
                "exports",
                format!("export {node} is part of a parent cycle"),
            ));
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Exports without a parent, in table order
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn parent(&self, index: usize) -> FormatResult<Option<usize>> {
        self.parents
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Children of `index`, in table order
    pub fn children(&self, index: usize) -> FormatResult<&[usize]> {
        self.children
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Pre-order walk from every root yielding `(index, depth)`.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: self.roots.iter().rev().map(|&root| (root, 0)).collect(),
        }
    }

    fn out_of_range(&self, index: usize) -> FormatError {
        FormatError::IndexOutOfRange {
            table: "exports",
            index,
            count: self.len(),
        }
    }
}

/// Iterator returned by [`ExportGraph::depth_first`]
#[derive(Debug, Clone)]
pub struct DepthFirst<'g> {
    graph: &'g ExportGraph,
    stack: Vec<(usize, usize)>,
}

impl Iterator for DepthFirst<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        self.stack.extend(
            self.graph.children[node]
                .iter()
                .rev()
                .map(|&child| (child, depth + 1)),
        );
        Some((node, depth))
    }
}
