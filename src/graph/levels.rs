//! Level-ordered traversal over a finished graph

use super::store::Graph;
use std::collections::{HashMap, HashSet};

/// Which edges a traversal may walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Follow {
    /// Source to target only
    Outgoing,
    /// Either direction
    Both,
}

/// Nodes first reached at one distance from the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub depth: usize,
    /// Node ids, sorted
    pub nodes: Vec<String>,
}

impl Graph {
    /// Breadth-first levels starting at `root`
    ///
    /// Each node appears once, at the shallowest depth it can be reached.
    /// Returns an empty list if the root is not in the graph.
    pub fn levels_from(&self, root: &str, follow: Follow) -> Vec<Level> {
        if !self.has_node(root) {
            return Vec::new();
        }

        // Build adjacency once instead of scanning the edge list per node
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for edge in self.edges() {
            if follow == Follow::Both {
                adjacency
                    .entry(edge.target.clone())
                    .or_default()
                    .push(edge.source.clone());
            }
            adjacency.entry(edge.source).or_default().push(edge.target);
        }

        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut levels = Vec::new();
        let mut frontier = vec![root.to_string()];
        let mut depth = 0;

        while !frontier.is_empty() {
            frontier.sort();
            let mut next = Vec::new();
            for id in &frontier {
                for neighbor in adjacency.get(id).into_iter().flatten() {
                    if visited.insert(neighbor.clone()) {
                        next.push(neighbor.clone());
                    }
                }
            }
            levels.push(Level {
                depth,
                nodes: std::mem::take(&mut frontier),
            });
            frontier = next;
            depth += 1;
        }

        levels
    }
}
