//! Level-grouped text rendering

use crate::graph::{Edge, Follow, Graph, Node};
use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::io::Write;

fn level_title(depth: usize) -> &'static str {
    match depth {
        0 => "Root",
        1 => "Direct Dependencies",
        _ => "Transitive Dependencies",
    }
}

fn relation_label(edge: &Edge, reverse: bool) -> String {
    let arrow = if reverse { "<- " } else { "" };
    if edge.evidence.is_heuristic() {
        format!(" [{}{} (heuristic)]", arrow, edge.relation)
    } else {
        format!(" [{}{}]", arrow, edge.relation)
    }
}

/// One relation that explains why `node` appears at its level
///
/// Prefers an edge from the previous level into the node, then an edge
/// from the node back to the previous level. The root has none.
fn representative_relation(graph: &Graph, node: &Node, previous: &HashSet<&str>) -> String {
    if let Some(edge) = graph
        .edges_into(&node.id)
        .iter()
        .find(|e| previous.contains(e.source.as_str()))
    {
        return relation_label(edge, false);
    }
    graph
        .edges_from(&node.id)
        .iter()
        .find(|e| previous.contains(e.target.as_str()))
        .map(|edge| relation_label(edge, true))
        .unwrap_or_default()
}

/// Render levels outward from the root, followed by a summary line
pub fn render_tree(out: &mut dyn Write, graph: &Graph, root_id: &str) -> Result<()> {
    let levels = graph.levels_from(root_id, Follow::Both);
    if levels.is_empty() {
        return Err(anyhow!("Root node not found in graph: {}", root_id));
    }

    let mut previous: Vec<String> = Vec::new();
    for level in &levels {
        if level.depth > 0 {
            writeln!(out)?;
        }
        writeln!(out, "[Level {}] {}", level.depth, level_title(level.depth))?;
        let previous_ids: HashSet<&str> = previous.iter().map(String::as_str).collect();

        for (i, id) in level.nodes.iter().enumerate() {
            let Some(node) = graph.get_node(id) else {
                continue;
            };
            let last = i + 1 == level.nodes.len();
            let (branch, indent) = if last { ("└─", "  ") } else { ("├─", "│ ") };

            writeln!(
                out,
                "{} {}: {}{}",
                branch,
                node.resource_type,
                node.name,
                representative_relation(graph, &node, &previous_ids)
            )?;
            if node.id != node.name {
                writeln!(out, "{} id: {}", indent, node.id)?;
            }
            for (key, value) in &node.attributes {
                let value = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                if !value.is_empty() {
                    writeln!(out, "{} {}: {}", indent, key, value)?;
                }
            }
            if !node.tags.is_empty() {
                let tags: Vec<String> =
                    node.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                writeln!(out, "{} tags: {}", indent, tags.join(", "))?;
            }
        }
        previous = level.nodes.clone();
    }

    writeln!(
        out,
        "\nSummary: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Evidence, ResourceType};

    #[test]
    fn test_reverse_edges_are_marked() {
        let graph = Graph::new();
        graph.add_node(Node::new("lb", ResourceType::LOAD_BALANCER, "web"));
        graph.add_node(Node::new("www", ResourceType::DNS_RECORD, "www"));
        graph.add_edge(Edge::new(
            "www",
            "lb",
            "aliases-to",
            Evidence::observed("ListResourceRecordSets"),
        ));

        let mut out = Vec::new();
        render_tree(&mut out, &graph, "lb").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("[Level 0] Root"));
        assert!(text.contains("└─ DNSRecord: www [<- aliases-to]"));
        assert!(text.ends_with("Summary: 2 nodes, 1 edges\n"));
    }

    #[test]
    fn test_missing_root_is_error() {
        let mut out = Vec::new();
        assert!(render_tree(&mut out, &Graph::new(), "nope").is_err());
    }
}
