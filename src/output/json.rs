//! Structured data rendering

use crate::graph::{Edge, Graph, Node};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct GraphDocument {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Render `{nodes, edges}` as pretty-printed JSON, sorted for stable output
pub fn render_json(out: &mut dyn Write, graph: &Graph) -> Result<()> {
    let mut edges = graph.edges();
    edges.sort_by(|a, b| {
        (&a.source, &a.target, &a.relation).cmp(&(&b.source, &b.target, &b.relation))
    });
    let document = GraphDocument {
        nodes: graph.nodes(),
        edges,
    };

    serde_json::to_writer_pretty(&mut *out, &document)
        .context("Failed to serialize graph to JSON")?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Evidence, ResourceType};

    #[test]
    fn test_evidence_and_heuristic_flag_present() {
        let graph = Graph::new();
        graph.add_node(Node::new("lb", ResourceType::LOAD_BALANCER, "web"));
        graph.add_node(Node::new("tg", ResourceType::TARGET_GROUP, "web-tg"));
        graph.add_edge(Edge::new(
            "lb",
            "tg",
            "forwards-to",
            Evidence::observed("DescribeListeners").with_field("TargetGroupArn", "tg"),
        ));

        let mut out = Vec::new();
        render_json(&mut out, &graph).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        let evidence = &value["edges"][0]["evidence"];
        assert_eq!(evidence["apiCall"], "DescribeListeners");
        assert_eq!(evidence["heuristic"], false);
        assert_eq!(evidence["fields"]["TargetGroupArn"], "tg");
    }
}
