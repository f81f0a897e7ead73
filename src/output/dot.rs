//! Graphviz rendering

use crate::graph::{Graph, Node};
use anyhow::Result;
use std::io::Write;

/// Escape backslashes first so the quote escapes stay intact
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote and escape a string for use as a DOT id or label
fn quoted(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// Multi-line label; the `\n` separators are DOT escapes, not escaped text
fn node_label(node: &Node) -> String {
    let mut label = format!(
        "{}\\n{}",
        escape(node.resource_type.as_str()),
        escape(&node.name)
    );
    if !node.region.is_empty() {
        label.push_str(&format!("\\n({})", escape(&node.region)));
    }
    format!("\"{}\"", label)
}

/// Render the graph as a left-to-right digraph
///
/// Heuristic edges are dashed and labelled as such. Nodes and edges are
/// sorted so the output is stable across runs.
pub fn render_dot(out: &mut dyn Write, graph: &Graph) -> Result<()> {
    writeln!(out, "digraph blast_radius {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [shape=box, style=rounded];")?;
    writeln!(out)?;

    for node in graph.nodes() {
        writeln!(out, "  {} [label={}];", quoted(&node.id), node_label(&node))?;
    }
    writeln!(out)?;

    let mut edges = graph.edges();
    edges.sort_by(|a, b| {
        (&a.source, &a.target, &a.relation).cmp(&(&b.source, &b.target, &b.relation))
    });
    for edge in &edges {
        if edge.evidence.is_heuristic() {
            writeln!(
                out,
                "  {} -> {} [label={}, style=dashed];",
                quoted(&edge.source),
                quoted(&edge.target),
                quoted(&format!("{} (heuristic)", edge.relation))
            )?;
        } else {
            writeln!(
                out,
                "  {} -> {} [label={}];",
                quoted(&edge.source),
                quoted(&edge.target),
                quoted(&edge.relation)
            )?;
        }
    }

    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Evidence, ResourceType};

    #[test]
    fn test_heuristic_edges_are_dashed() {
        let graph = Graph::new();
        graph.add_node(Node::new("db", ResourceType::RELATIONAL_INSTANCE, "orders"));
        graph.add_node(Node::new("svc", ResourceType::CONTAINER_SERVICE, "api"));
        graph.add_edge(Edge::new("svc", "db", "connects-to", Evidence::inferred("ListFunctions")));

        let mut out = Vec::new();
        render_dot(&mut out, &graph).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(r#""svc" -> "db" [label="connects-to (heuristic)", style=dashed];"#));
    }

    #[test]
    fn test_ids_are_escaped() {
        assert_eq!(quoted(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quoted(r#"a\"b"#), r#""a\\\"b""#);
    }

    #[test]
    fn test_labels_escape_backslashes() {
        let graph = Graph::new();
        graph.add_node(Node::new("share", ResourceType::FUNCTION, r#"C:\jobs"#));
        graph.add_node(Node::new("q", ResourceType::QUEUE, r#"say "hi""#));
        graph.add_edge(Edge::new("q", "share", r#"odd\rel"#, Evidence::observed("X")));

        let mut out = Vec::new();
        render_dot(&mut out, &graph).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(r#""share" [label="Function\nC:\\jobs"];"#));
        assert!(text.contains(r#""q" [label="Queue\nsay \"hi\""];"#));
        assert!(text.contains(r#""q" -> "share" [label="odd\\rel"];"#));
    }
}
