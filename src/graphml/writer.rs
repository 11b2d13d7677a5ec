use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{format_bool, GraphmlError, EDGE_FIELDS, NODE_FIELDS};
use crate::features::{AtomFeatures, BondFeatures};
use crate::graph::AttributedGraph;

const HEADER: &str = "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">";

fn node_values(atom: &AtomFeatures) -> [String; 10] {
    [
        atom.atomic_num.to_string(),
        atom.degree.to_string(),
        atom.num_implicit_h.to_string(),
        atom.explicit_valence.to_string(),
        atom.implicit_valence.to_string(),
        atom.total_valence.to_string(),
        atom.num_radical_e.to_string(),
        atom.hybridization.code().to_string(),
        format_bool(atom.is_aromatic).to_string(),
        format_bool(atom.in_ring).to_string(),
    ]
}

fn edge_values(bond: &BondFeatures) -> [String; 5] {
    [
        bond.bond_type.name().to_string(),
        bond.stereo.code().to_string(),
        format_bool(bond.is_conjugated).to_string(),
        format_bool(bond.is_aromatic).to_string(),
        format_bool(bond.in_ring).to_string(),
    ]
}

/// Bond type names read from other files may carry markup characters.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write `graph` as a GraphML document. Node ids are the node indices; node
/// keys are `d0`..`d9` and edge keys `d10`..`d14`.
pub fn write_graphml<W: Write>(graph: &AttributedGraph, out: W) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(out, "<?xml version='1.0' encoding='utf-8'?>")?;
    writeln!(out, "{HEADER}")?;

    let edge_offset = NODE_FIELDS.len();
    let domains = [
        ("node", 0, &NODE_FIELDS[..]),
        ("edge", edge_offset, &EDGE_FIELDS[..]),
    ];
    for (domain, offset, fields) in domains {
        for (i, (name, kind)) in fields.iter().enumerate() {
            writeln!(
                out,
                "  <key id=\"d{}\" for=\"{domain}\" attr.name=\"{name}\" attr.type=\"{}\" />",
                offset + i,
                kind.attr_type()
            )?;
        }
    }

    writeln!(out, "  <graph edgedefault=\"undirected\">")?;
    for (i, atom) in graph.nodes().enumerate() {
        writeln!(out, "    <node id=\"{i}\">")?;
        for (key, value) in node_values(atom).iter().enumerate() {
            writeln!(out, "      <data key=\"d{key}\">{}</data>", escape(value))?;
        }
        writeln!(out, "    </node>")?;
    }
    for (u, v, bond) in graph.edges() {
        writeln!(out, "    <edge source=\"{u}\" target=\"{v}\">")?;
        for (i, value) in edge_values(bond).iter().enumerate() {
            writeln!(
                out,
                "      <data key=\"d{}\">{}</data>",
                edge_offset + i,
                escape(value)
            )?;
        }
        writeln!(out, "    </edge>")?;
    }
    writeln!(out, "  </graph>")?;
    writeln!(out, "</graphml>")?;
    out.flush()
}

pub fn write_graphml_file(
    graph: &AttributedGraph,
    path: impl AsRef<Path>,
) -> Result<(), GraphmlError> {
    let path = path.as_ref();
    let io_error = |source: io::Error| GraphmlError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    write_graphml(graph, file).map_err(io_error)?;
    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "wrote {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::BondType;
    use crate::{smiles_to_attributed, SmilesToolkit};

    #[test]
    fn test_write_ethanol() {
        let graph = smiles_to_attributed(&SmilesToolkit, "CCO").unwrap().unwrap();
        let mut buffer = Vec::new();
        write_graphml(&graph, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("<?xml"));
        assert!(text.contains("attr.name=\"atomic_num\" attr.type=\"long\""));
        assert!(text.contains(
            "<key id=\"d10\" for=\"edge\" attr.name=\"bond_type\" attr.type=\"string\" />"
        ));
        assert_eq!(text.matches("<node id=").count(), 3);
        assert_eq!(text.matches("<edge source=").count(), 2);
        assert!(text.contains("<edge source=\"1\" target=\"2\">"));
        assert!(text.contains("<data key=\"d10\">SINGLE</data>"));
        assert!(text.contains("<data key=\"d8\">False</data>"));
        assert!(text.trim_end().ends_with("</graphml>"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b&\"c\">"), "a&lt;b&amp;&quot;c&quot;&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_unlisted_bond_type_is_escaped() {
        let mut graph = AttributedGraph::new();
        graph.add_node(AtomFeatures::default());
        graph.add_node(AtomFeatures::default());
        graph.add_edge(
            0,
            1,
            BondFeatures {
                bond_type: BondType::Unlisted("A&B<C>".to_string()),
                ..Default::default()
            },
        );

        let mut buffer = Vec::new();
        write_graphml(&graph, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("<data key=\"d10\">A&amp;B&lt;C&gt;</data>"));

        let read = crate::graphml::read_graphml(&text).unwrap();
        assert_eq!(read.edge(0).unwrap().2.bond_type.name(), "A&B<C>");
    }
}
