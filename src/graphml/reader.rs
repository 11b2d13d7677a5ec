use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::xml::{parse_document, XmlElement};
use super::GraphmlError;
use crate::features::{AtomFeatures, BondFeatures};
use crate::graph::AttributedGraph;
use crate::molecule::{BondStereo, BondType, Hybridization};

/// A `<key>` declaration.
struct Key<'a> {
    domain: &'a str,
    name: &'a str,
    default: Option<String>,
}

impl Key<'_> {
    fn applies_to(&self, domain: &str) -> bool {
        self.domain == domain || self.domain == "all"
    }
}

/// The field values of one node or edge, by field name.
struct Fields {
    values: HashMap<String, String>,
}

impl Fields {
    fn collect(
        element: &XmlElement,
        domain: &str,
        keys: &HashMap<&str, Key>,
    ) -> Result<Self, GraphmlError> {
        let mut values = HashMap::new();
        for key in keys.values().filter(|key| key.applies_to(domain)) {
            if let Some(default) = &key.default {
                values.insert(key.name.to_string(), default.clone());
            }
        }

        for data in element.elements_named("data") {
            let id = data.attr("key").ok_or(GraphmlError::MissingAttribute {
                element: "data",
                attribute: "key",
            })?;
            match keys.get(id) {
                Some(key) if key.applies_to(domain) => {
                    values.insert(key.name.to_string(), data.text().trim().to_string());
                }
                _ => debug!("ignoring {domain} data for unknown key '{id}'"),
            }
        }

        Ok(Self { values })
    }

    fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    fn long(&self, field: &str) -> Result<u32, GraphmlError> {
        match self.get(field) {
            None => Ok(0),
            Some(value) => value.parse().map_err(|_| invalid(field, value)),
        }
    }

    fn boolean(&self, field: &str) -> Result<bool, GraphmlError> {
        match self.get(field) {
            None | Some("False" | "false" | "0") => Ok(false),
            Some("True" | "true" | "1") => Ok(true),
            Some(value) => Err(invalid(field, value)),
        }
    }
}

fn invalid(field: &str, value: &str) -> GraphmlError {
    GraphmlError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn atom_features(fields: &Fields) -> Result<AtomFeatures, GraphmlError> {
    Ok(AtomFeatures {
        atomic_num: fields.long("atomic_num")?,
        degree: fields.long("degree")?,
        num_implicit_h: fields.long("num_implicit_h")?,
        explicit_valence: fields.long("explicit_valence")?,
        implicit_valence: fields.long("implicit_valence")?,
        total_valence: fields.long("total_valence")?,
        num_radical_e: fields.long("num_radical_e")?,
        hybridization: Hybridization::from_code(fields.long("hybridization")?),
        is_aromatic: fields.boolean("is_aromatic")?,
        in_ring: fields.boolean("in_ring")?,
    })
}

fn bond_features(fields: &Fields) -> Result<BondFeatures, GraphmlError> {
    Ok(BondFeatures {
        bond_type: fields
            .get("bond_type")
            .map_or(BondType::Unspecified, BondType::from_name),
        stereo: BondStereo::from_code(fields.long("stereo")?),
        is_conjugated: fields.boolean("is_conjugated")?,
        is_aromatic: fields.boolean("is_aromatic")?,
        in_ring: fields.boolean("in_ring")?,
    })
}

fn endpoint<'a>(edge: &'a XmlElement, attribute: &'static str) -> Result<&'a str, GraphmlError> {
    edge.attr(attribute).ok_or(GraphmlError::MissingAttribute {
        element: "edge",
        attribute,
    })
}

/// Index of node `id`, adding a default node when it was never declared.
fn node_index<'a>(
    id: &'a str,
    ids: &mut HashMap<&'a str, usize>,
    nodes: &mut Vec<AtomFeatures>,
) -> usize {
    if let Some(&index) = ids.get(id) {
        return index;
    }
    warn!("edge refers to undeclared node '{id}', adding it with default features");
    ids.insert(id, nodes.len());
    nodes.push(AtomFeatures::default());
    nodes.len() - 1
}

/// Parse a GraphML document into an attributed graph.
///
/// Nodes are numbered in document order; a repeated node id or node pair
/// keeps the last features given for it.
pub fn read_graphml(text: &str) -> Result<AttributedGraph, GraphmlError> {
    let root = parse_document(text).map_err(GraphmlError::Xml)?;
    if root.local_name() != "graphml" {
        return Err(GraphmlError::UnexpectedElement {
            expected: "graphml",
            found: root.name.clone(),
        });
    }

    let mut keys = HashMap::new();
    for key in root.elements_named("key") {
        let id = key.attr("id").ok_or(GraphmlError::MissingAttribute {
            element: "key",
            attribute: "id",
        })?;
        keys.insert(
            id,
            Key {
                domain: key.attr("for").unwrap_or("all"),
                name: key.attr("attr.name").unwrap_or(id),
                default: key
                    .elements_named("default")
                    .next()
                    .map(|default| default.text().trim().to_string()),
            },
        );
    }

    let graph_element = root
        .elements_named("graph")
        .next()
        .ok_or(GraphmlError::MissingGraph)?;

    let mut ids = HashMap::new();
    let mut nodes = Vec::new();
    for node in graph_element.elements_named("node") {
        let id = node.attr("id").ok_or(GraphmlError::MissingAttribute {
            element: "node",
            attribute: "id",
        })?;
        let features = atom_features(&Fields::collect(node, "node", &keys)?)?;
        match ids.get(id) {
            Some(&index) => nodes[index] = features,
            None => {
                ids.insert(id, nodes.len());
                nodes.push(features);
            }
        }
    }

    let mut edges = Vec::new();
    for edge in graph_element.elements_named("edge") {
        let (source, target) = (endpoint(edge, "source")?, endpoint(edge, "target")?);
        let features = bond_features(&Fields::collect(edge, "edge", &keys)?)?;
        let u = node_index(source, &mut ids, &mut nodes);
        let v = node_index(target, &mut ids, &mut nodes);
        edges.push((u, v, features));
    }

    let mut graph = AttributedGraph::new();
    for features in nodes {
        graph.add_node(features);
    }
    for (u, v, features) in edges {
        graph.add_edge(u, v, features);
    }
    Ok(graph)
}

pub fn read_graphml_file(path: impl AsRef<Path>) -> Result<AttributedGraph, GraphmlError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| GraphmlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_graphml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphml::write_graphml;
    use crate::{smiles_to_attributed, SmilesToolkit};

    fn document(body: &str) -> String {
        format!(
            "<?xml version='1.0' encoding='utf-8'?>\n\
             <graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n\
             <key id=\"d0\" for=\"node\" attr.name=\"atomic_num\" attr.type=\"long\"/>\n\
             <key id=\"d1\" for=\"node\" attr.name=\"is_aromatic\" attr.type=\"boolean\"/>\n\
             <key id=\"d2\" for=\"node\" attr.name=\"hybridization\" attr.type=\"long\"/>\n\
             <key id=\"d3\" for=\"edge\" attr.name=\"bond_type\" attr.type=\"string\"/>\n\
             <key id=\"d4\" for=\"edge\" attr.name=\"stereo\" attr.type=\"long\"/>\n\
             <graph edgedefault=\"undirected\">{body}</graph>\n\
             </graphml>"
        )
    }

    fn round_trip(smiles: &str) {
        let graph = smiles_to_attributed(&SmilesToolkit, smiles).unwrap().unwrap();
        let mut buffer = Vec::new();
        write_graphml(&graph, &mut buffer).unwrap();
        let read = read_graphml(&String::from_utf8(buffer).unwrap()).unwrap();

        assert_eq!(read.node_count(), graph.node_count());
        assert_eq!(read.edge_count(), graph.edge_count());
        assert!(read.nodes().eq(graph.nodes()));
        assert!(read.edges().eq(graph.edges()));
    }

    #[test]
    fn test_write_then_read() {
        round_trip("CCO");
        round_trip("c1ccccc1O");
        round_trip("F/C=C/F");
        round_trip("[NH4+].[Cl-]");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let graph = read_graphml(&document(
            "<node id=\"a\"><data key=\"d0\">6</data></node>\
             <node id=\"b\"/>\
             <edge source=\"a\" target=\"b\"/>",
        ))
        .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(0).unwrap().atomic_num, 6);
        assert_eq!(graph.node(1), Some(&AtomFeatures::default()));
        let (u, v, bond) = graph.edge(0).unwrap();
        assert_eq!((u, v), (0, 1));
        assert_eq!(bond, &BondFeatures::default());
        assert_eq!(bond.bond_type, BondType::Unspecified);
    }

    #[test]
    fn test_key_defaults() {
        let text = "<graphml>\
             <key id=\"k\" for=\"node\" attr.name=\"atomic_num\" attr.type=\"long\"><default>8</default></key>\
             <key id=\"r\" for=\"all\" attr.name=\"in_ring\" attr.type=\"boolean\"><default>true</default></key>\
             <graph><node id=\"0\"/><node id=\"1\"><data key=\"k\">7</data></node>\
             <edge source=\"0\" target=\"1\"/></graph></graphml>";
        let graph = read_graphml(text).unwrap();
        assert_eq!(graph.node(0).unwrap().atomic_num, 8);
        assert_eq!(graph.node(1).unwrap().atomic_num, 7);
        assert!(graph.node(0).unwrap().in_ring);
        assert!(graph.edge(0).unwrap().2.in_ring);
    }

    #[test]
    fn test_values_are_parsed() {
        let graph = read_graphml(&document(
            "<node id=\"0\"><data key=\"d1\">True</data><data key=\"d2\">3</data></node>\
             <node id=\"1\"><data key=\"d1\">true</data></node>\
             <edge source=\"0\" target=\"1\"><data key=\"d3\">DOUBLE</data><data key=\"d4\">2</data></edge>\
             <edge source=\"1\" target=\"0\"><data key=\"d3\">AROMATIC</data><data key=\"zz\">?</data></edge>",
        ))
        .unwrap();
        assert!(graph.node(0).unwrap().is_aromatic);
        assert!(graph.node(1).unwrap().is_aromatic);
        assert_eq!(graph.node(0).unwrap().hybridization, Hybridization::SP2);
        // The second edge names the same pair and replaces the first.
        assert_eq!(graph.edge_count(), 1);
        let bond = graph.edge(0).unwrap().2;
        assert_eq!(bond.bond_type, BondType::Aromatic);
        assert_eq!(bond.stereo, BondStereo::None);
    }

    #[test]
    fn test_undeclared_edge_endpoint_is_added() {
        let graph = read_graphml(&document(
            "<node id=\"0\"/><edge source=\"0\" target=\"9\"/>",
        ))
        .unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge(0).map(|(u, v, _)| (u, v)), Some((0, 1)));
    }

    #[test]
    fn test_invalid_values() {
        for body in [
            "<node id=\"0\"><data key=\"d0\">six</data></node>",
            "<node id=\"0\"><data key=\"d0\">-1</data></node>",
            "<node id=\"0\"><data key=\"d1\">maybe</data></node>",
            "<node id=\"0\"><data key=\"d2\">3.5</data></node>",
            "<node id=\"0\"/><edge source=\"0\" target=\"0\"><data key=\"d4\">E</data></edge>",
        ] {
            let err = read_graphml(&document(body)).unwrap_err();
            assert!(matches!(err, GraphmlError::InvalidValue { .. }), "{body}: {err}");
        }
    }

    #[test]
    fn test_unlisted_codes_are_kept() {
        let text = document(
            "<node id=\"0\"><data key=\"d2\">8</data></node><node id=\"1\"/>\
             <edge source=\"0\" target=\"1\"><data key=\"d3\">DATIVE</data><data key=\"d4\">6</data></edge>",
        );
        let graph = read_graphml(&text).unwrap();
        assert_eq!(graph.node(0).unwrap().hybridization, Hybridization::Unlisted(8));
        let bond = graph.edge(0).unwrap().2;
        assert_eq!(bond.bond_type, BondType::Unlisted("DATIVE".to_string()));
        assert_eq!(bond.stereo, BondStereo::Unlisted(6));

        let mut buffer = Vec::new();
        write_graphml(&graph, &mut buffer).unwrap();
        let again = read_graphml(&String::from_utf8(buffer).unwrap()).unwrap();
        assert!(again.nodes().eq(graph.nodes()));
        assert!(again.edges().eq(graph.edges()));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let text = format!(
            "<graphml>{}{}</graphml>",
            "<a>".repeat(1000),
            "</a>".repeat(1000)
        );
        assert!(matches!(read_graphml(&text), Err(GraphmlError::Xml(_))));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(read_graphml("<graphml"), Err(GraphmlError::Xml(_))));
        assert!(matches!(
            read_graphml("<svg/>"),
            Err(GraphmlError::UnexpectedElement { .. })
        ));
        assert!(matches!(
            read_graphml("<graphml></graphml>"),
            Err(GraphmlError::MissingGraph)
        ));
        assert!(matches!(
            read_graphml(&document("<node/>")),
            Err(GraphmlError::MissingAttribute {
                element: "node",
                ..
            })
        ));
        assert!(matches!(
            read_graphml(&document("<edge source=\"0\"/>")),
            Err(GraphmlError::MissingAttribute {
                element: "edge",
                attribute: "target"
            })
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("molgraph-reader-missing.graphml");
        let err = read_graphml_file(&path).unwrap_err();
        assert!(matches!(err, GraphmlError::Io { .. }));

        // The io error is the source, so a full chain names it exactly once.
        let cause = std::fs::read_to_string(&path).unwrap_err().to_string();
        assert!(!err.to_string().contains(&cause));
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches(&cause).count(), 1, "{chain}");
    }
}
