//! Build a directory of GraphML files from a CSV of structure strings.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::graph::smiles_to_attributed;
use crate::graphml::write_graphml_file;
use crate::toolkit::Toolkit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub id_column: String,
    pub smiles_column: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            smiles_column: "smiles".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub written: usize,
    pub skipped: usize,
}

/// Ids become file names, so they may not name another directory.
fn is_plain_name(id: &str) -> bool {
    !id.contains("..") && !id.contains(['/', '\\'])
}

fn column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| anyhow!("CSV has no '{name}' column"))
}

/// Write `<out_dir>/<id>.graphml` for every row whose structure parses.
///
/// Rows with an empty or path-like id, the absent marker, a structure the
/// toolkit rejects, or a file that cannot be written are skipped.
pub fn build_graph_dir(
    toolkit: &impl Toolkit,
    csv_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let (csv_path, out_dir) = (csv_path.as_ref(), out_dir.as_ref());
    let file = File::open(csv_path).with_context(|| format!("opening {}", csv_path.display()))?;
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = rdr.headers()?.clone();
    let id_column = column(&headers, &options.id_column)?;
    let smiles_column = column(&headers, &options.smiles_column)?;

    let mut report = BatchReport::default();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading record {}", line + 1))?;
        let id = record.get(id_column).unwrap_or("").trim();
        let smiles = record.get(smiles_column).unwrap_or("").trim();
        if id.is_empty() {
            warn!("Skipping record {} with an empty id", line + 1);
            report.skipped += 1;
            continue;
        }
        if !is_plain_name(id) {
            warn!("Skipping '{id}': the id is not a plain file name");
            report.skipped += 1;
            continue;
        }

        match smiles_to_attributed(toolkit, smiles)? {
            Some(graph) => {
                let path = out_dir.join(format!("{id}.graphml"));
                match write_graphml_file(&graph, &path) {
                    Ok(()) => report.written += 1,
                    Err(err) => {
                        warn!("Skipping '{id}': {:#}", anyhow::Error::from(err));
                        report.skipped += 1;
                    }
                }
            }
            None => {
                warn!("Skipping '{id}': could not parse '{smiles}'");
                report.skipped += 1;
            }
        }
    }

    info!(
        written = report.written,
        skipped = report.skipped,
        "built graphs in {}",
        out_dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_graph_dir, SmilesToolkit};

    #[test]
    fn test_build_from_csv() {
        let root = std::env::temp_dir().join(format!("molgraph-batch-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        let csv_path = root.join("molecules.csv");
        fs::write(
            &csv_path,
            "name,smiles,id\n\
             ethanol,CCO,m1\n\
             benzene,c1ccccc1,m2\n\
             nothing,None,m3\n\
             junk,invalid_garbage_string,m4\n\
             anonymous,CC,\n",
        )
        .unwrap();

        let out_dir = root.join("graphs");
        let report =
            build_graph_dir(&SmilesToolkit, &csv_path, &out_dir, &BatchOptions::default()).unwrap();
        assert_eq!(
            report,
            BatchReport {
                written: 2,
                skipped: 3
            }
        );

        let graphs = load_graph_dir(&out_dir).unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs["m1"].num_nodes(), 3);
        assert_eq!(graphs["m2"].num_nodes(), 6);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_unsafe_ids_and_write_failures_are_skipped() {
        let root = std::env::temp_dir().join(format!("molgraph-batch-ids-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let out_dir = root.join("out");
        fs::create_dir_all(out_dir.join("blocked.graphml")).unwrap();
        let csv_path = root.join("molecules.csv");
        fs::write(
            &csv_path,
            "id,smiles\n\
             sub/x,CCO\n\
             ../escape,CC\n\
             blocked,CCO\n\
             m2,CC\n",
        )
        .unwrap();

        let report =
            build_graph_dir(&SmilesToolkit, &csv_path, &out_dir, &BatchOptions::default()).unwrap();
        assert_eq!(
            report,
            BatchReport {
                written: 1,
                skipped: 3
            }
        );
        assert!(out_dir.join("m2.graphml").is_file());
        assert!(!root.join("escape.graphml").exists());
        assert!(!out_dir.join("sub").exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_column() {
        let root = std::env::temp_dir().join(format!("molgraph-batch-col-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        let csv_path = root.join("molecules.csv");
        fs::write(&csv_path, "id,structure\nm1,CCO\n").unwrap();

        let err = build_graph_dir(&SmilesToolkit, &csv_path, root.join("out"), &BatchOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("'smiles'"));

        fs::remove_dir_all(&root).unwrap();
    }
}
