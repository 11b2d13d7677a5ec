//! Loading a directory of GraphML files into tensor graphs keyed by file stem.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::graphml::{read_graphml_file, GraphmlError};
use crate::tensor::TensorGraph;
use crate::ABSENT_MARKER;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Could not read directory '{}'", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// File extension to pick up, without the dot.
    pub extension: String,
    /// Convert files on the rayon pool.
    pub parallel: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extension: "graphml".to_string(),
            parallel: true,
        }
    }
}

/// Read one graph file and encode it. No provenance is attached.
pub fn load_graph_file(path: impl AsRef<Path>) -> Result<TensorGraph, GraphmlError> {
    let graph = read_graphml_file(path)?;
    Ok(TensorGraph::from_attributed(&graph, ABSENT_MARKER, None))
}

/// Regular files in `dir` with the given extension, as `(stem, path)` sorted by path.
fn graph_files(dir: &Path, extension: &str) -> Result<Vec<(String, PathBuf)>, LoaderError> {
    let read_dir_error = |source: io::Error| LoaderError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if !path.is_file() || path.extension() != Some(OsStr::new(extension)) {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        files.push((stem.to_string_lossy().into_owned(), path));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Load every matching file in `dir`, keeping each file's own result.
pub fn scan_graph_dir(
    dir: impl AsRef<Path>,
    options: &LoaderOptions,
) -> Result<Vec<(String, Result<TensorGraph, GraphmlError>)>, LoaderError> {
    let files = graph_files(dir.as_ref(), &options.extension)?;
    debug!(files = files.len(), parallel = options.parallel, "scanning graph files");

    let load = |(id, path): &(String, PathBuf)| (id.clone(), load_graph_file(path));
    Ok(if options.parallel {
        files.par_iter().map(load).collect()
    } else {
        files.iter().map(load).collect()
    })
}

/// Load a directory with the default options. Files that fail to load are
/// logged and left out of the map.
pub fn load_graph_dir(dir: impl AsRef<Path>) -> Result<HashMap<String, TensorGraph>, LoaderError> {
    load_graph_dir_with(dir, &LoaderOptions::default())
}

pub fn load_graph_dir_with(
    dir: impl AsRef<Path>,
    options: &LoaderOptions,
) -> Result<HashMap<String, TensorGraph>, LoaderError> {
    let dir = dir.as_ref();
    let mut graphs = HashMap::new();
    let mut skipped = 0;
    for (id, result) in scan_graph_dir(dir, options)? {
        match result {
            Ok(graph) => {
                graphs.insert(id, graph);
            }
            Err(err) => {
                warn!("Skipping graph '{id}': {:#}", anyhow::Error::from(err));
                skipped += 1;
            }
        }
    }
    info!(
        loaded = graphs.len(),
        skipped,
        "loaded graphs from {}",
        dir.display()
    );
    Ok(graphs)
}
