use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use molgraph::batch::{build_graph_dir, BatchOptions};
use molgraph::graphml::write_graphml_file;
use molgraph::*;

#[derive(Parser)]
#[command(
    name = "molgraph",
    about = "Encode molecules as attributed and tensor graphs",
    version
)]
struct Cli {
    /// Maximum log level (error, warn, info, debug, trace, off)
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every graph file in a directory
    Load {
        dir: PathBuf,

        /// Extension of the graph files
        #[arg(long, default_value = "graphml")]
        extension: String,

        /// Convert files one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Encode one SMILES string and print the tensor shapes
    Encode {
        smiles: String,

        /// Also write the attributed graph to this file
        #[arg(long, value_name = "FILE")]
        graphml: Option<PathBuf>,
    },

    /// Write one graph file per row of a CSV
    Build {
        csv: PathBuf,
        out_dir: PathBuf,

        #[arg(long, default_value = "id")]
        id_column: String,

        #[arg(long, default_value = "smiles")]
        smiles_column: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Load {
            dir,
            extension,
            sequential,
        } => {
            let options = LoaderOptions {
                extension,
                parallel: !sequential,
            };
            let graphs = loader::load_graph_dir_with(&dir, &options)?;
            println!("Loaded {} graphs.", graphs.len());
        }
        Command::Encode { smiles, graphml } => {
            let tensor = smiles_to_tensor(&SmilesToolkit, &smiles)?;
            println!("x: {:?}", tensor.x.dim());
            println!("edge_index: {:?}", tensor.edge_index.dim());
            println!("edge_attr: {:?}", tensor.edge_attr.dim());
            if tensor.is_sentinel() {
                println!("(sentinel)");
            }

            if let Some(path) = graphml {
                let graph = smiles_to_attributed(&SmilesToolkit, &smiles)?
                    .with_context(|| format!("'{smiles}' has no structure to write"))?;
                write_graphml_file(&graph, &path)?;
                println!("Wrote {}", path.display());
            }
        }
        Command::Build {
            csv,
            out_dir,
            id_column,
            smiles_column,
        } => {
            let options = BatchOptions {
                id_column,
                smiles_column,
            };
            let report = build_graph_dir(&SmilesToolkit, &csv, &out_dir, &options)?;
            println!(
                "Wrote {} graphs to {} ({} skipped).",
                report.written,
                out_dir.display(),
                report.skipped
            );
        }
    }

    Ok(())
}
