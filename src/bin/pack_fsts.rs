//! Packing tool: build the compiler's binary inputs from plain text.
//!
//! Turns textual transducers, trees, and transition models into the binary
//! files `compile-train-graphs` consumes, so a full run can be assembled
//! from hand-written fixtures.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rustfst::fst_traits::ExpandedFst;
use tracing::info;
use tracing_subscriber::EnvFilter;

use train_graph_compiler::io::{
    parse_fst_text, parse_model_text, parse_tree_text, write_fst_file, ArchiveWriter, SymbolMap,
};

/// Pack textual transducers and resources into binary files.
#[derive(Parser, Debug)]
#[command(name = "pack-fsts")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack a single transducer from textual arc format.
    Fst {
        /// Input text file.
        input: PathBuf,
        /// Output FST file.
        output: PathBuf,
        /// Symbol table resolving input-label names.
        #[arg(long, value_name = "FILE")]
        isymbols: Option<PathBuf>,
        /// Symbol table resolving output-label names.
        #[arg(long, value_name = "FILE")]
        osymbols: Option<PathBuf>,
    },
    /// Pack a keyed archive of transducers, in argument order.
    Archive {
        /// Output archive file.
        output: PathBuf,
        /// Records as key=textfile pairs.
        #[arg(required = true, value_name = "KEY=FILE")]
        entries: Vec<String>,
        /// Symbol table resolving input-label names.
        #[arg(long, value_name = "FILE")]
        isymbols: Option<PathBuf>,
        /// Symbol table resolving output-label names.
        #[arg(long, value_name = "FILE")]
        osymbols: Option<PathBuf>,
    },
    /// Pack a context-dependency tree from text.
    Tree {
        /// Input text file.
        input: PathBuf,
        /// Output tree file.
        output: PathBuf,
    },
    /// Pack a transition model from text.
    Model {
        /// Input text file.
        input: PathBuf,
        /// Output model file.
        output: PathBuf,
    },
}

fn load_symbols(path: Option<&PathBuf>) -> anyhow::Result<Option<SymbolMap>> {
    Ok(match path {
        Some(path) => Some(SymbolMap::load_from_file(path)?),
        None => None,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Fst {
            input,
            output,
            isymbols,
            osymbols,
        } => {
            let isymbols = load_symbols(isymbols.as_ref())?;
            let osymbols = load_symbols(osymbols.as_ref())?;
            let text = fs::read_to_string(&input)?;
            let fst = parse_fst_text(&text, isymbols.as_ref(), osymbols.as_ref())?;
            write_fst_file(&output, &fst)?;
            info!("packed {} states into {}", fst.num_states(), output.display());
        }
        Command::Archive {
            output,
            entries,
            isymbols,
            osymbols,
        } => {
            let isymbols = load_symbols(isymbols.as_ref())?;
            let osymbols = load_symbols(osymbols.as_ref())?;
            let mut writer = ArchiveWriter::create(&output)?;
            for entry in &entries {
                let (key, path) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("entry {:?} is not of the form key=file", entry))?;
                let text = fs::read_to_string(path)?;
                let fst = parse_fst_text(&text, isymbols.as_ref(), osymbols.as_ref())?;
                writer.write(key, &fst)?;
            }
            writer.finish()?;
            info!("packed {} records into {}", entries.len(), output.display());
        }
        Command::Tree { input, output } => {
            let tree = parse_tree_text(&fs::read_to_string(&input)?)?;
            tree.write(&output)?;
            info!(
                "packed tree with {} windows into {}",
                tree.num_windows(),
                output.display()
            );
        }
        Command::Model { input, output } => {
            let model = parse_model_text(&fs::read_to_string(&input)?)?;
            model.write(&output)?;
            info!(
                "packed model with {} transition ids into {}",
                model.num_transition_ids(),
                output.display()
            );
        }
    }
    Ok(())
}
