//! Training-graph compilation driver.
//!
//! This is the entry point for compiling an archive of per-utterance
//! grammar transducers into an archive of decoding graphs. It loads the
//! shared resources, streams the grammar archive through the compiler in
//! batches, and reports success/failure counts at the end of the run.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustfst::fst_traits::ExpandedFst;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use train_graph_compiler::{
    batch::compile_archive,
    config::{defaults, RunConfig},
    graph::{CompilerOptions, TrainingGraphCompiler},
    io::{read_fst_file, ArchiveReader, ArchiveWriter},
    model::TransitionModel,
    tree::ContextDependency,
    types::DisambigSymbols,
};

/// Compile training graphs from per-utterance grammar transducers.
#[derive(Parser, Debug)]
#[command(name = "compile-train-graphs")]
struct Args {
    /// Context-dependency tree file.
    tree: PathBuf,

    /// Transition model file.
    model: PathBuf,

    /// Lexicon transducer file.
    lexicon: PathBuf,

    /// Input archive of grammar transducers.
    grammars: PathBuf,

    /// Output archive of decoding graphs.
    graphs: PathBuf,

    /// Scale on transition probabilities.
    #[arg(long, default_value_t = defaults::TRANSITION_SCALE)]
    transition_scale: f32,

    /// Scale on self-loop probabilities.
    #[arg(long, default_value_t = defaults::SELF_LOOP_SCALE)]
    self_loop_scale: f32,

    /// Utterances compiled per batch; 1 compiles each utterance alone.
    #[arg(long, default_value_t = defaults::BATCH_SIZE)]
    batch_size: usize,

    /// File listing disambiguation symbol ids, one per line.
    #[arg(long, value_name = "FILE")]
    read_disambig_syms: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = RunConfig {
        tree_path: args.tree,
        model_path: args.model,
        lexicon_path: args.lexicon,
        grammars_path: args.grammars,
        graphs_path: args.graphs,
        disambig_path: args.read_disambig_syms,
        transition_scale: args.transition_scale,
        self_loop_scale: args.self_loop_scale,
        batch_size: args.batch_size,
    };
    config.validate()?;

    // Load shared resources
    let tree = ContextDependency::read(&config.tree_path)?;
    let model = TransitionModel::read(&config.model_path)?;
    let lexicon = read_fst_file(&config.lexicon_path)?;
    info!(
        "loaded tree with {} windows, model with {} transition ids, lexicon with {} states",
        tree.num_windows(),
        model.num_transition_ids(),
        lexicon.num_states()
    );

    let disambig = match &config.disambig_path {
        Some(path) => DisambigSymbols::load_from_file(path)?,
        None => DisambigSymbols::empty(),
    };
    if disambig.is_empty() {
        warn!("no disambiguation symbols supplied; the lexicon must not contain any");
    }

    let compiler = TrainingGraphCompiler::new(
        &tree,
        &model,
        lexicon,
        disambig,
        CompilerOptions {
            transition_scale: config.transition_scale,
            self_loop_scale: config.self_loop_scale,
        },
    )?;

    // Stream the grammar archive through the compiler
    let reader = ArchiveReader::open(&config.grammars_path)?;
    let mut writer = ArchiveWriter::create(&config.graphs_path)?;
    let summary = compile_archive(&compiler, reader, &mut writer, config.batch_size)?;
    writer.finish()?;

    info!(
        "compiled {} graphs successfully, {} failed, out of {} utterances",
        summary.succeeded,
        summary.failed,
        summary.total()
    );
    Ok(if summary.succeeded > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
