//! Streaming batch runner connecting grammar archives to the compiler.
//!
//! Utterances are consumed in archive order, compiled in chunks, and
//! written out one graph per key in the same order. A failed utterance
//! stays in the stream as an empty graph; only inconsistent shared
//! resources or archive corruption stop the run.

use std::io::{BufRead, Write};

use tracing::warn;

use crate::error::{GraphError, Result};
use crate::graph::TrainingGraphCompiler;
use crate::io::{ArchiveReader, ArchiveWriter};
use crate::types::StdVectorFst;

/// Success and failure counts for a compilation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Compile every grammar in `reader` and write one graph per key to
/// `writer`, `batch_size` utterances at a time.
///
/// A batch size of one routes each utterance through the single-graph
/// path; larger sizes share composition setup per chunk. The caller is
/// responsible for flushing the writer afterwards.
pub fn compile_archive<R: BufRead, W: Write>(
    compiler: &TrainingGraphCompiler<'_>,
    reader: ArchiveReader<R>,
    writer: &mut ArchiveWriter<W>,
    batch_size: usize,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    let mut keys: Vec<String> = Vec::with_capacity(batch_size);
    let mut grammars: Vec<StdVectorFst> = Vec::with_capacity(batch_size);

    for entry in reader {
        let (key, grammar) = entry?;
        keys.push(key);
        grammars.push(grammar);
        if grammars.len() >= batch_size {
            flush_batch(compiler, batch_size, &mut keys, &mut grammars, writer, &mut summary)?;
        }
    }
    flush_batch(compiler, batch_size, &mut keys, &mut grammars, writer, &mut summary)?;
    Ok(summary)
}

fn flush_batch<W: Write>(
    compiler: &TrainingGraphCompiler<'_>,
    batch_size: usize,
    keys: &mut Vec<String>,
    grammars: &mut Vec<StdVectorFst>,
    writer: &mut ArchiveWriter<W>,
    summary: &mut BatchSummary,
) -> Result<()> {
    if keys.is_empty() {
        return Ok(());
    }

    let outcomes = if batch_size == 1 {
        vec![compiler.compile_graph(&grammars[0])?]
    } else {
        compiler.compile_graphs(grammars)?
    };
    if outcomes.len() != keys.len() {
        return Err(GraphError::BatchMismatch {
            expected: keys.len(),
            got: outcomes.len(),
        });
    }

    for (key, outcome) in keys.iter().zip(outcomes) {
        if outcome.is_success() {
            summary.succeeded += 1;
        } else {
            warn!("problem creating decoding graph for utterance {}", key);
            summary.failed += 1;
        }
        writer.write(key, &outcome.into_fst())?;
    }
    keys.clear();
    grammars.clear();
    Ok(())
}
