//! The `train_graph_compiler` core library.
//!
//! This crate compiles per-utterance word-level grammar transducers into
//! transition-id-level decoding graphs for acoustic model training. Each
//! grammar is composed with a pronunciation lexicon, phone labels are
//! expanded into context-dependent windows, and HMM topology is inserted so
//! every arc carries a transition id the trainer can align against.
//! Grammars stream through keyed archives; an utterance whose grammar has
//! no path through the lexicon fails alone without stopping the run.

pub mod batch;
pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod model;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;
